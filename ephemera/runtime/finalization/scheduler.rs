//! Collector integration: classification during marking, condemnation once marking completes,
//! and dispatch of cleanup callbacks from deferred jobs.

use tracing::{debug, trace};

use crate::runtime::{
    gc::{GcVisitorExt, HeapPtr},
    jobs::{Job, JobQueue},
    turn::Turn,
    value::NativeFunction,
    weak_ref::WeakRefObject,
    Context, Value,
};

use super::{FinalizationState, RegistryId, RegistryRecord};

/// What one ScheduleFinalization pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub handles_cleared: usize,
    pub registrations_condemned: usize,
    pub tokens_cleared: usize,
}

impl FinalizationState {
    /// Reset the encountered lists and reserve room so that weak processing at the end of
    /// marking does not need to grow them.
    pub(crate) fn prepare_cycle(&mut self) {
        self.encountered_weak_refs.clear();
        self.encountered_weak_refs.reserve(self.live_weak_refs);

        self.encountered_registries.clear();
        self.encountered_registries.reserve(self.registries.len());

        for (_, record) in self.registries.iter_mut() {
            record.pending.reserve(record.active.len());
        }
    }

    pub(crate) fn trace_weak_ref(
        &mut self,
        weak_ref: HeapPtr<WeakRefObject>,
        turn: Turn,
        visitor: &mut impl GcVisitorExt,
    ) {
        let mut handle = weak_ref;
        if handle.visit_pointers(turn, visitor) {
            self.encountered_weak_refs.push(weak_ref);
        }
    }

    /// Trace everything a reached registry holds strongly and remember it for weak processing.
    pub(crate) fn trace_registry(&mut self, id: RegistryId, visitor: &mut impl GcVisitorExt) {
        let FinalizationState { registries, registrations, encountered_registries, .. } = self;

        let Some(record) = registries.get(id) else {
            return;
        };

        encountered_registries.push(id);

        for registration_id in record.active.iter().chain(record.pending.iter()) {
            if let Some(registration) = registrations.get_mut(*registration_id) {
                registration.visit_pointers(visitor);
            }
        }
    }

    /// Runs once the gray queue is empty, before any object is swept.
    ///
    /// Clears encountered handles whose target is unmarked, moves registrations with an
    /// unmarked target to their registry's pending queue in creation order, and forgets
    /// unregister tokens that died. Idempotent for a given marking result.
    pub(crate) fn schedule_finalization(&mut self, heap: &ephemera_gc::Heap) -> ScheduleSummary {
        let mut summary = ScheduleSummary::default();

        let FinalizationState {
            registries,
            registrations,
            encountered_weak_refs,
            encountered_registries,
            ..
        } = self;

        for weak_ref in encountered_weak_refs.iter_mut() {
            if weak_ref.clear_if_dead(heap) {
                summary.handles_cleared += 1;
            }
        }
        encountered_weak_refs.clear();

        for id in encountered_registries.iter() {
            let Some(record) = registries.get_mut(*id) else {
                continue;
            };

            let RegistryRecord { active, pending, by_token, .. } = record;

            by_token.retain(|token, ids| {
                if heap.is_alive(token.into_gc_ptr()) {
                    return true;
                }

                for registration_id in ids.iter() {
                    if let Some(registration) = registrations.get_mut(*registration_id) {
                        registration.clear_unregister_token();
                    }
                }
                summary.tokens_cleared += 1;
                false
            });

            active.retain(|registration_id| {
                let Some(registration) = registrations.get_mut(*registration_id) else {
                    return false;
                };

                if registration.target_is_dead(heap) {
                    registration.condemn();
                    pending.push_back(*registration_id);
                    summary.registrations_condemned += 1;
                    false
                } else {
                    true
                }
            });
        }
        encountered_registries.clear();

        summary
    }

    /// Queue one cleanup job for every registry with pending registrations and no job already
    /// queued. Returns the number of jobs queued.
    pub(crate) fn queue_cleanup_jobs(&mut self, jobs: &mut JobQueue) -> usize {
        let mut queued = 0;
        for (id, record) in self.registries.iter_mut() {
            if !record.pending.is_empty() && !record.cleanup_job_queued {
                record.cleanup_job_queued = true;
                jobs.enqueue(Job::FinalizationCleanup(id));
                queued += 1;
            }
        }

        if queued > 0 {
            debug!(queued, "finalization cleanup jobs queued");
        }

        queued
    }

    /// Mark the registry's job as started and return its cleanup callback. `None` if the
    /// registry has been reclaimed since the job was queued.
    fn begin_cleanup_job(&mut self, id: RegistryId) -> Option<NativeFunction> {
        let record = self.registries.get_mut(id)?;
        record.cleanup_job_queued = false;
        Some(record.cleanup().clone())
    }

    fn requeue_cleanup_job(&mut self, id: RegistryId, jobs: &mut JobQueue) -> bool {
        let Some(record) = self.registries.get_mut(id) else {
            return false;
        };

        if record.pending.is_empty() || record.cleanup_job_queued {
            return false;
        }

        record.cleanup_job_queued = true;
        jobs.enqueue(Job::FinalizationCleanup(id));
        true
    }
}

impl Context {
    /// Body of a finalization cleanup job.
    ///
    /// Each pending registration is removed from the queue before its callback is invoked, so
    /// a callback runs at most once and an `unregister` that gets there first suppresses it.
    pub(crate) fn on_dispatch_ready(&mut self, registry: RegistryId) {
        let Some(cleanup) = self.finalization.begin_cleanup_job(registry) else {
            trace!(?registry, "cleanup job for reclaimed registry skipped");
            return;
        };

        let batch_size = self.options.cleanup_batch_size.map_or(usize::MAX, |size| size.max(1));

        let mut invoked = 0;
        while invoked < batch_size {
            let Some(held_value) = self.finalization.take_next_pending(registry) else {
                break;
            };

            self.invoke_cleanup(&cleanup, held_value);
            invoked += 1;
        }

        let requeued = self.finalization.requeue_cleanup_job(registry, &mut self.jobs);
        debug!(?registry, invoked, requeued, turn = %self.current_turn(), "cleanup job finished");
    }

    /// Call a cleanup callback with the held value rooted for the duration of the call.
    pub(crate) fn invoke_cleanup(&mut self, callback: &NativeFunction, held_value: Value) {
        let result =
            self.with_scratch_roots([held_value.clone()], |cx| callback.call(cx, held_value));

        if let Err(exception) = result {
            self.report_uncaught(exception);
        }
    }
}
