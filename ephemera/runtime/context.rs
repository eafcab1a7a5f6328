use alloc::{rc::Rc, vec::Vec};

use tracing::{debug, warn};

use crate::common::options::Options;

use super::{
    domain::{DomainId, Domains},
    error::Exception,
    finalization::{FinalizationRegistry, FinalizationRegistryObject, FinalizationState},
    gc::{AllocResult, GcPhase, GcStats, Heap, HeapPtr},
    jobs::{Job, JobQueue},
    object_value::ObjectValue,
    stack::{RootId, RootSet},
    turn::{Turn, TurnClock},
    ObjectRef, Value,
};

/// An agent: one heap, one turn clock and one job queue.
///
/// Values handed out by the context are only kept alive by roots. Anything the host wants to
/// keep across an allocation must be rooted with `Context::root` first.
pub struct Context {
    pub(crate) heap: Heap,
    pub(crate) roots: RootSet,
    pub(crate) finalization: FinalizationState,
    pub(crate) jobs: JobQueue,
    pub(crate) clock: TurnClock,
    pub(crate) options: Rc<Options>,
    domains: Domains,
    uncaught_exceptions: Vec<Exception>,
}

pub struct ContextBuilder {
    options: Option<Rc<Options>>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        ContextBuilder { options: None }
    }

    pub fn set_options(mut self, options: Rc<Options>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn build(self) -> Context {
        let options = self.options.unwrap_or_default();
        Context::new(options)
    }
}

impl Context {
    fn new(options: Rc<Options>) -> Context {
        Context {
            heap: Heap::new(&options),
            roots: RootSet::new(),
            finalization: FinalizationState::new(),
            jobs: JobQueue::new(),
            clock: TurnClock::new(),
            options,
            domains: Domains::new(),
            uncaught_exceptions: Vec::new(),
        }
    }

    #[inline]
    pub fn options(&self) -> &Rc<Options> {
        &self.options
    }

    // ------------------------------------------------------------------------
    // Turns
    // ------------------------------------------------------------------------

    #[inline]
    pub fn current_turn(&self) -> Turn {
        self.clock.current()
    }

    /// End the current turn. Targets observed so far are no longer pinned.
    pub fn advance_turn(&mut self) -> Turn {
        self.clock.advance()
    }

    /// Start a new turn and run `f` in it.
    pub fn execute_turn<R>(&mut self, f: impl FnOnce(&mut Context) -> R) -> R {
        self.advance_turn();
        f(self)
    }

    // ------------------------------------------------------------------------
    // Domains
    // ------------------------------------------------------------------------

    #[inline]
    pub fn current_domain(&self) -> DomainId {
        self.domains.current()
    }

    pub fn create_domain(&mut self) -> DomainId {
        self.domains.create()
    }

    /// Run `f` with `domain` as the current domain. Objects allocated by `f` belong to it.
    pub fn enter_domain<R>(&mut self, domain: DomainId, f: impl FnOnce(&mut Context) -> R) -> R {
        let previous = self.domains.set_current(domain);
        let result = f(self);
        self.domains.set_current(previous);
        result
    }

    // ------------------------------------------------------------------------
    // Roots
    // ------------------------------------------------------------------------

    /// Keep `value` alive until it is unrooted.
    pub fn root(&mut self, value: impl Into<Value>) -> RootId {
        let value = value.into();
        self.heap.write_barrier_value(&value);
        self.roots.add(value)
    }

    /// Drop a root, returning the value it held. Unknown or already removed ids return `None`.
    pub fn unroot(&mut self, id: RootId) -> Option<Value> {
        self.roots.remove(id)
    }

    pub fn get_root(&self, id: RootId) -> Option<Value> {
        self.roots.get(id).cloned()
    }

    #[inline]
    pub fn num_roots(&self) -> usize {
        self.roots.len()
    }

    /// Run `f` with `values` temporarily rooted.
    pub fn with_scratch_roots<R>(
        &mut self,
        values: impl IntoIterator<Item = Value>,
        f: impl FnOnce(&mut Context) -> R,
    ) -> R {
        let height = self.roots.scratch_height();
        for value in values {
            self.heap.write_barrier_value(&value);
            self.roots.push_scratch(value);
        }

        let result = f(self);

        self.roots.truncate_scratch(height);
        result
    }

    // ------------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------------

    pub fn alloc_object(&mut self, slots: Vec<Value>) -> AllocResult<ObjectRef> {
        Ok(ObjectValue::new(self, slots)?.as_any())
    }

    /// Read a slot of an ordinary object.
    pub fn get_slot(&self, object: ObjectRef, index: usize) -> Option<Value> {
        object.as_object_value()?.get(index)
    }

    /// Write a slot of an ordinary object. Returns false if `object` is not an ordinary
    /// object or has no such slot.
    pub fn set_slot(&mut self, object: ObjectRef, index: usize, value: Value) -> bool {
        match object.as_object_value() {
            Some(mut object) => object.set(self, index, value),
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------------

    /// Run a full collection cycle synchronously.
    pub fn collect_garbage(&mut self) {
        Heap::run_gc(self);
    }

    /// Start an incremental cycle if none is in progress.
    pub fn start_gc(&mut self) {
        Heap::start_gc(self);
    }

    /// Advance the in-progress cycle by one step. Returns true while the cycle is unfinished.
    pub fn gc_step(&mut self) -> bool {
        Heap::gc_step(self)
    }

    /// Finish the in-progress cycle, if any.
    pub fn finish_gc(&mut self) -> usize {
        Heap::finish_gc(self)
    }

    #[inline]
    pub fn gc_phase(&self) -> GcPhase {
        self.heap.phase()
    }

    #[inline]
    pub fn gc_stats(&self) -> GcStats {
        self.heap.stats()
    }

    #[inline]
    pub fn num_objects(&self) -> usize {
        self.heap.num_objects()
    }

    #[inline]
    pub fn bytes_allocated(&self) -> usize {
        self.heap.bytes_allocated()
    }

    #[cfg(feature = "gc_stress_test")]
    pub fn set_gc_stress_test(&mut self, enabled: bool) {
        self.heap.gc_stress_test = enabled;
    }

    #[inline]
    pub fn finalization(&self) -> &FinalizationState {
        &self.finalization
    }

    // ------------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------------

    #[inline]
    pub fn has_pending_jobs(&self) -> bool {
        !self.jobs.is_empty()
    }

    #[inline]
    pub fn num_pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Number of registrations of `registry` waiting for their cleanup callback.
    pub fn pending_cleanup_count(&self, registry: HeapPtr<FinalizationRegistryObject>) -> usize {
        FinalizationRegistry::pending_count(self, registry)
    }

    /// Run the next queued job in a turn of its own. Returns false if the queue was empty.
    pub fn run_next_job(&mut self) -> bool {
        let Some(job) = self.jobs.pop() else {
            return false;
        };

        let turn = self.advance_turn();
        debug!(?job, %turn, "running job");

        match job {
            Job::FinalizationCleanup(registry) => self.on_dispatch_ready(registry),
        }

        true
    }

    /// Run jobs until the queue is empty, including jobs queued by the jobs themselves.
    /// Returns the number of jobs run.
    pub fn run_jobs(&mut self) -> usize {
        let mut num_jobs = 0;
        while self.run_next_job() {
            num_jobs += 1;
        }
        num_jobs
    }

    // ------------------------------------------------------------------------
    // Errors and output
    // ------------------------------------------------------------------------

    pub(crate) fn report_uncaught(&mut self, exception: Exception) {
        warn!(%exception, turn = %self.current_turn(), "uncaught exception in job");
        self.uncaught_exceptions.push(exception);
    }

    /// Errors thrown by callbacks invoked from jobs, in the order they were thrown.
    pub fn uncaught_exceptions(&self) -> &[Exception] {
        &self.uncaught_exceptions
    }

    pub fn take_uncaught_exceptions(&mut self) -> Vec<Exception> {
        core::mem::take(&mut self.uncaught_exceptions)
    }

    /// Print a line to the dump buffer if one is configured, otherwise to stdout.
    pub fn print(&self, line: &str) {
        match self.options.dump_buffer() {
            Some(mut buffer) => {
                buffer.push_str(line);
                buffer.push('\n');
            }
            None => println!("{line}"),
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        Heap::destroy_all(self);
    }
}
