//! Finalization registries and the scheduler that ties them to the collector.
//!
//! A registration moves `Active -> PendingFinalization` atomically with the end of marking, and
//! `PendingFinalization -> Finalized` from a deferred cleanup job, never inline with the
//! collector or the code that dropped the target.

mod registration;
mod registry;
mod scheduler;

use alloc::vec::Vec;

use super::{arena::Arena, gc::HeapPtr, weak_ref::WeakRefObject};

pub use registration::{Edge, Registration, RegistrationId, RegistrationState};
pub use registry::{FinalizationRegistry, FinalizationRegistryObject, RegistryId, RegistryRecord};
pub use scheduler::ScheduleSummary;

/// Side tables for every registry and registration in a context, plus the per-cycle list of
/// weak handles and registries encountered while marking.
pub struct FinalizationState {
    registries: Arena<RegistryId, RegistryRecord>,
    registrations: Arena<RegistrationId, Registration>,

    /// Weak handles whose target was visited weakly this cycle.
    encountered_weak_refs: Vec<HeapPtr<WeakRefObject>>,
    /// Registries traced this cycle.
    encountered_registries: Vec<RegistryId>,

    /// Number of weak handles on the heap, used to pre-size `encountered_weak_refs`.
    live_weak_refs: usize,
}

impl FinalizationState {
    pub fn new() -> FinalizationState {
        FinalizationState {
            registries: Arena::new(),
            registrations: Arena::new(),
            encountered_weak_refs: Vec::new(),
            encountered_registries: Vec::new(),
            live_weak_refs: 0,
        }
    }

    #[inline]
    pub fn num_registries(&self) -> usize {
        self.registries.len()
    }

    #[inline]
    pub fn num_registrations(&self) -> usize {
        self.registrations.len()
    }

    #[inline]
    pub fn live_weak_refs(&self) -> usize {
        self.live_weak_refs
    }

    pub fn registry(&self, id: RegistryId) -> Option<&RegistryRecord> {
        self.registries.get(id)
    }

    pub fn registration(&self, id: RegistrationId) -> Option<&Registration> {
        self.registrations.get(id)
    }

    pub(crate) fn on_weak_ref_created(&mut self) {
        self.live_weak_refs += 1;
    }

    pub(crate) fn on_weak_ref_dropped(&mut self) {
        self.live_weak_refs -= 1;
    }
}
