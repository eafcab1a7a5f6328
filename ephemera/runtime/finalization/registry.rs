use alloc::{collections::VecDeque, vec::Vec};

use hashbrown::HashMap;
use tracing::{debug, trace};

use crate::runtime::{
    arena::arena_index,
    domain::{edge_for_target, DomainId},
    error::WeakRefError,
    gc::{AnyHeapItem, Heap, HeapItem, HeapItemKind, HeapPtr, IsHeapItem},
    value::NativeFunction,
    Context, ObjectRef, Value,
};

use super::{Edge, FinalizationState, Registration, RegistrationId, RegistrationState};

arena_index! {
    /// Id of a registry's record. Outlives the record without aliasing later registries.
    pub struct RegistryId;
}

/// The heap object for a registry. Its registrations live in the context's side tables and are
/// traced when this object is traced.
#[repr(C)]
pub struct FinalizationRegistryObject {
    item: AnyHeapItem,
    registry_id: RegistryId,
}

impl IsHeapItem for FinalizationRegistryObject {}

impl HeapItem for FinalizationRegistryObject {
    const KIND: HeapItemKind = HeapItemKind::FinalizationRegistry;
}

impl FinalizationRegistryObject {
    #[inline]
    pub fn domain(&self) -> DomainId {
        self.item.domain()
    }

    #[inline]
    pub fn registry_id(&self) -> RegistryId {
        self.registry_id
    }
}

/// Bookkeeping for one registry.
pub struct RegistryRecord {
    cleanup: NativeFunction,
    /// Registrations whose target is still alive, in creation order.
    pub(super) active: Vec<RegistrationId>,
    /// Registrations whose target has died, in the order they will be dispatched.
    pub(super) pending: VecDeque<RegistrationId>,
    /// Identity index from unregister token to the registrations it can remove.
    pub(super) by_token: HashMap<ObjectRef, Vec<RegistrationId>>,
    pub(super) cleanup_job_queued: bool,
}

impl RegistryRecord {
    fn new(cleanup: NativeFunction) -> RegistryRecord {
        RegistryRecord {
            cleanup,
            active: Vec::new(),
            pending: VecDeque::new(),
            by_token: HashMap::new(),
            cleanup_job_queued: false,
        }
    }

    #[inline]
    pub fn cleanup(&self) -> &NativeFunction {
        &self.cleanup
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of distinct live unregister tokens.
    #[inline]
    pub fn num_tokens(&self) -> usize {
        self.by_token.len()
    }

    #[inline]
    pub fn is_cleanup_job_queued(&self) -> bool {
        self.cleanup_job_queued
    }

    #[cfg(test)]
    pub(crate) fn pending_capacity(&self) -> usize {
        self.pending.capacity()
    }

    fn unindex_token(&mut self, token: ObjectRef, registration: RegistrationId) {
        if let Some(ids) = self.by_token.get_mut(&token) {
            ids.retain(|id| *id != registration);
            if ids.is_empty() {
                self.by_token.remove(&token);
            }
        }
    }
}

impl FinalizationState {
    pub(crate) fn create_registry(&mut self, cleanup: NativeFunction) -> RegistryId {
        self.registries.insert(RegistryRecord::new(cleanup))
    }

    /// Discard a registry and all of its registrations without running any callbacks.
    pub(crate) fn drop_registry(&mut self, id: RegistryId) {
        let Some(record) = self.registries.remove(id) else {
            return;
        };

        let discarded = self.discard_registrations(record.active.iter().chain(record.pending.iter()));
        if discarded > 0 {
            trace!(registry = ?id, discarded, "registry reclaimed with outstanding registrations");
        }
    }

    fn discard_registrations<'a>(
        &mut self,
        ids: impl Iterator<Item = &'a RegistrationId>,
    ) -> usize {
        let mut discarded = 0;
        for id in ids {
            if let Some(mut registration) = self.registrations.remove(*id) {
                registration.remove();
                discarded += 1;
            }
        }
        discarded
    }

    pub(crate) fn register(
        &mut self,
        id: RegistryId,
        target: Edge,
        held_value: Value,
        unregister_token: Option<Edge>,
        marking: bool,
    ) {
        let Some(record) = self.registries.get_mut(id) else {
            return;
        };

        let registration_id = self.registrations.insert(Registration::new(
            id,
            target,
            held_value,
            unregister_token,
        ));

        record.active.push(registration_id);

        // Keep the room reserved by `prepare_cycle` in step with registrations made mid-cycle
        if marking {
            record.pending.reserve(record.active.len());
        }

        if let Some(token) = unregister_token {
            record
                .by_token
                .entry(token.target())
                .or_default()
                .push(registration_id);
        }
    }

    /// Remove every registration, active or pending, registered with `token`.
    pub(crate) fn unregister(&mut self, id: RegistryId, token: ObjectRef) -> bool {
        let FinalizationState { registries, registrations, .. } = self;

        let Some(record) = registries.get_mut(id) else {
            return false;
        };
        let Some(ids) = record.by_token.remove(&token) else {
            return false;
        };

        let mut removed = false;
        for registration_id in ids {
            let Some(mut registration) = registrations.remove(registration_id) else {
                continue;
            };

            match registration.state() {
                RegistrationState::Active => {
                    record.active.retain(|id| *id != registration_id)
                }
                RegistrationState::PendingFinalization => {
                    record.pending.retain(|id| *id != registration_id)
                }
                state => unreachable!("indexed registration in state {state:?}"),
            }

            registration.remove();
            removed = true;
        }

        removed
    }

    /// Discard every active and pending registration of a registry. The registry stays usable.
    pub(crate) fn shutdown(&mut self, id: RegistryId) -> usize {
        let Some(record) = self.registries.get_mut(id) else {
            return 0;
        };

        let active = core::mem::take(&mut record.active);
        let pending = core::mem::take(&mut record.pending);
        record.by_token.clear();

        self.discard_registrations(active.iter().chain(pending.iter()))
    }

    /// Pop the next pending registration of a registry and finalize it, returning its held
    /// value. The registration is gone before the caller invokes any callback.
    pub(crate) fn take_next_pending(&mut self, id: RegistryId) -> Option<Value> {
        let FinalizationState { registries, registrations, .. } = self;

        let record = registries.get_mut(id)?;
        let registration_id = record.pending.pop_front()?;
        let registration = registrations.remove(registration_id)?;

        if let Some(token) = registration.unregister_token() {
            record.unindex_token(token, registration_id);
        }

        Some(registration.finalize())
    }
}

/// Finalization registry operations.
pub struct FinalizationRegistry;

impl FinalizationRegistry {
    /// Create a registry in the current domain. `cleanup` must be callable.
    pub fn create(
        cx: &mut Context,
        cleanup: Value,
    ) -> Result<HeapPtr<FinalizationRegistryObject>, WeakRefError> {
        let cleanup = match cleanup {
            Value::Function(function) => function,
            other => return Err(WeakRefError::InvalidCallback(other.type_name())),
        };

        let domain = cx.current_domain();
        let registry_id = cx.finalization.create_registry(cleanup);

        let result = Heap::alloc(
            cx,
            FinalizationRegistryObject {
                item: AnyHeapItem::new::<FinalizationRegistryObject>(domain),
                registry_id,
            },
        );

        match result {
            Ok(registry) => {
                debug!(registry = ?registry_id, %domain, "finalization registry created");
                Ok(registry)
            }
            Err(err) => {
                cx.finalization.drop_registry(registry_id);
                Err(err.into())
            }
        }
    }

    /// Register `target` so that `held_value` is passed to the registry's cleanup callback
    /// after the target dies. `unregister_token` of `None` or `undefined` means the
    /// registration can never be unregistered.
    pub fn register(
        cx: &mut Context,
        registry: HeapPtr<FinalizationRegistryObject>,
        target: Value,
        held_value: Value,
        unregister_token: Option<Value>,
    ) -> Result<(), WeakRefError> {
        let target_object = target.to_heap_object(WeakRefError::InvalidTarget)?;

        if held_value.same_value(&target) {
            return Err(WeakRefError::HeldValueIsTarget);
        }

        let token = match unregister_token {
            None | Some(Value::Undefined) => None,
            Some(token) => Some(token.to_heap_object(WeakRefError::InvalidToken)?),
        };

        let domain = registry.domain();
        let target_edge = edge_for_target(domain, target_object);
        let token_edge = token.map(|token| edge_for_target(domain, token));

        // The registry may already be black, traced earlier in this cycle or allocated during it.
        // A weak token is shaded too since its index entry must not outlive it.
        cx.heap.write_barrier(target_object);
        cx.heap.write_barrier_value(&held_value);
        if let Some(token) = token {
            cx.heap.write_barrier(token);
        }

        let marking = cx.heap.is_marking();
        cx.finalization.register(
            registry.registry_id(),
            target_edge,
            held_value,
            token_edge,
            marking,
        );

        Ok(())
    }

    /// Remove every registration made with `token`, including ones already condemned whose
    /// callback has not run. Returns whether anything was removed.
    pub fn unregister(
        cx: &mut Context,
        registry: HeapPtr<FinalizationRegistryObject>,
        token: &Value,
    ) -> bool {
        let Some(token) = token.as_object() else {
            return false;
        };

        let removed = cx.finalization.unregister(registry.registry_id(), token);
        trace!(registry = ?registry.registry_id(), removed, "unregister");

        removed
    }

    /// Discard all registrations without running any callbacks. Repeated calls are no-ops.
    pub fn shutdown(cx: &mut Context, registry: HeapPtr<FinalizationRegistryObject>) {
        let discarded = cx.finalization.shutdown(registry.registry_id());
        debug!(registry = ?registry.registry_id(), discarded, "finalization registry shut down");
    }

    /// Synchronously run the cleanup callback, or `callback` if provided, for every pending
    /// registration. Returns the number of callbacks invoked.
    pub fn cleanup_some(
        cx: &mut Context,
        registry: HeapPtr<FinalizationRegistryObject>,
        callback: Option<Value>,
    ) -> Result<usize, WeakRefError> {
        let registry_id = registry.registry_id();

        let callback = match callback {
            None | Some(Value::Undefined) => match cx.finalization.registry(registry_id) {
                Some(record) => record.cleanup().clone(),
                None => return Ok(0),
            },
            Some(Value::Function(function)) => function,
            Some(other) => return Err(WeakRefError::InvalidCallback(other.type_name())),
        };

        let mut invoked = 0;
        while let Some(held_value) = cx.finalization.take_next_pending(registry_id) {
            cx.invoke_cleanup(&callback, held_value);
            invoked += 1;
        }

        Ok(invoked)
    }

    /// Number of registrations whose target has died and whose callback has not run.
    pub fn pending_count(cx: &Context, registry: HeapPtr<FinalizationRegistryObject>) -> usize {
        cx.finalization
            .registry(registry.registry_id())
            .map_or(0, RegistryRecord::pending_count)
    }

    /// Number of registrations whose target is still alive.
    pub fn active_count(cx: &Context, registry: HeapPtr<FinalizationRegistryObject>) -> usize {
        cx.finalization
            .registry(registry.registry_id())
            .map_or(0, RegistryRecord::active_count)
    }
}
