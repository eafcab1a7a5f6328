use crate::runtime::{
    arena::arena_index,
    gc::GcVisitorExt,
    ObjectRef, Value,
};

use super::RegistryId;

arena_index! {
    pub struct RegistrationId;
}

/// A reference together with its ownership tag.
///
/// Weak edges are not traced and are checked for liveness once marking completes. Strong edges
/// are traced like any other field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Strong(ObjectRef),
    Weak(ObjectRef),
}

impl Edge {
    #[inline]
    pub fn target(&self) -> ObjectRef {
        match self {
            Edge::Strong(target) | Edge::Weak(target) => *target,
        }
    }

    #[inline]
    pub fn is_weak(&self) -> bool {
        matches!(self, Edge::Weak(_))
    }

    #[inline]
    pub fn is_alive(&self, heap: &ephemera_gc::Heap) -> bool {
        match self {
            Edge::Strong(_) => true,
            Edge::Weak(target) => heap.is_alive(target.into_gc_ptr()),
        }
    }
}

/// Lifecycle of a registration. Every transition moves forward; nothing re-enters `Active`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationState {
    /// Waiting for the target to die.
    Active,
    /// Target died. Queued on its registry until the cleanup callback runs.
    PendingFinalization,
    /// The cleanup callback has been invoked with the held value.
    Finalized,
    /// Unregistered, or discarded by shutdown or registry death. The callback never runs.
    Removed,
}

/// Records that a registry wants `held_value` delivered to its cleanup callback once `target`
/// is dead.
pub struct Registration {
    registry: RegistryId,
    /// Cleared when the registration is condemned.
    target: Option<Edge>,
    held_value: Value,
    /// Cleared once the token itself has died.
    unregister_token: Option<Edge>,
    state: RegistrationState,
}

impl Registration {
    pub fn new(
        registry: RegistryId,
        target: Edge,
        held_value: Value,
        unregister_token: Option<Edge>,
    ) -> Registration {
        Registration {
            registry,
            target: Some(target),
            held_value,
            unregister_token,
            state: RegistrationState::Active,
        }
    }

    #[inline]
    pub fn registry(&self) -> RegistryId {
        self.registry
    }

    #[inline]
    pub fn state(&self) -> RegistrationState {
        self.state
    }

    #[inline]
    pub fn target(&self) -> Option<&Edge> {
        self.target.as_ref()
    }

    #[inline]
    pub fn held_value(&self) -> &Value {
        &self.held_value
    }

    #[inline]
    pub fn unregister_token(&self) -> Option<ObjectRef> {
        self.unregister_token.as_ref().map(Edge::target)
    }

    /// Whether the target is weakly held and did not survive marking.
    pub fn target_is_dead(&self, heap: &ephemera_gc::Heap) -> bool {
        match &self.target {
            Some(edge) => !edge.is_alive(heap),
            None => false,
        }
    }

    /// Active -> PendingFinalization. The dead target is dropped.
    pub fn condemn(&mut self) {
        debug_assert_eq!(self.state, RegistrationState::Active);
        self.state = RegistrationState::PendingFinalization;
        self.target = None;
    }

    /// PendingFinalization -> Finalized. Returns the held value for the cleanup callback.
    pub fn finalize(mut self) -> Value {
        debug_assert_eq!(self.state, RegistrationState::PendingFinalization);
        self.state = RegistrationState::Finalized;
        self.held_value
    }

    /// Active or PendingFinalization -> Removed.
    pub fn remove(&mut self) {
        debug_assert!(matches!(
            self.state,
            RegistrationState::Active | RegistrationState::PendingFinalization
        ));
        self.state = RegistrationState::Removed;
    }

    pub fn clear_unregister_token(&mut self) {
        self.unregister_token = None;
    }

    /// Visit everything this registration holds strongly.
    pub fn visit_pointers(&mut self, visitor: &mut impl GcVisitorExt) {
        visitor.visit_value(&mut self.held_value);

        if let Some(Edge::Strong(target)) = &mut self.target {
            visitor.visit_pointer(target);
        }

        if let Some(Edge::Strong(token)) = &mut self.unregister_token {
            visitor.visit_pointer(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::gc::HeapPtr;
    use crate::runtime::arena::Arena;

    fn registration() -> Registration {
        let target = HeapPtr::from_gc_ptr(ephemera_gc::GcPtr::dangling());
        let registry = Arena::<RegistryId, ()>::new().insert(());
        Registration::new(registry, Edge::Weak(target), Value::from("held"), None)
    }

    #[test]
    fn condemn_then_finalize() {
        let mut registration = registration();
        assert_eq!(registration.state(), RegistrationState::Active);
        assert!(registration.target().is_some());

        registration.condemn();
        assert_eq!(registration.state(), RegistrationState::PendingFinalization);
        assert!(registration.target().is_none());

        assert_eq!(registration.finalize(), Value::from("held"));
    }

    #[test]
    fn remove_from_active() {
        let mut registration = registration();
        registration.remove();
        assert_eq!(registration.state(), RegistrationState::Removed);
    }

    #[test]
    fn edge_tags() {
        let target = HeapPtr::from_gc_ptr(ephemera_gc::GcPtr::dangling());
        assert!(Edge::Weak(target).is_weak());
        assert!(!Edge::Strong(target).is_weak());
        assert_eq!(Edge::Strong(target).target(), target);
    }
}
