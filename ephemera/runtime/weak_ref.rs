use super::{
    domain::{edge_for_target, DomainId},
    error::WeakRefError,
    finalization::Edge,
    gc::{AnyHeapItem, GcVisitorExt, Heap, HeapItem, HeapItemKind, HeapPtr, IsHeapItem},
    turn::Turn,
    Context, ObjectRef, Value,
};

/// A weak handle: an observable reference to a target that does not by itself keep the target
/// alive across turns.
#[repr(C)]
pub struct WeakRefObject {
    item: AnyHeapItem,
    /// Empty once cleared. Never repopulated.
    target: Option<Edge>,
    /// Last turn in which the target was produced by creation or dereference.
    observed_turn: Turn,
}

impl IsHeapItem for WeakRefObject {}

impl HeapItem for WeakRefObject {
    const KIND: HeapItemKind = HeapItemKind::WeakRef;
}

impl WeakRefObject {
    #[inline]
    pub fn domain(&self) -> DomainId {
        self.item.domain()
    }

    /// The current target without observing it.
    #[inline]
    pub fn target(&self) -> Option<ObjectRef> {
        self.target.as_ref().map(Edge::target)
    }

    #[inline]
    pub fn target_edge(&self) -> Option<&Edge> {
        self.target.as_ref()
    }

    #[inline]
    pub fn observed_turn(&self) -> Turn {
        self.observed_turn
    }

    #[inline]
    pub fn is_cleared(&self) -> bool {
        self.target.is_none()
    }

    /// Clear the target if it is held weakly and did not survive marking.
    pub(crate) fn clear_if_dead(&mut self, heap: &ephemera_gc::Heap) -> bool {
        match &self.target {
            Some(Edge::Weak(target)) if !heap.is_alive(target.into_gc_ptr()) => {
                self.target = None;
                true
            }
            _ => false,
        }
    }

    /// Visit the target during marking.
    ///
    /// A target observed in the turn being traced is held strongly for this cycle. Otherwise a
    /// weakly held target is left unmarked and true is returned, meaning this handle must be
    /// checked once marking completes.
    pub(crate) fn visit_pointers(&mut self, turn: Turn, visitor: &mut impl GcVisitorExt) -> bool {
        match &mut self.target {
            None => false,
            Some(Edge::Strong(target)) => {
                visitor.visit_pointer(target);
                false
            }
            Some(Edge::Weak(target)) => {
                if self.observed_turn == turn {
                    visitor.visit_pointer(target);
                    false
                } else {
                    visitor.visit_weak_pointer(target);
                    true
                }
            }
        }
    }
}

/// Weak handle operations.
pub struct WeakRef;

impl WeakRef {
    /// Create a weak handle to `target`, observing the target in the current turn.
    pub fn create(cx: &mut Context, target: Value) -> Result<HeapPtr<WeakRefObject>, WeakRefError> {
        let target = target.to_heap_object(WeakRefError::InvalidTarget)?;

        let domain = cx.current_domain();
        let edge = edge_for_target(domain, target);
        let observed_turn = cx.current_turn();

        let weak_ref = cx.with_scratch_roots([Value::Object(target)], |cx| {
            Heap::alloc(
                cx,
                WeakRefObject {
                    item: AnyHeapItem::new::<WeakRefObject>(domain),
                    target: Some(edge),
                    observed_turn,
                },
            )
        })?;

        cx.finalization.on_weak_ref_created();

        Ok(weak_ref)
    }

    /// Return the current target, or `None` if the handle has been cleared.
    ///
    /// Observes the target in the current turn, so it cannot be cleared by any collection that
    /// completes its marking before the turn ends.
    pub fn deref(cx: &mut Context, mut weak_ref: HeapPtr<WeakRefObject>) -> Option<ObjectRef> {
        weak_ref.observed_turn = cx.current_turn();

        let target = weak_ref.target()?;
        cx.heap.write_barrier(target);

        Some(target)
    }

    /// Empty the handle. Clearing an already empty handle does nothing.
    pub fn clear(mut weak_ref: HeapPtr<WeakRefObject>) {
        weak_ref.target = None;
    }

    /// Same as `deref`, for a handle stored in a value.
    pub fn deref_value(cx: &mut Context, weak_ref: &Value) -> Option<ObjectRef> {
        let weak_ref = weak_ref.as_object()?.as_weak_ref()?;
        Self::deref(cx, weak_ref)
    }
}
