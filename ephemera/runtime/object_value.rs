use alloc::vec::Vec;

use super::{
    domain::DomainId,
    gc::{AllocResult, AnyHeapItem, GcVisitorExt, Heap, HeapItem, HeapItemKind, HeapPtr, IsHeapItem},
    Context, Value,
};

/// An ordinary object: an ordered list of slots holding values strongly.
#[repr(C)]
pub struct ObjectValue {
    item: AnyHeapItem,
    slots: Vec<Value>,
}

impl IsHeapItem for ObjectValue {}

impl HeapItem for ObjectValue {
    const KIND: HeapItemKind = HeapItemKind::OrdinaryObject;
}

impl ObjectValue {
    /// Allocate an object in the current domain with the given slots.
    pub fn new(cx: &mut Context, slots: Vec<Value>) -> AllocResult<HeapPtr<ObjectValue>> {
        let domain = cx.current_domain();
        cx.with_scratch_roots(slots.clone(), |cx| {
            Heap::alloc(cx, ObjectValue { item: AnyHeapItem::new::<ObjectValue>(domain), slots })
        })
    }

    /// Allocate an object with no slots.
    pub fn new_empty(cx: &mut Context) -> AllocResult<HeapPtr<ObjectValue>> {
        Self::new(cx, Vec::new())
    }

    #[inline]
    pub fn domain(&self) -> DomainId {
        self.item.domain()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn slots(&self) -> &[Value] {
        &self.slots
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.slots.get(index).cloned()
    }

    pub fn visit_pointers(&mut self, visitor: &mut impl GcVisitorExt) {
        for slot in self.slots.iter_mut() {
            visitor.visit_value(slot);
        }
    }
}

impl HeapPtr<ObjectValue> {
    /// Store a value into an existing slot. Returns false if the slot does not exist.
    pub fn set(&mut self, cx: &mut Context, index: usize, value: Value) -> bool {
        if index >= self.slots.len() {
            return false;
        }

        cx.heap.write_barrier_value(&value);
        self.slots[index] = value;
        true
    }

    /// Append a value as a new slot.
    pub fn push(&mut self, cx: &mut Context, value: Value) {
        cx.heap.write_barrier_value(&value);
        self.slots.push(value);
    }
}
