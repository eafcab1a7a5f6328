use alloc::vec::Vec;

use crate::runtime::{
    arena::{arena_index, Arena},
    gc::GcVisitorExt,
    Value,
};

arena_index! {
    /// Handle to a persistent root. Stale ids are ignored.
    pub struct RootId;
}

/// The mutator's roots.
///
/// Persistent roots keep a value alive until explicitly removed. Scratch roots form a stack
/// used to keep operands alive while an operation allocates or runs a callback, and are
/// truncated back to a saved height when that operation returns.
pub struct RootSet {
    persistent: Arena<RootId, Value>,
    scratch: Vec<Value>,
}

impl RootSet {
    pub fn new() -> RootSet {
        RootSet { persistent: Arena::new(), scratch: Vec::new() }
    }

    pub fn add(&mut self, value: Value) -> RootId {
        self.persistent.insert(value)
    }

    pub fn remove(&mut self, id: RootId) -> Option<Value> {
        self.persistent.remove(id)
    }

    pub fn get(&self, id: RootId) -> Option<&Value> {
        self.persistent.get(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.persistent.len()
    }

    #[inline]
    pub fn scratch_height(&self) -> usize {
        self.scratch.len()
    }

    #[inline]
    pub fn push_scratch(&mut self, value: Value) {
        self.scratch.push(value);
    }

    #[inline]
    pub fn truncate_scratch(&mut self, height: usize) {
        self.scratch.truncate(height);
    }

    pub fn visit_roots(&mut self, visitor: &mut impl GcVisitorExt) {
        for (_, value) in self.persistent.iter_mut() {
            visitor.visit_value(value);
        }

        for value in self.scratch.iter_mut() {
            visitor.visit_value(value);
        }
    }
}
