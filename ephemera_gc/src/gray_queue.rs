//! Worklist of objects that have been reached but not traced.

use alloc::vec::Vec;
use core::ptr::NonNull;

use crate::gc_header::{GcColor, GcHeader};

/// LIFO worklist of gray objects.
#[derive(Default)]
pub struct GrayQueue {
    stack: Vec<NonNull<GcHeader>>,
}

impl GrayQueue {
    pub const fn new() -> GrayQueue {
        GrayQueue { stack: Vec::new() }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Turn a white object gray and queue it. Gray and black objects are left alone.
    ///
    /// # Safety
    /// `object_ptr` must point to a live object allocated by the heap owning this queue.
    #[inline]
    pub unsafe fn shade(&mut self, object_ptr: *const u8) {
        let header = GcHeader::from_object_ptr(object_ptr);
        if header.color() == GcColor::White {
            header.set_color(GcColor::Gray);
            self.stack.push(NonNull::from(header));
        }
    }

    #[inline]
    pub fn pop(&mut self) -> Option<NonNull<GcHeader>> {
        self.stack.pop()
    }

    /// Forget every queued object, used when the heap is torn down mid-cycle.
    #[inline]
    pub fn clear(&mut self) {
        self.stack.clear();
    }
}
