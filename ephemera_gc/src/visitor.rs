//! The two seams between the collector and the runtime that owns the objects.

use core::ptr::NonNull;

use crate::{GcPtr, GcStats, Heap};

/// Receives the pointers an object or root set reports while being traced.
pub trait GcVisitor {
    /// A strong edge to the object at `ptr`.
    fn visit_raw(&mut self, ptr: NonNull<u8>);

    /// A weak edge to the object at `ptr`. Nothing is traced; the owner of the edge
    /// checks liveness itself once marking completes.
    fn visit_weak_raw(&mut self, ptr: NonNull<u8>) {
        let _ = ptr;
    }

    #[inline]
    fn visit<T>(&mut self, ptr: &mut GcPtr<T>) {
        if !ptr.is_dangling() {
            self.visit_raw(ptr.as_non_null().cast());
        }
    }

    #[inline]
    fn visit_weak<T>(&mut self, ptr: &mut GcPtr<T>) {
        if !ptr.is_dangling() {
            self.visit_weak_raw(ptr.as_non_null().cast());
        }
    }

    #[inline]
    fn visit_opt<T>(&mut self, ptr: &mut Option<GcPtr<T>>) {
        if let Some(ptr) = ptr {
            self.visit(ptr);
        }
    }

    #[inline]
    fn visit_weak_opt<T>(&mut self, ptr: &mut Option<GcPtr<T>>) {
        if let Some(ptr) = ptr {
            self.visit_weak(ptr);
        }
    }
}

/// Implemented by the runtime. Hooks are called in this order within a cycle:
///
/// 1. `prepare_cycle`
/// 2. `visit_roots`, then `trace_object` once per reached object
/// 3. `on_mark_complete`, in the step that empties the gray queue
/// 4. `drop_object` for each unreached object as it is swept
/// 5. `on_cycle_complete`
pub trait GcContext {
    /// Reserve whatever weak processing will need, since `on_mark_complete` must not grow
    /// anything that lives on the managed heap.
    fn prepare_cycle(&mut self) {}

    fn visit_roots(&mut self, visitor: &mut impl GcVisitor);

    /// Report the outgoing pointers of the object at `object_ptr`.
    fn trace_object(&mut self, object_ptr: *mut u8, visitor: &mut impl GcVisitor);

    /// Every reachable object is marked. Use `Heap::is_alive` to find dead weak targets.
    /// Must not allocate on the managed heap.
    fn on_mark_complete(&mut self, heap: &Heap) {
        let _ = heap;
    }

    /// Drop Rust-owned data inside an unreached object before its memory is released.
    fn drop_object(&mut self, object_ptr: *mut u8) {
        let _ = object_ptr;
    }

    fn on_cycle_complete(&mut self, stats: &GcStats) {
        let _ = stats;
    }
}
