//! Heap - wraps ephemera_gc::Heap with runtime-specific functionality
//!
//! This provides the memory allocation and GC interface for the ephemera runtime, and the
//! `RuntimeContext` through which the collector calls back into weak handle and finalization
//! registry bookkeeping.

use ephemera_gc::{GcContext, GcPhase, GcStats, GcVisitor};
use tracing::{debug, trace};

use crate::{
    common::options::Options,
    runtime::{
        finalization::{FinalizationRegistryObject, FinalizationState},
        jobs::JobQueue,
        object_value::ObjectValue,
        stack::RootSet,
        turn::Turn,
        weak_ref::WeakRefObject,
        Context, Value,
    },
};

use super::{
    heap_item::{AnyHeapItem, HeapItemKind},
    AllocResult, HeapItem, HeapPtr,
};

/// Heap - wraps ephemera_gc::Heap
pub struct Heap {
    /// The underlying GC heap
    gc_heap: ephemera_gc::Heap,

    #[cfg(feature = "gc_stress_test")]
    pub gc_stress_test: bool,
}

impl Heap {
    pub fn new(options: &Options) -> Heap {
        let mut gc_heap = ephemera_gc::Heap::new();
        gc_heap.set_max_heap_size(options.heap_size);
        gc_heap.set_gc_threshold(options.gc_threshold);

        Heap {
            gc_heap,

            #[cfg(feature = "gc_stress_test")]
            gc_stress_test: false,
        }
    }

    /// Allocate and initialize a heap item.
    ///
    /// Values reachable only from `item` are not rooted while the allocation runs GC work, so
    /// callers must keep them alive by other means (see `Context::with_scratch_roots`).
    pub fn alloc<T: HeapItem>(cx: &mut Context, item: T) -> AllocResult<HeapPtr<T>> {
        let ptr = Self::alloc_uninit::<T>(cx)?;
        unsafe { ptr.as_ptr().write(item) };
        Ok(ptr)
    }

    /// Allocate an uninitialized object of a given type. Must be initialized before the next
    /// allocation.
    pub fn alloc_uninit<T>(cx: &mut Context) -> AllocResult<HeapPtr<T>> {
        // Run a full GC on every allocation in stress test mode
        #[cfg(feature = "gc_stress_test")]
        if cx.heap.gc_stress_test {
            Self::run_gc(cx);
        }

        if cx.heap.gc_heap.should_gc() {
            Self::start_gc(cx);
        }

        let result = {
            let (gc_heap, mut ctx) = Self::split(cx);
            gc_heap.alloc::<T>(&mut ctx)
        };

        match result {
            Ok(gc_ptr) => Ok(HeapPtr::from_gc_ptr(gc_ptr)),
            Err(_) => {
                // Run a full GC and try again
                Self::run_gc(cx);

                let (gc_heap, mut ctx) = Self::split(cx);
                match gc_heap.alloc::<T>(&mut ctx) {
                    Ok(gc_ptr) => Ok(HeapPtr::from_gc_ptr(gc_ptr)),
                    Err(err) => {
                        debug!(
                            bytes_allocated = gc_heap.bytes_allocated(),
                            "allocation failed after full collection"
                        );
                        Err(err)
                    }
                }
            }
        }
    }

    /// Start an incremental GC cycle. Does nothing if a cycle is already in progress.
    pub fn start_gc(cx: &mut Context) {
        let (gc_heap, mut ctx) = Self::split(cx);
        gc_heap.start_gc(&mut ctx);
    }

    /// Run incremental GC step. Returns true if the cycle is still in progress.
    pub fn gc_step(cx: &mut Context) -> bool {
        let (gc_heap, mut ctx) = Self::split(cx);
        gc_heap.gc_step(&mut ctx)
    }

    /// Finish the in-progress cycle, if any. Returns the number of steps taken.
    pub fn finish_gc(cx: &mut Context) -> usize {
        let (gc_heap, mut ctx) = Self::split(cx);
        gc_heap.finish_gc(&mut ctx)
    }

    /// Run a full garbage collection cycle
    ///
    /// An in-progress cycle is finished first since objects that became unreachable during it
    /// may have been allocated black.
    pub fn run_gc(cx: &mut Context) {
        let (gc_heap, mut ctx) = Self::split(cx);
        if gc_heap.gc_in_progress() {
            gc_heap.finish_gc(&mut ctx);
        }

        gc_heap.start_gc(&mut ctx);
        gc_heap.finish_gc(&mut ctx);
    }

    /// Drop and free every heap item, reachable or not.
    pub fn destroy_all(cx: &mut Context) {
        let (gc_heap, mut ctx) = Self::split(cx);
        gc_heap.destroy_all(&mut ctx);
    }

    /// Gray `ptr` if a cycle is marking. Must be called whenever a pointer becomes reachable
    /// from an already scanned object or root.
    #[inline]
    pub fn write_barrier<T>(&mut self, ptr: HeapPtr<T>) {
        self.gc_heap.write_barrier(ptr.into_gc_ptr());
    }

    #[inline]
    pub fn write_barrier_value(&mut self, value: &Value) {
        if let Value::Object(object) = value {
            self.write_barrier(*object);
        }
    }

    #[inline]
    pub fn phase(&self) -> GcPhase {
        self.gc_heap.phase()
    }

    #[inline]
    pub fn is_marking(&self) -> bool {
        self.gc_heap.is_marking()
    }

    #[inline]
    pub fn stats(&self) -> GcStats {
        self.gc_heap.stats()
    }

    #[inline]
    pub fn num_objects(&self) -> usize {
        self.gc_heap.num_objects()
    }

    #[inline]
    pub fn bytes_allocated(&self) -> usize {
        self.gc_heap.bytes_allocated()
    }

    /// Borrow the GC heap alongside the parts of the context the collector calls back into.
    fn split(cx: &mut Context) -> (&mut ephemera_gc::Heap, RuntimeContext<'_>) {
        let turn = cx.clock.current();
        let ctx = RuntimeContext {
            roots: &mut cx.roots,
            finalization: &mut cx.finalization,
            jobs: &mut cx.jobs,
            turn,
        };

        (&mut cx.heap.gc_heap, ctx)
    }
}

/// Implements the collector hooks for the runtime.
///
/// Holds the current turn so that weak handles can be classified when they are traced: a handle
/// observed during the turn in which it is traced holds its target strongly for this cycle.
struct RuntimeContext<'a> {
    roots: &'a mut RootSet,
    finalization: &'a mut FinalizationState,
    jobs: &'a mut JobQueue,
    turn: Turn,
}

impl GcContext for RuntimeContext<'_> {
    fn prepare_cycle(&mut self) {
        self.finalization.prepare_cycle();
        debug!(turn = %self.turn, "gc cycle started");
    }

    fn visit_roots(&mut self, visitor: &mut impl GcVisitor) {
        self.roots.visit_roots(visitor);
    }

    fn trace_object(&mut self, ptr: *mut u8, visitor: &mut impl GcVisitor) {
        let item = HeapPtr::<AnyHeapItem>::from_ptr(ptr as *mut AnyHeapItem);

        match item.kind() {
            HeapItemKind::OrdinaryObject => item.cast::<ObjectValue>().visit_pointers(visitor),
            HeapItemKind::WeakRef => {
                let weak_ref = item.cast::<WeakRefObject>();
                self.finalization.trace_weak_ref(weak_ref, self.turn, visitor);
            }
            HeapItemKind::FinalizationRegistry => {
                let registry = item.cast::<FinalizationRegistryObject>();
                self.finalization.trace_registry(registry.registry_id(), visitor);
            }
        }
    }

    fn on_mark_complete(&mut self, heap: &ephemera_gc::Heap) {
        let summary = self.finalization.schedule_finalization(heap);
        trace!(
            handles_cleared = summary.handles_cleared,
            registrations_condemned = summary.registrations_condemned,
            tokens_cleared = summary.tokens_cleared,
            "weak processing complete"
        );
    }

    fn drop_object(&mut self, ptr: *mut u8) {
        let mut item = HeapPtr::<AnyHeapItem>::from_ptr(ptr as *mut AnyHeapItem);

        match item.kind() {
            HeapItemKind::OrdinaryObject => {}
            HeapItemKind::WeakRef => self.finalization.on_weak_ref_dropped(),
            HeapItemKind::FinalizationRegistry => {
                let registry = item.cast::<FinalizationRegistryObject>();
                self.finalization.drop_registry(registry.registry_id());
            }
        }

        unsafe { item.drop_in_place_for_kind() };
    }

    fn on_cycle_complete(&mut self, stats: &GcStats) {
        let queued = self.finalization.queue_cleanup_jobs(self.jobs);
        debug!(
            cycle = stats.cycles,
            objects_freed = stats.last_objects_freed,
            bytes_freed = stats.last_bytes_freed,
            live_objects = stats.live_objects,
            cleanup_jobs_queued = queued,
            "gc cycle finished"
        );
    }
}
