//! The managed heap.
//!
//! Objects live in an intrusive singly linked list threaded through their headers.
//! Collection is incremental: `start_gc` shades the roots, then each `gc_step` traces a
//! bounded number of gray objects or sweeps a bounded number of list entries. Allocating
//! while a cycle is running performs one step first, so the mutator pays for the
//! collection as it goes.
//!
//! Weak processing happens in the step that empties the gray queue. The runtime's
//! `GcContext::on_mark_complete` sees the final mark bits before anything is freed, and
//! control does not return to the mutator in between.

use core::ptr::NonNull;

use crate::{
    gc_header::{GcColor, GcHeader, GcPhase},
    gray_queue::GrayQueue,
    visitor::{GcContext, GcVisitor},
    GcPtr,
};

/// Gray objects traced per step.
const MARK_STEP_SIZE: usize = 100;
/// List entries swept per step.
const SWEEP_STEP_SIZE: usize = 100;

/// Allocated bytes before the first collection is started (1MB).
pub const DEFAULT_GC_THRESHOLD: usize = 1024 * 1024;

/// Collection statistics, updated when a cycle completes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Completed cycles
    pub cycles: usize,
    pub last_objects_freed: usize,
    pub last_bytes_freed: usize,
    pub total_objects_freed: usize,
    /// Objects still allocated when the last cycle completed
    pub live_objects: usize,
    pub live_bytes: usize,
}

pub type AllocResult<T> = Result<T, AllocError>;

/// The heap limit was reached or the system allocator failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocError;

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("out of heap memory")
    }
}

impl core::error::Error for AllocError {}

/// Sweep cursor and running totals of the cycle in progress.
#[derive(Default)]
struct CycleState {
    /// Last surviving entry, whose `next_object` is patched when its successor is freed
    sweep_prev: Option<NonNull<GcHeader>>,
    sweep_next: Option<NonNull<GcHeader>>,
    bytes_freed: usize,
    objects_freed: usize,
}

pub struct Heap {
    all_objects: Option<NonNull<GcHeader>>,
    bytes_allocated: usize,
    num_objects: usize,

    /// `should_gc` reports true once `bytes_allocated` exceeds this
    gc_threshold: usize,
    /// Floor for the threshold recomputed after every cycle
    base_gc_threshold: usize,
    /// Allocations that would exceed this fail with `AllocError`
    max_heap_size: usize,

    phase: GcPhase,
    gray_queue: GrayQueue,
    cycle: CycleState,
    stats: GcStats,
}

impl Heap {
    pub const fn new() -> Heap {
        Heap {
            all_objects: None,
            bytes_allocated: 0,
            num_objects: 0,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            base_gc_threshold: DEFAULT_GC_THRESHOLD,
            max_heap_size: usize::MAX,
            phase: GcPhase::Idle,
            gray_queue: GrayQueue::new(),
            cycle: CycleState {
                sweep_prev: None,
                sweep_next: None,
                bytes_freed: 0,
                objects_freed: 0,
            },
            stats: GcStats {
                cycles: 0,
                last_objects_freed: 0,
                last_bytes_freed: 0,
                total_objects_freed: 0,
                live_objects: 0,
                live_bytes: 0,
            },
        }
    }

    pub fn set_gc_threshold(&mut self, bytes: usize) {
        self.gc_threshold = bytes;
        self.base_gc_threshold = bytes;
    }

    pub fn set_max_heap_size(&mut self, bytes: usize) {
        self.max_heap_size = bytes;
    }

    #[inline]
    pub fn phase(&self) -> GcPhase {
        self.phase
    }

    #[inline]
    pub fn gc_in_progress(&self) -> bool {
        self.phase != GcPhase::Idle
    }

    /// Whether pointer stores must go through `write_barrier`.
    #[inline]
    pub fn is_marking(&self) -> bool {
        matches!(self.phase, GcPhase::RootScanning | GcPhase::Marking)
    }

    #[inline]
    pub fn stats(&self) -> GcStats {
        self.stats
    }

    #[inline]
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    #[inline]
    pub fn num_objects(&self) -> usize {
        self.num_objects
    }

    /// True when no cycle is running and the allocation threshold has been passed.
    #[inline]
    pub fn should_gc(&self) -> bool {
        self.phase == GcPhase::Idle && self.bytes_allocated > self.gc_threshold
    }

    // ------------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------------

    /// Allocate uninitialized storage for a `T`.
    ///
    /// The caller must write the object before the next call into the heap. Performs one
    /// collection step first if a cycle is running.
    pub fn alloc<T>(&mut self, ctx: &mut impl GcContext) -> AllocResult<GcPtr<T>> {
        self.alloc_with_size(ctx, core::mem::size_of::<T>())
    }

    /// Allocate `size` uninitialized bytes. Objects allocated during a cycle start out
    /// black and survive it.
    pub fn alloc_with_size<T>(
        &mut self,
        ctx: &mut impl GcContext,
        size: usize,
    ) -> AllocResult<GcPtr<T>> {
        if self.gc_in_progress() {
            self.gc_step(ctx);
        }

        let layout = GcHeader::layout_for_size(size).ok_or(AllocError)?;
        if self.bytes_allocated.saturating_add(layout.size()) > self.max_heap_size {
            return Err(AllocError);
        }

        let raw = unsafe { alloc::alloc::alloc(layout) };
        let header_ptr = NonNull::new(raw.cast::<GcHeader>()).ok_or(AllocError)?;

        let mut header = GcHeader::new(size);
        if self.gc_in_progress() {
            header.set_color(GcColor::Black);
        }
        header.set_next_object(self.all_objects);

        self.bytes_allocated += header.total_size();
        self.num_objects += 1;

        unsafe { header_ptr.as_ptr().write(header) };
        self.all_objects = Some(header_ptr);

        let object_ptr = unsafe { header_ptr.as_ref().object_ptr() };
        Ok(unsafe { GcPtr::from_ptr(object_ptr.cast::<T>()) })
    }

    // ------------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------------

    /// Begin a cycle: let the runtime prepare its weak bookkeeping, then shade every root.
    /// No-op if a cycle is already running.
    pub fn start_gc(&mut self, ctx: &mut impl GcContext) {
        if self.gc_in_progress() {
            return;
        }

        ctx.prepare_cycle();

        self.phase = GcPhase::RootScanning;
        self.cycle = CycleState::default();
        ctx.visit_roots(&mut Marker { gray_queue: &mut self.gray_queue });

        self.phase = GcPhase::Marking;
    }

    /// Do one bounded unit of collection work. Returns false once the heap is idle.
    pub fn gc_step(&mut self, ctx: &mut impl GcContext) -> bool {
        match self.phase {
            GcPhase::Idle => return false,
            GcPhase::RootScanning => self.phase = GcPhase::Marking,
            GcPhase::Marking => {
                if self.mark_step(ctx) {
                    self.schedule_finalization(ctx);
                }
            }
            GcPhase::ScheduleFinalization => self.schedule_finalization(ctx),
            GcPhase::Sweeping => {
                self.sweep_step(ctx);
                return self.gc_in_progress();
            }
        }

        true
    }

    /// Run the current cycle to completion. Returns the number of steps taken.
    pub fn finish_gc(&mut self, ctx: &mut impl GcContext) -> usize {
        let mut steps = 1;
        while self.gc_step(ctx) {
            steps += 1;
        }
        steps
    }

    /// Trace up to `MARK_STEP_SIZE` gray objects. Returns true if the gray queue is empty.
    fn mark_step(&mut self, ctx: &mut impl GcContext) -> bool {
        for _ in 0..MARK_STEP_SIZE {
            let Some(header_ptr) = self.gray_queue.pop() else {
                return true;
            };

            let object_ptr = unsafe {
                let header = &mut *header_ptr.as_ptr();
                header.set_color(GcColor::Black);
                header.object_ptr()
            };

            ctx.trace_object(object_ptr, &mut Marker { gray_queue: &mut self.gray_queue });
        }

        false
    }

    fn schedule_finalization(&mut self, ctx: &mut impl GcContext) {
        self.phase = GcPhase::ScheduleFinalization;
        ctx.on_mark_complete(self);

        self.phase = GcPhase::Sweeping;
        self.cycle.sweep_prev = None;
        self.cycle.sweep_next = self.all_objects;
    }

    /// Free up to `SWEEP_STEP_SIZE` white objects and whiten the survivors. Completes the
    /// cycle once the end of the list is reached within the step.
    fn sweep_step(&mut self, ctx: &mut impl GcContext) {
        for _ in 0..SWEEP_STEP_SIZE {
            let Some(header_ptr) = self.cycle.sweep_next else {
                self.finish_cycle(ctx);
                return;
            };

            let header = unsafe { &mut *header_ptr.as_ptr() };
            let next = header.next_object();
            self.cycle.sweep_next = next;

            if header.is_marked() {
                header.set_color(GcColor::White);
                self.cycle.sweep_prev = Some(header_ptr);
                continue;
            }

            match self.cycle.sweep_prev {
                Some(prev) => unsafe { (*prev.as_ptr()).set_next_object(next) },
                None => self.all_objects = next,
            }

            self.cycle.bytes_freed += header.total_size();
            self.cycle.objects_freed += 1;
            unsafe { Self::free_object(ctx, header_ptr) };
        }
    }

    fn finish_cycle(&mut self, ctx: &mut impl GcContext) {
        let CycleState { bytes_freed, objects_freed, .. } = core::mem::take(&mut self.cycle);

        self.bytes_allocated -= bytes_freed;
        self.num_objects -= objects_freed;

        // Next cycle once the live set has doubled
        self.gc_threshold = (self.bytes_allocated * 2).max(self.base_gc_threshold);

        self.stats = GcStats {
            cycles: self.stats.cycles + 1,
            last_objects_freed: objects_freed,
            last_bytes_freed: bytes_freed,
            total_objects_freed: self.stats.total_objects_freed + objects_freed,
            live_objects: self.num_objects,
            live_bytes: self.bytes_allocated,
        };

        self.phase = GcPhase::Idle;
        ctx.on_cycle_complete(&self.stats);
    }

    /// # Safety
    /// `header_ptr` must be an allocation of this heap that is no longer linked into the
    /// all-objects list.
    unsafe fn free_object(ctx: &mut impl GcContext, header_ptr: NonNull<GcHeader>) {
        let header = header_ptr.as_ref();
        ctx.drop_object(header.object_ptr());

        if let Some(layout) = GcHeader::layout_for_size(header.alloc_size()) {
            alloc::alloc::dealloc(header_ptr.as_ptr().cast::<u8>(), layout);
        }
    }

    /// Drop and free every allocation regardless of reachability. An in-progress cycle is
    /// abandoned without running its remaining hooks.
    pub fn destroy_all(&mut self, ctx: &mut impl GcContext) {
        let mut next = self.all_objects.take();
        while let Some(header_ptr) = next {
            unsafe {
                next = header_ptr.as_ref().next_object();
                Self::free_object(ctx, header_ptr);
            }
        }

        self.gray_queue.clear();
        self.cycle = CycleState::default();
        self.phase = GcPhase::Idle;
        self.bytes_allocated = 0;
        self.num_objects = 0;
    }

    // ------------------------------------------------------------------------
    // Mutator support
    // ------------------------------------------------------------------------

    /// Dijkstra insertion barrier. Call with the new referent whenever a pointer is stored
    /// into an object or root that may already have been traced.
    #[inline]
    pub fn write_barrier<T>(&mut self, target: GcPtr<T>) {
        if self.is_marking() && !target.is_dangling() {
            unsafe { self.gray_queue.shade(target.as_ptr().cast::<u8>()) };
        }
    }

    /// Whether `ptr` has been marked in the current cycle. Only meaningful from
    /// `GcContext::on_mark_complete`, when marking is complete.
    #[inline]
    pub fn is_alive<T>(&self, ptr: GcPtr<T>) -> bool {
        !ptr.is_dangling() && unsafe { GcHeader::from_object_ptr(ptr.as_ptr()).is_marked() }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// The `GcVisitor` handed to the runtime while roots are scanned and objects traced.
pub struct Marker<'a> {
    gray_queue: &'a mut GrayQueue,
}

impl GcVisitor for Marker<'_> {
    fn visit_raw(&mut self, ptr: NonNull<u8>) {
        unsafe { self.gray_queue.shade(ptr.as_ptr()) };
    }

    // Weak pointers are not traced. Their owners check liveness in `on_mark_complete`.
    fn visit_weak_raw(&mut self, _ptr: NonNull<u8>) {}
}
