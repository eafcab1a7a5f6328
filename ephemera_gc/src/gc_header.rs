//! Per-allocation collector state.
//!
//! Every allocation is laid out as `| GcHeader | object |`. A `GcPtr` points at the
//! object, and the header is found by stepping back `GcHeader::SIZE` bytes.

use core::{alloc::Layout, ptr::NonNull};

/// Tri-color mark state of an allocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum GcColor {
    /// Not reached yet. Still white once marking completes means unreachable.
    #[default]
    White = 0,
    /// Reached, outgoing pointers not traced yet.
    Gray = 1,
    /// Reached and traced.
    Black = 2,
}

/// Where the heap is within a collection cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GcPhase {
    #[default]
    Idle,
    RootScanning,
    Marking,
    /// Weak handles to unmarked objects are cleared and registrations condemned. Entered
    /// and left within a single step.
    ScheduleFinalization,
    Sweeping,
}

#[repr(C)]
pub struct GcHeader {
    /// Intrusive list of every allocation, walked by the sweeper
    next_object: Option<NonNull<GcHeader>>,
    /// Object size in bytes, header excluded
    alloc_size: usize,
    color: GcColor,
}

impl GcHeader {
    /// Alignment of every allocation, and of the object following the header.
    pub const ALIGN: usize = 8;

    /// Header size rounded up so the object that follows stays aligned.
    pub const SIZE: usize = {
        let size = core::mem::size_of::<GcHeader>();
        (size + Self::ALIGN - 1) & !(Self::ALIGN - 1)
    };

    #[inline]
    pub fn new(alloc_size: usize) -> GcHeader {
        GcHeader { next_object: None, alloc_size, color: GcColor::White }
    }

    #[inline]
    pub fn color(&self) -> GcColor {
        self.color
    }

    #[inline]
    pub fn set_color(&mut self, color: GcColor) {
        self.color = color;
    }

    /// Gray or black.
    #[inline]
    pub fn is_marked(&self) -> bool {
        self.color != GcColor::White
    }

    #[inline]
    pub fn needs_scanning(&self) -> bool {
        self.color == GcColor::Gray
    }

    #[inline]
    pub fn alloc_size(&self) -> usize {
        self.alloc_size
    }

    /// Bytes charged to the heap for this allocation.
    #[inline]
    pub fn total_size(&self) -> usize {
        Self::SIZE + self.alloc_size
    }

    #[inline]
    pub fn next_object(&self) -> Option<NonNull<GcHeader>> {
        self.next_object
    }

    #[inline]
    pub fn set_next_object(&mut self, next: Option<NonNull<GcHeader>>) {
        self.next_object = next;
    }

    #[inline]
    pub fn object_ptr(&self) -> *mut u8 {
        unsafe { (self as *const GcHeader).cast::<u8>().cast_mut().add(Self::SIZE) }
    }

    /// # Safety
    /// `object_ptr` must have been returned by this heap's allocator and not yet freed.
    #[inline]
    pub unsafe fn from_object_ptr<T>(object_ptr: *const T) -> &'static mut GcHeader {
        &mut *object_ptr.cast::<u8>().cast_mut().sub(Self::SIZE).cast::<GcHeader>()
    }

    /// Layout of a header plus `size` object bytes. `None` on overflow.
    #[inline]
    pub fn layout_for_size(size: usize) -> Option<Layout> {
        let object_size = size.checked_next_multiple_of(Self::ALIGN)?;
        let total_size = Self::SIZE.checked_add(object_size)?;
        Layout::from_size_align(total_size, Self::ALIGN).ok()
    }
}
