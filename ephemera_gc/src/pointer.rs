//! Untyped-lifetime pointers into the managed heap.

use core::{
    fmt,
    hash::{Hash, Hasher},
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

/// Pointer to the object part of a heap allocation.
///
/// Holding a `GcPtr` keeps nothing alive: the object must stay reachable from a root
/// whenever a collection step may run. Equality and hashing use the address, which is
/// the identity of weak targets and unregister tokens.
#[repr(transparent)]
pub struct GcPtr<T>(NonNull<T>);

impl<T> GcPtr<T> {
    /// # Safety
    /// `ptr` must be non-null and point at an object allocated by a `Heap`.
    #[inline]
    pub const unsafe fn from_ptr(ptr: *mut T) -> GcPtr<T> {
        GcPtr(NonNull::new_unchecked(ptr))
    }

    /// Placeholder that is never traced and never reported alive.
    #[inline]
    pub const fn dangling() -> GcPtr<T> {
        GcPtr(NonNull::dangling())
    }

    #[inline]
    pub fn is_dangling(&self) -> bool {
        self.0 == NonNull::dangling()
    }

    #[inline]
    pub const fn as_ptr(&self) -> *mut T {
        self.0.as_ptr()
    }

    #[inline]
    pub fn as_non_null(&self) -> NonNull<T> {
        self.0
    }

    #[inline]
    pub fn cast<U>(&self) -> GcPtr<U> {
        GcPtr(self.0.cast())
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    #[inline]
    pub fn addr(&self) -> usize {
        self.0.as_ptr().cast::<u8>() as usize
    }
}

impl<T> Clone for GcPtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for GcPtr<T> {}

impl<T> PartialEq for GcPtr<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for GcPtr<T> {}

impl<T> Hash for GcPtr<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.addr());
    }
}

impl<T> Deref for GcPtr<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { self.0.as_ref() }
    }
}

impl<T> DerefMut for GcPtr<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { self.0.as_mut() }
    }
}

impl<T> fmt::Debug for GcPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GcPtr({:p})", self.0)
    }
}

impl<T> fmt::Pointer for GcPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.0, f)
    }
}
