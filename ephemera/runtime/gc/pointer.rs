use core::{
    hash::{Hash, Hasher},
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

use super::IsHeapItem;

/// For direct references to heap items, both from other heap items and from the mutator.
///
/// A `HeapPtr` does not keep its target alive. It must be reachable from a root (or held in a
/// root itself) across any point where a GC step may run, which includes every allocation.
///
/// This is a newtype wrapper around `ephemera_gc::GcPtr<T>` that allows implementing
/// traits and methods specific to the ephemera runtime.
#[repr(transparent)]
pub struct HeapPtr<T>(ephemera_gc::GcPtr<T>);

impl<T> HeapPtr<T> {
    #[inline]
    pub const fn as_ptr(&self) -> *mut T {
        self.0.as_ptr()
    }

    #[inline]
    #[allow(clippy::not_unsafe_ptr_arg_deref)]
    pub fn from_ptr(ptr: *mut T) -> HeapPtr<T> {
        HeapPtr(unsafe { ephemera_gc::GcPtr::from_ptr(ptr) })
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }

    #[inline]
    pub fn cast<U>(&self) -> HeapPtr<U> {
        HeapPtr(self.0.cast())
    }

    #[inline]
    pub fn is_dangling(&self) -> bool {
        self.0.is_dangling()
    }

    #[inline]
    pub fn as_non_null(&self) -> NonNull<T> {
        self.0.as_non_null()
    }

    /// Get the inner GcPtr (for interop with ephemera_gc)
    #[inline]
    pub fn into_gc_ptr(self) -> ephemera_gc::GcPtr<T> {
        self.0
    }

    /// Create from a GcPtr (for interop with ephemera_gc)
    #[inline]
    pub const fn from_gc_ptr(ptr: ephemera_gc::GcPtr<T>) -> HeapPtr<T> {
        HeapPtr(ptr)
    }

    /// Address of the heap item, the identity used for unregister tokens
    #[inline]
    pub fn addr(&self) -> usize {
        self.0.addr()
    }
}

impl<T> Clone for HeapPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for HeapPtr<T> {}

impl<T> PartialEq for HeapPtr<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for HeapPtr<T> {}

impl<T> Hash for HeapPtr<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T: IsHeapItem> Deref for HeapPtr<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { self.0.as_non_null().as_ref() }
    }
}

impl<T: IsHeapItem> DerefMut for HeapPtr<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { self.0.as_non_null().as_mut() }
    }
}

impl<T> core::fmt::Debug for HeapPtr<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "HeapPtr({:p})", self.0)
    }
}
