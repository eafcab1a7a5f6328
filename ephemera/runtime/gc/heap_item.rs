use crate::runtime::{
    domain::DomainId, finalization::FinalizationRegistryObject, object_value::ObjectValue,
    weak_ref::WeakRefObject,
};

use super::HeapPtr;

/// Every kind of item that lives on the managed heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HeapItemKind {
    OrdinaryObject,
    WeakRef,
    FinalizationRegistry,
}

/// Marker for types whose pointers may be dereferenced through a `HeapPtr`.
pub trait IsHeapItem {}

/// Trait implemented by all concrete items stored on the heap. Every such type is `#[repr(C)]`
/// and starts with an `AnyHeapItem` header.
pub trait HeapItem: IsHeapItem {
    const KIND: HeapItemKind;
}

/// An arbitrary heap item. The only common fields between heap items are their kind, used to
/// determine the true type of the heap item, and the domain they were allocated in.
#[repr(C)]
pub struct AnyHeapItem {
    kind: HeapItemKind,
    domain: DomainId,
}

impl IsHeapItem for AnyHeapItem {}

impl AnyHeapItem {
    pub fn new<T: HeapItem>(domain: DomainId) -> AnyHeapItem {
        AnyHeapItem { kind: T::KIND, domain }
    }

    #[inline]
    pub fn kind(&self) -> HeapItemKind {
        self.kind
    }

    #[inline]
    pub fn domain(&self) -> DomainId {
        self.domain
    }
}

impl HeapPtr<AnyHeapItem> {
    #[inline]
    pub fn is<T: HeapItem>(&self) -> bool {
        self.kind() == T::KIND
    }

    /// Checked downcast to a concrete heap item type.
    #[inline]
    pub fn downcast<T: HeapItem>(&self) -> Option<HeapPtr<T>> {
        if self.is::<T>() {
            Some(self.cast::<T>())
        } else {
            None
        }
    }

    #[inline]
    pub fn as_object_value(&self) -> Option<HeapPtr<ObjectValue>> {
        self.downcast()
    }

    #[inline]
    pub fn as_weak_ref(&self) -> Option<HeapPtr<WeakRefObject>> {
        self.downcast()
    }

    #[inline]
    pub fn as_finalization_registry(&self) -> Option<HeapPtr<FinalizationRegistryObject>> {
        self.downcast()
    }

    /// Run the Rust destructor of the concrete item behind this pointer.
    ///
    /// # Safety
    /// The item must be initialized and must not be used again afterwards.
    pub unsafe fn drop_in_place_for_kind(&mut self) {
        match self.kind() {
            HeapItemKind::OrdinaryObject => {
                core::ptr::drop_in_place(self.cast::<ObjectValue>().as_ptr())
            }
            HeapItemKind::WeakRef => core::ptr::drop_in_place(self.cast::<WeakRefObject>().as_ptr()),
            HeapItemKind::FinalizationRegistry => {
                core::ptr::drop_in_place(self.cast::<FinalizationRegistryObject>().as_ptr())
            }
        }
    }
}

impl<T: HeapItem> HeapPtr<T> {
    /// Erase the concrete type of this heap item.
    #[inline]
    pub fn as_any(&self) -> HeapPtr<AnyHeapItem> {
        self.cast()
    }
}
