//! GC Visitor extension trait for ephemera-specific types
//!
//! This provides convenience methods for visiting `Value`s and `HeapPtr`s.

use crate::runtime::Value;

pub use ephemera_gc::GcVisitor;

use super::HeapPtr;

/// Extension trait for GcVisitor with ephemera-specific convenience methods
///
/// This trait is automatically implemented for all types that implement `GcVisitor`.
pub trait GcVisitorExt: GcVisitor {
    /// Visit a strongly held HeapPtr
    #[inline]
    fn visit_pointer<T>(&mut self, ptr: &mut HeapPtr<T>) {
        if !ptr.is_dangling() {
            self.visit_raw(ptr.as_non_null().cast());
        }
    }

    /// Visit a weakly held HeapPtr
    #[inline]
    fn visit_weak_pointer<T>(&mut self, ptr: &mut HeapPtr<T>) {
        if !ptr.is_dangling() {
            self.visit_weak_raw(ptr.as_non_null().cast());
        }
    }

    /// Visit a strongly held value.
    #[inline]
    fn visit_value(&mut self, value: &mut Value) {
        if let Value::Object(object) = value {
            self.visit_pointer(object);
        }
    }
}

// Blanket implementation: any GcVisitor automatically gets GcVisitorExt
impl<V: GcVisitor> GcVisitorExt for V {}
