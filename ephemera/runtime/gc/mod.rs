mod heap;
mod heap_item;
mod heap_visitor;
mod pointer;

// Re-export GcVisitor from ephemera_gc, and our own GcVisitorExt extension
pub use ephemera_gc::{AllocError, AllocResult, GcPhase, GcStats, GcVisitor};
pub use heap::Heap;
pub use heap_item::{AnyHeapItem, HeapItem, HeapItemKind, IsHeapItem};
pub use heap_visitor::GcVisitorExt;
// HeapPtr is our own wrapper around ephemera_gc::GcPtr
pub use pointer::HeapPtr;
