//! Incremental tri-color mark/sweep collector.
//!
//! The collector knows nothing about the objects it manages. A runtime implements
//! `GcContext` to enumerate roots, trace objects and process weak edges, and objects
//! report their pointers through a `GcVisitor`. Weak processing gets dedicated hooks
//! around the mark phase: `prepare_cycle` before it, `on_mark_complete` after it, and
//! `drop_object`/`on_cycle_complete` during and after sweeping.

#![no_std]
extern crate alloc;

mod gc_header;
mod gray_queue;
mod heap;
mod pointer;
mod visitor;

pub use gc_header::{GcColor, GcHeader, GcPhase};
pub use heap::{AllocError, AllocResult, GcStats, Heap, Marker, DEFAULT_GC_THRESHOLD};
pub use pointer::GcPtr;
pub use visitor::{GcContext, GcVisitor};
