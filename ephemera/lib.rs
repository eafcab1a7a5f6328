//! Weak handles and post-mortem finalization on top of an incremental tracing
//! collector.
//!
//! The `runtime` module holds the engine: the `Context` that owns the heap and the
//! turn clock, weak handles (`WeakRef`), finalization registries
//! (`FinalizationRegistry`) and the job queue their cleanup callbacks run from.

extern crate alloc;

pub mod common;
pub mod runtime;

pub use runtime::{
    CallResult, Context, ContextBuilder, DomainId, Exception, FinalizationRegistry,
    FinalizationRegistryObject, NativeFunction, ObjectRef, ObjectValue, RootId, Turn, Value,
    WeakRef, WeakRefError, WeakRefObject,
};
