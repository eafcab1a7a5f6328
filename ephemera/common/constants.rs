/// Default hard limit on the managed heap, in bytes.
pub const DEFAULT_HEAP_SIZE: usize = 1 << 28;

/// Default number of allocated bytes after which a collection cycle is started.
pub const DEFAULT_GC_THRESHOLD: usize = ephemera_gc::DEFAULT_GC_THRESHOLD;
