use alloc::string::String;
use parking_lot::{Mutex, MutexGuard};

use super::constants::{DEFAULT_GC_THRESHOLD, DEFAULT_HEAP_SIZE};

/// Options passed throughout the program.
pub struct Options {
    /// The heap size to use in bytes. Allocations beyond it fail.
    pub heap_size: usize,

    /// Number of allocated bytes after which a collection cycle is started.
    pub gc_threshold: usize,

    /// Maximum number of cleanup callbacks a single finalization job runs before re-queueing
    /// itself. `None` drains the whole pending queue. A size of zero is treated as one.
    pub cleanup_batch_size: Option<usize>,

    /// Buffer to write all printed output into instead of stdout
    pub dump_buffer: Option<Mutex<String>>,
}

impl Options {
    pub fn dump_buffer(&self) -> Option<MutexGuard<'_, String>> {
        self.dump_buffer.as_ref().map(|buffer| buffer.lock())
    }
}

impl Default for Options {
    /// Create a new options struct with default values.
    fn default() -> Self {
        OptionsBuilder::new().build()
    }
}

pub struct OptionsBuilder(Options);

impl OptionsBuilder {
    /// Create new options with default values.
    pub fn new() -> Self {
        Self(Options {
            heap_size: DEFAULT_HEAP_SIZE,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            cleanup_batch_size: None,
            dump_buffer: None,
        })
    }

    /// Return the options that have been built, consuming the builder.
    pub fn build(self) -> Options {
        self.0
    }

    pub fn heap_size(mut self, heap_size: usize) -> Self {
        self.0.heap_size = heap_size;
        self
    }

    pub fn gc_threshold(mut self, gc_threshold: usize) -> Self {
        self.0.gc_threshold = gc_threshold;
        self
    }

    pub fn cleanup_batch_size(mut self, cleanup_batch_size: Option<usize>) -> Self {
        self.0.cleanup_batch_size = cleanup_batch_size;
        self
    }

    pub fn dump_buffer(mut self, dump_buffer: Option<Mutex<String>>) -> Self {
        self.0.dump_buffer = dump_buffer;
        self
    }
}
