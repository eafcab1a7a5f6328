use alloc::collections::VecDeque;

use crate::runtime::finalization::RegistryId;

/// Deferred work run by the host between turns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Job {
    /// Drain the pending queue of a finalization registry.
    FinalizationCleanup(RegistryId),
}

/// FIFO queue of jobs, owned by the context.
pub struct JobQueue {
    jobs: VecDeque<Job>,
}

impl JobQueue {
    pub fn new() -> JobQueue {
        JobQueue { jobs: VecDeque::new() }
    }

    #[inline]
    pub fn enqueue(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    #[inline]
    pub fn pop(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
