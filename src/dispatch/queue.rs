//! FIFO of jobs awaiting scoring.

use std::collections::VecDeque;

use crate::job::Job;

/// Observable summary of the capture queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStatus {
    /// Jobs waiting, not counting the one being sent
    pub queued: usize,
    /// True while a scoring request is in flight
    pub sending: bool,
    pub completed: u64,
    pub failed: u64,
}

impl QueueStatus {
    pub fn is_idle(&self) -> bool {
        self.queued == 0 && !self.sending
    }
}

/// Queue plus in-flight flag. At most one job is ever taken out at a time.
#[derive(Debug, Default)]
pub(crate) struct CaptureQueue {
    jobs: VecDeque<Job>,
    sending: bool,
    completed: u64,
    failed: u64,
}

impl CaptureQueue {
    pub(crate) fn push(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    /// Take the oldest job unless one is already in flight.
    pub(crate) fn begin_next(&mut self) -> Option<Job> {
        if self.sending {
            return None;
        }
        let job = self.jobs.pop_front()?;
        self.sending = true;
        Some(job)
    }

    /// Mark the in-flight job as resolved.
    pub(crate) fn finish(&mut self, ok: bool) {
        if !self.sending {
            return;
        }
        self.sending = false;
        if ok {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
    }

    pub(crate) fn status(&self) -> QueueStatus {
        QueueStatus {
            queued: self.jobs.len(),
            sending: self.sending,
            completed: self.completed,
            failed: self.failed,
        }
    }
}
