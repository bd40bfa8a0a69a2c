//! Bounded log of scoring results.

use std::collections::VecDeque;

use super::events::AnswerEvent;

/// Smallest retention a configuration may ask for.
pub const MIN_RETAIN: usize = 100;
/// Largest retention a configuration may ask for.
pub const MAX_RETAIN: usize = 200;
pub const DEFAULT_RETAIN: usize = MAX_RETAIN;

/// One resolved job.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEntry {
    Answer(AnswerEvent),
    Failed { job_id: String, message: String },
}

impl ResultEntry {
    pub fn job_id(&self) -> Option<&str> {
        match self {
            ResultEntry::Answer(answer) => answer.job_id.as_deref(),
            ResultEntry::Failed { job_id, .. } => Some(job_id),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ResultEntry::Failed { .. })
    }

    /// Compact label for the status line: the answer, or `!` on failure.
    pub fn label(&self) -> &str {
        match self {
            ResultEntry::Answer(answer) => &answer.answer,
            ResultEntry::Failed { .. } => "!",
        }
    }
}

/// Append-only list that keeps only the newest `capacity` entries.
#[derive(Debug, Clone)]
pub struct ResultLog {
    entries: VecDeque<ResultEntry>,
    capacity: usize,
}

impl ResultLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `entry`, returning the oldest entry if it had to be evicted.
    pub fn push(&mut self, entry: ResultEntry) -> Option<ResultEntry> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ResultEntry> {
        self.entries.iter()
    }

    /// The newest `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<ResultEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }
}

impl Default for ResultLog {
    fn default() -> Self {
        Self::new(DEFAULT_RETAIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::AnswerKind;

    fn answer(n: usize) -> ResultEntry {
        ResultEntry::Answer(AnswerEvent {
            job_id: Some(format!("job-{:04}", n)),
            kind: AnswerKind::MultipleChoice,
            answer: "A".to_string(),
            confidence: 0.9,
        })
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(ResultLog::default().capacity(), 200);
        assert_eq!(ResultLog::new(0).capacity(), 1);
    }

    #[test]
    fn test_evicts_oldest_past_capacity() {
        let mut log = ResultLog::new(MIN_RETAIN);
        for n in 0..MIN_RETAIN {
            assert!(log.push(answer(n)).is_none());
        }
        let evicted = log.push(answer(MIN_RETAIN)).unwrap();
        assert_eq!(evicted.job_id(), Some("job-0000"));
        assert_eq!(log.len(), MIN_RETAIN);
        assert_eq!(log.iter().next().and_then(|e| e.job_id()), Some("job-0001"));
    }

    #[test]
    fn test_tail_keeps_order() {
        let mut log = ResultLog::new(10);
        for n in 0..5 {
            log.push(answer(n));
        }
        let tail = log.tail(2);
        assert_eq!(tail[0].job_id(), Some("job-0003"));
        assert_eq!(tail[1].job_id(), Some("job-0004"));
        assert_eq!(log.tail(50).len(), 5);
    }

    #[test]
    fn test_failure_label() {
        let failed = ResultEntry::Failed {
            job_id: "job-1".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(failed.label(), "!");
        assert!(failed.is_failure());
        assert_eq!(answer(1).label(), "A");
    }
}
