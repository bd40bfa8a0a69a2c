//! Sessions and capture jobs.

use uuid::Uuid;

use crate::bus::session_channel;

/// Milliseconds since the Unix epoch, the timestamp format used on the wire.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Scopes one capture stream to one viewer-visible channel.
///
/// Created once per launch (or taken from the command line) and never
/// changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Session {
    id: Uuid,
}

impl Session {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn from_id(id: Uuid) -> Self {
        Self { id }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Name of the pub/sub channel for this session.
    pub fn channel(&self) -> String {
        session_channel(&self.id)
    }

    /// First 8 characters of the id, for display.
    pub fn short_id(&self) -> String {
        self.id.to_string()[..8].to_string()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// One encoded photograph waiting to be scored.
///
/// Owned by the capture queue until dequeued, then by the in-flight scoring
/// request; dropped once the request resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: Uuid,
    pub captured_at_millis: i64,
    /// Encoded still image (JPEG)
    pub image: Vec<u8>,
}

impl Job {
    /// New job stamped with a fresh id and the current time.
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            captured_at_millis: now_millis(),
            image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_channel_uses_id() {
        let session = Session::new();
        assert_eq!(session.channel(), format!("sess-{}", session.id()));
        assert_eq!(session.short_id().len(), 8);
    }

    #[test]
    fn test_jobs_get_unique_ids() {
        let a = Job::new(vec![1]);
        let b = Job::new(vec![1]);
        assert_ne!(a.id, b.id);
        assert!(a.captured_at_millis > 1_600_000_000_000);
    }
}
