//! Wire shapes of the events exchanged on a session channel.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::{is_valid_answer, AnswerKind};

/// Minimum length of a job id carried by a shot announcement.
pub const MIN_JOB_ID_LEN: usize = 8;

/// A photograph was taken and queued for scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotEvent {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "ts")]
    pub captured_at_millis: i64,
    #[serde(rename = "intervalSec")]
    pub interval_seconds: u32,
}

impl ShotEvent {
    /// When the next capture is expected, in epoch milliseconds.
    pub fn due_at_millis(&self) -> i64 {
        self.captured_at_millis
            .saturating_add(i64::from(self.interval_seconds) * 1000)
    }

    /// Check the job id and interval carried by the shot.
    pub fn validate(&self) -> Result<(), AnnounceError> {
        if self.job_id.len() < MIN_JOB_ID_LEN {
            return Err(AnnounceError::JobIdTooShort(self.job_id.clone()));
        }
        if self.interval_seconds < 1 {
            return Err(AnnounceError::ZeroInterval);
        }
        Ok(())
    }
}

/// A scorer's verdict, as seen by viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvent {
    /// Absent on answers from legacy senders; those never clear a pending shot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default)]
    pub kind: AnswerKind,
    pub answer: String,
    pub confidence: f64,
}

impl AnswerEvent {
    pub fn is_valid(&self) -> bool {
        is_valid_answer(&self.answer) && (0.0..=1.0).contains(&self.confidence)
    }
}

/// The payload a capture device publishes after each shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotAnnouncement {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    #[serde(flatten)]
    pub shot: ShotEvent,
}

impl ShotAnnouncement {
    pub fn new(session_id: Uuid, shot: ShotEvent) -> Self {
        Self { session_id, shot }
    }

    /// Check the announcement before it is published.
    pub fn validate(&self) -> Result<(), AnnounceError> {
        self.shot.validate()
    }
}

/// Reasons a shot announcement is refused.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AnnounceError {
    #[error("job id '{0}' is shorter than {MIN_JOB_ID_LEN} characters")]
    JobIdTooShort(String),

    #[error("interval must be at least 1 second")]
    ZeroInterval,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shot(job_id: &str, interval: u32) -> ShotEvent {
        ShotEvent {
            job_id: job_id.to_string(),
            captured_at_millis: 1_700_000_000_000,
            interval_seconds: interval,
        }
    }

    #[test]
    fn test_announcement_wire_format() {
        let session = Uuid::new_v4();
        let ann = ShotAnnouncement::new(session, shot("job-12345", 10));
        let value = serde_json::to_value(&ann).unwrap();
        assert_eq!(value["sessionId"], session.to_string());
        assert_eq!(value["jobId"], "job-12345");
        assert_eq!(value["ts"], 1_700_000_000_000i64);
        assert_eq!(value["intervalSec"], 10);
    }

    #[test]
    fn test_shot_decodes_from_announcement() {
        let json = r#"{"sessionId":"00000000-0000-0000-0000-000000000000",
                       "jobId":"abcdefgh","ts":5,"intervalSec":3}"#;
        let shot: ShotEvent = serde_json::from_str(json).unwrap();
        assert_eq!(shot.job_id, "abcdefgh");
        assert_eq!(shot.due_at_millis(), 3005);
    }

    #[test]
    fn test_due_at_saturates() {
        let mut late = shot("abcdefgh", 10);
        late.captured_at_millis = i64::MAX - 5;
        assert_eq!(late.due_at_millis(), i64::MAX);
    }

    #[test]
    fn test_validate_rejects_short_job_id() {
        let ann = ShotAnnouncement::new(Uuid::nil(), shot("short", 10));
        assert_eq!(
            ann.validate(),
            Err(AnnounceError::JobIdTooShort("short".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let ann = ShotAnnouncement::new(Uuid::nil(), shot("long-enough", 0));
        assert_eq!(ann.validate(), Err(AnnounceError::ZeroInterval));
        let ok = ShotAnnouncement::new(Uuid::nil(), shot("long-enough", 1));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_answer_without_job_id() {
        let answer: AnswerEvent =
            serde_json::from_str(r#"{"kind":"VF","answer":"V","confidence":0.9}"#).unwrap();
        assert_eq!(answer.job_id, None);
        assert!(answer.is_valid());
        let value = serde_json::to_value(&answer).unwrap();
        assert!(value.get("jobId").is_none());
    }

    #[test]
    fn test_answer_validity() {
        let mut answer = AnswerEvent {
            job_id: Some("j".to_string()),
            kind: AnswerKind::MultipleChoice,
            answer: "Q".to_string(),
            confidence: 0.5,
        };
        assert!(!answer.is_valid());
        answer.answer = "D".to_string();
        assert!(answer.is_valid());
        answer.confidence = 2.0;
        assert!(!answer.is_valid());
    }
}
