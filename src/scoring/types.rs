//! Scoring request/response types and validation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Answers a scorer may return: multiple-choice letters, true/false, or a
/// numbered option.
pub const VALID_ANSWERS: &[&str] = &[
    "A", "B", "C", "D", "E", "V", "F", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10",
];

/// Kind of exam question; also the mode hint sent to the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AnswerKind {
    /// Multiple choice (A-E)
    #[default]
    #[serde(rename = "MC")]
    MultipleChoice,
    /// True/false (V/F)
    #[serde(rename = "VF")]
    TrueFalse,
}

impl AnswerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerKind::MultipleChoice => "MC",
            AnswerKind::TrueFalse => "VF",
        }
    }
}

impl std::fmt::Display for AnswerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true if `answer` is one of [`VALID_ANSWERS`].
pub fn is_valid_answer(answer: &str) -> bool {
    VALID_ANSWERS.contains(&answer)
}

/// What a scorer is asked to look at.
#[derive(Debug, Clone, Copy)]
pub struct ScoreRequest<'a> {
    /// Encoded still image
    pub image: &'a [u8],
    pub session_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub mode: AnswerKind,
}

/// A scorer's verdict for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResponse {
    #[serde(default)]
    pub kind: AnswerKind,
    pub answer: String,
    pub confidence: f64,
}

impl ScoreResponse {
    /// Reject answers outside the known set and confidences outside [0, 1].
    pub fn validate(self) -> Result<Self, ScoreError> {
        if !is_valid_answer(&self.answer) {
            return Err(ScoreError::Malformed(format!(
                "unexpected answer '{}'",
                self.answer
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ScoreError::Malformed(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(self)
    }
}

/// Errors that can occur while scoring an image.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Scorer returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed scoring response: {0}")]
    Malformed(String),

    #[error("Invalid scorer URL: {0}")]
    InvalidUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(answer: &str, confidence: f64) -> ScoreResponse {
        ScoreResponse {
            kind: AnswerKind::MultipleChoice,
            answer: answer.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_valid_answers() {
        for a in ["A", "E", "V", "F", "1", "10"] {
            assert!(is_valid_answer(a), "{} should be valid", a);
        }
        for a in ["", "G", "a", "0", "11", "AB"] {
            assert!(!is_valid_answer(a), "{} should be invalid", a);
        }
    }

    #[test]
    fn test_answer_kind_wire_names() {
        assert_eq!(serde_json::to_string(&AnswerKind::TrueFalse).unwrap(), "\"VF\"");
        let kind: AnswerKind = serde_json::from_str("\"MC\"").unwrap();
        assert_eq!(kind, AnswerKind::MultipleChoice);
        assert!(serde_json::from_str::<AnswerKind>("\"XX\"").is_err());
    }

    #[test]
    fn test_response_kind_defaults_to_mc() {
        let resp: ScoreResponse =
            serde_json::from_str(r#"{"answer":"C","confidence":0.7}"#).unwrap();
        assert_eq!(resp.kind, AnswerKind::MultipleChoice);
    }

    #[test]
    fn test_validate_accepts_good_response() {
        assert!(response("B", 0.8).validate().is_ok());
        assert!(response("V", 0.0).validate().is_ok());
        assert!(response("10", 1.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_answer() {
        let err = response("Z", 0.5).validate().unwrap_err();
        assert!(matches!(err, ScoreError::Malformed(_)));
    }

    #[test]
    fn test_validate_rejects_bad_confidence() {
        assert!(response("A", 1.5).validate().is_err());
        assert!(response("A", -0.1).validate().is_err());
        assert!(response("A", f64::NAN).validate().is_err());
    }

    #[test]
    fn test_score_error_display() {
        let err = ScoreError::Api {
            status: 400,
            message: "Invalid input".to_string(),
        };
        assert_eq!(err.to_string(), "Scorer returned 400: Invalid input");
        assert_eq!(
            ScoreError::Malformed("x".to_string()).to_string(),
            "Malformed scoring response: x"
        );
    }
}
