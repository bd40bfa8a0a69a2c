//! Offline scorer that derives a stable verdict from the image bytes.

use futures_util::future::BoxFuture;
use sha2::{Digest, Sha256};

use super::types::{AnswerKind, ScoreError, ScoreRequest, ScoreResponse};
use super::Scorer;

const MC_ANSWERS: [&str; 5] = ["A", "B", "C", "D", "E"];
const VF_ANSWERS: [&str; 2] = ["V", "F"];
const FINGERPRINT_BYTES: usize = 8;

/// Scorer for demos and tests: identical images always get the same answer.
#[derive(Debug, Clone, Default)]
pub struct MockScorer {
    delay: Option<std::time::Duration>,
}

impl MockScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait `delay` before answering.
    pub fn with_delay(delay: std::time::Duration) -> Self {
        Self { delay: Some(delay) }
    }

    /// Short hex digest naming an image in logs.
    pub fn fingerprint(image: &[u8]) -> String {
        hex::encode(&Sha256::digest(image)[..FINGERPRINT_BYTES])
    }

    /// The verdict for `image` in `mode`.
    pub fn verdict(image: &[u8], mode: AnswerKind) -> ScoreResponse {
        let digest = Sha256::digest(image);

        let pick = digest[0] as usize;
        let answer = match mode {
            AnswerKind::MultipleChoice => MC_ANSWERS[pick % MC_ANSWERS.len()],
            AnswerKind::TrueFalse => VF_ANSWERS[pick % VF_ANSWERS.len()],
        };
        let confidence = f64::from((digest[1] % 41) + 60) / 100.0;

        ScoreResponse {
            kind: mode,
            answer: answer.to_string(),
            confidence,
        }
    }
}

impl Scorer for MockScorer {
    fn score<'a>(
        &'a self,
        request: ScoreRequest<'a>,
    ) -> BoxFuture<'a, Result<ScoreResponse, ScoreError>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let verdict = Self::verdict(request.image, request.mode);
            log::debug!(
                "Mock verdict {} ({:.2}) for image {}",
                verdict.answer,
                verdict.confidence,
                Self::fingerprint(request.image)
            );
            Ok(verdict)
        })
    }

    fn describe(&self) -> String {
        "mock scorer".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint() {
        let print = MockScorer::fingerprint(b"abc");
        // First bytes of SHA-256("abc")
        assert_eq!(print, "ba7816bf8f01cfea");
        assert_ne!(print, MockScorer::fingerprint(b"abd"));
    }

    #[test]
    fn test_verdict_is_deterministic() {
        let a = MockScorer::verdict(b"question one", AnswerKind::MultipleChoice);
        let b = MockScorer::verdict(b"question one", AnswerKind::MultipleChoice);
        assert_eq!(a, b);
    }

    #[test]
    fn test_verdict_is_valid() {
        for i in 0..50u8 {
            let image = [i; 16];
            let mc = MockScorer::verdict(&image, AnswerKind::MultipleChoice);
            assert!(MC_ANSWERS.contains(&mc.answer.as_str()));
            assert!((0.6..=1.0).contains(&mc.confidence));
            assert!(mc.clone().validate().is_ok());

            let vf = MockScorer::verdict(&image, AnswerKind::TrueFalse);
            assert!(VF_ANSWERS.contains(&vf.answer.as_str()));
            assert_eq!(vf.kind, AnswerKind::TrueFalse);
        }
    }

    #[tokio::test]
    async fn test_score_returns_verdict() {
        let scorer = MockScorer::new();
        let request = ScoreRequest {
            image: b"abc",
            session_id: None,
            job_id: None,
            mode: AnswerKind::TrueFalse,
        };
        let resp = scorer.score(request).await.unwrap();
        assert_eq!(resp, MockScorer::verdict(b"abc", AnswerKind::TrueFalse));
    }
}
