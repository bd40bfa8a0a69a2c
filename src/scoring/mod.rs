//! Scoring: turning a photographed question into an answer.

mod client;
mod mock;
mod types;

use futures_util::future::BoxFuture;

pub use client::{
    data_url, HttpScorer, ANSWER_PATH, DEFAULT_CONNECT_TIMEOUT, DEFAULT_SCORER_URL,
    SCORER_API_KEY_ENV,
};
pub use mock::MockScorer;
pub use types::{
    is_valid_answer, AnswerKind, ScoreError, ScoreRequest, ScoreResponse, VALID_ANSWERS,
};

/// Something that can answer a photographed question.
///
/// Implementations are called at most once at a time by the dispatcher.
pub trait Scorer: Send + Sync {
    fn score<'a>(
        &'a self,
        request: ScoreRequest<'a>,
    ) -> BoxFuture<'a, Result<ScoreResponse, ScoreError>>;

    /// Short description for logs and the status line.
    fn describe(&self) -> String;
}
