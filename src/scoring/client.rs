//! HttpScorer - sends photographed questions to the answer service.

use std::time::Duration;

use base64::Engine;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{AnswerKind, ScoreError, ScoreRequest, ScoreResponse};
use super::Scorer;

/// Optional bearer token for the answer service.
pub const SCORER_API_KEY_ENV: &str = "QUIZCAM_API_KEY";

/// Default base URL of the answer service.
pub const DEFAULT_SCORER_URL: &str = "http://127.0.0.1:3000";

/// Path of the answer endpoint, relative to the base URL.
pub const ANSWER_PATH: &str = "/api/answer";

/// Default connection timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Encode bytes as a `data:` URL.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Request body for the answer endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    image_data_url: String,
    mode: AnswerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<Uuid>,
}

/// Error body returned on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Client for the answer service.
///
/// No request timeout is applied; a slow scorer holds the queue until it
/// answers or the connection drops.
pub struct HttpScorer {
    api_key: Option<String>,
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpScorer {
    /// Create a client for `base_url`, reading an optional bearer token
    /// from `QUIZCAM_API_KEY`.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, ScoreError> {
        let api_key = std::env::var(SCORER_API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty());
        Self::with_api_key(base_url, api_key, connect_timeout)
    }

    /// Create a client with an explicit token and connect timeout.
    pub fn with_api_key(
        base_url: &str,
        api_key: Option<String>,
        connect_timeout: Duration,
    ) -> Result<Self, ScoreError> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ScoreError::InvalidUrl(base_url.to_string()));
        }

        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            api_key,
            base_url: base_url.to_string(),
            http_client,
        })
    }

    /// Create a client without a token. Useful for testing against a mock server.
    pub fn with_base_url(base_url: &str) -> Result<Self, ScoreError> {
        Self::with_api_key(base_url, None, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Full URL of the answer endpoint.
    pub fn answer_url(&self) -> String {
        format!("{}{}", self.base_url, ANSWER_PATH)
    }

    /// Submit one image and wait for the verdict.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::Api` for non-2xx responses (carrying the body's
    /// `error` field when present), `ScoreError::Malformed` if the body is
    /// not a valid verdict, or `ScoreError::Http` if the request fails.
    pub async fn request_answer(
        &self,
        request: ScoreRequest<'_>,
    ) -> Result<ScoreResponse, ScoreError> {
        let body = AnswerRequest {
            image_data_url: data_url("image/jpeg", request.image),
            mode: request.mode,
            session_id: request.session_id,
            job_id: request.job_id,
        };

        let mut builder = self.http_client.post(self.answer_url()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        log::debug!(
            "Scoring {} byte image (job {:?})",
            request.image.len(),
            request.job_id
        );
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| {
                    if text.trim().is_empty() {
                        status.to_string()
                    } else {
                        text.trim().to_string()
                    }
                });
            return Err(ScoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let verdict: ScoreResponse = serde_json::from_str(&text)
            .map_err(|e| ScoreError::Malformed(format!("{}: {}", e, text.trim())))?;
        verdict.validate()
    }
}

impl Scorer for HttpScorer {
    fn score<'a>(
        &'a self,
        request: ScoreRequest<'a>,
    ) -> BoxFuture<'a, Result<ScoreResponse, ScoreError>> {
        Box::pin(self.request_answer(request))
    }

    fn describe(&self) -> String {
        format!("http scorer at {}", self.base_url)
    }
}
