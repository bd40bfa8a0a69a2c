//! Mock HTTP tests for HttpScorer.

use std::time::Duration;

use quizcam::scoring::{
    data_url, AnswerKind, HttpScorer, ScoreError, ScoreRequest, Scorer, ANSWER_PATH,
};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IMAGE: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];

fn request(mode: AnswerKind, job_id: Option<Uuid>) -> ScoreRequest<'static> {
    ScoreRequest {
        image: IMAGE,
        session_id: None,
        job_id,
        mode,
    }
}

#[tokio::test]
async fn test_score_returns_verdict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ANSWER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "kind": "MC",
            "answer": "C",
            "confidence": 0.82
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let scorer = HttpScorer::with_base_url(&mock_server.uri()).unwrap();
    let verdict = scorer
        .score(request(AnswerKind::MultipleChoice, None))
        .await
        .unwrap();

    assert_eq!(verdict.kind, AnswerKind::MultipleChoice);
    assert_eq!(verdict.answer, "C");
    assert!((verdict.confidence - 0.82).abs() < 1e-9);
}

#[tokio::test]
async fn test_score_sends_image_mode_and_job() {
    let mock_server = MockServer::start().await;
    let job_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path(ANSWER_PATH))
        .and(header("Content-Type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "imageDataUrl": data_url("image/jpeg", IMAGE),
            "mode": "VF",
            "jobId": job_id.to_string()
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "kind": "VF",
            "answer": "F",
            "confidence": 0.7
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let scorer = HttpScorer::with_base_url(&mock_server.uri()).unwrap();
    let verdict = scorer
        .score(request(AnswerKind::TrueFalse, Some(job_id)))
        .await
        .unwrap();
    assert_eq!(verdict.answer, "F");
}

#[tokio::test]
async fn test_score_sends_bearer_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ANSWER_PATH))
        .and(header("Authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "answer": "A",
            "confidence": 1.0
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let scorer = HttpScorer::with_api_key(
        &mock_server.uri(),
        Some("secret-token".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();
    assert!(scorer.has_api_key());

    let verdict = scorer
        .score(request(AnswerKind::MultipleChoice, None))
        .await
        .unwrap();
    assert_eq!(verdict.kind, AnswerKind::MultipleChoice);
}

#[tokio::test]
async fn test_error_status_carries_error_field() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ANSWER_PATH))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "Invalid input"})),
        )
        .mount(&mock_server)
        .await;

    let scorer = HttpScorer::with_base_url(&mock_server.uri()).unwrap();
    let err = scorer
        .score(request(AnswerKind::MultipleChoice, None))
        .await
        .unwrap_err();

    match err {
        ScoreError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid input");
        }
        other => panic!("Expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_status_without_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ANSWER_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&mock_server)
        .await;

    let scorer = HttpScorer::with_base_url(&mock_server.uri()).unwrap();
    let err = scorer
        .score(request(AnswerKind::MultipleChoice, None))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScoreError::Api { status: 502, ref message } if message == "bad gateway"
    ));
}

#[tokio::test]
async fn test_unknown_answer_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ANSWER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "kind": "MC",
            "answer": "Z",
            "confidence": 0.5
        })))
        .mount(&mock_server)
        .await;

    let scorer = HttpScorer::with_base_url(&mock_server.uri()).unwrap();
    let err = scorer
        .score(request(AnswerKind::MultipleChoice, None))
        .await
        .unwrap_err();
    assert!(matches!(err, ScoreError::Malformed(_)));
}

#[tokio::test]
async fn test_non_json_success_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ANSWER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&mock_server)
        .await;

    let scorer = HttpScorer::with_base_url(&mock_server.uri()).unwrap();
    let err = scorer
        .score(request(AnswerKind::MultipleChoice, None))
        .await
        .unwrap_err();
    assert!(matches!(err, ScoreError::Malformed(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_http_error() {
    // Port 9 (discard) is almost never listening locally.
    let scorer = HttpScorer::with_api_key("http://127.0.0.1:9", None, Duration::from_millis(500))
        .unwrap();
    let err = scorer
        .score(request(AnswerKind::MultipleChoice, None))
        .await
        .unwrap_err();
    assert!(matches!(err, ScoreError::Http(_)));
}
