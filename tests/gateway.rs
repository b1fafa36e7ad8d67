//! Gateway tests against a local stub of the chat-completion endpoint.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use id_ocr_extractor::{CompletionGateway, ExtractionError, LlmConfig, MistralGateway};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn spawn_stub(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });
    addr
}

fn config_for(addr: SocketAddr) -> LlmConfig {
    LlmConfig {
        api_key: Some("test-key".to_string()),
        base_url: format!("http://{}/v1", addr),
        timeout_ms: 2_000,
        ..LlmConfig::default()
    }
}

fn gateway_for(addr: SocketAddr) -> MistralGateway {
    MistralGateway::new(config_for(addr)).expect("gateway")
}

async fn complete_against_status(status: StatusCode) -> ExtractionError {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(move || async move { (status, "{\"message\":\"upstream says no\"}") }),
    );
    let addr = spawn_stub(router).await;
    gateway_for(addr)
        .complete("prompt")
        .await
        .expect_err("non-2xx must fail")
}

#[derive(Clone, Default)]
struct Captured {
    auth: Arc<Mutex<Option<String>>>,
    body: Arc<Mutex<Option<Value>>>,
}

async fn capture_and_reply(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    *captured.auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *captured.body.lock().unwrap() = Some(body);
    Json(json!({
        "id": "cmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "\n{\"nome\":\"Marco\"}\n"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 321, "completion_tokens": 45, "total_tokens": 366}
    }))
}

#[tokio::test]
async fn successful_completion_sends_expected_request() {
    let captured = Captured::default();
    let router = Router::new()
        .route("/v1/chat/completions", post(capture_and_reply))
        .with_state(captured.clone());
    let addr = spawn_stub(router).await;

    let completion = gateway_for(addr).complete("estrai i campi").await.unwrap();
    assert_eq!(completion.content, "{\"nome\":\"Marco\"}");
    let usage = completion.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 321);
    assert_eq!(usage.completion_tokens, 45);

    assert_eq!(
        captured.auth.lock().unwrap().as_deref(),
        Some("Bearer test-key")
    );
    let body = captured.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "mistral-small-latest");
    assert_eq!(body["max_tokens"], 300);
    assert_eq!(body["messages"], json!([{"role": "user", "content": "estrai i campi"}]));
    assert!(body["temperature"].as_f64().unwrap() < 0.2);
    assert!(body.get("top_p").is_some());
}

#[tokio::test]
async fn unauthorized_is_auth_error() {
    assert_eq!(
        complete_against_status(StatusCode::UNAUTHORIZED).await,
        ExtractionError::AuthError
    );
}

#[tokio::test]
async fn too_many_requests_is_rate_limited() {
    assert_eq!(
        complete_against_status(StatusCode::TOO_MANY_REQUESTS).await,
        ExtractionError::RateLimited
    );
}

#[tokio::test]
async fn server_errors_are_service_unavailable() {
    assert_eq!(
        complete_against_status(StatusCode::INTERNAL_SERVER_ERROR).await,
        ExtractionError::ServiceUnavailable(500)
    );
    assert_eq!(
        complete_against_status(StatusCode::SERVICE_UNAVAILABLE).await,
        ExtractionError::ServiceUnavailable(503)
    );
}

#[tokio::test]
async fn other_client_errors_are_service_failure() {
    assert_eq!(
        complete_against_status(StatusCode::UNPROCESSABLE_ENTITY).await,
        ExtractionError::ServiceFailure(422)
    );
}

#[tokio::test]
async fn missing_envelope_is_malformed() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(json!({"object": "error", "choices": []})) }),
    );
    let addr = spawn_stub(router).await;
    let err = gateway_for(addr).complete("prompt").await.unwrap_err();
    assert_eq!(err, ExtractionError::MalformedResponse);
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { "<html>gateway page</html>" }),
    );
    let addr = spawn_stub(router).await;
    let err = gateway_for(addr).complete("prompt").await.unwrap_err();
    assert_eq!(err, ExtractionError::MalformedResponse);
}

#[tokio::test]
async fn connection_refused_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = gateway_for(addr).complete("prompt").await.unwrap_err();
    assert_eq!(err, ExtractionError::NetworkError);
}

#[tokio::test]
async fn slow_provider_times_out() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"choices": [{"message": {"content": "{}"}}]}))
        }),
    );
    let addr = spawn_stub(router).await;
    let config = LlmConfig {
        timeout_ms: 200,
        ..config_for(addr)
    };

    let started = std::time::Instant::now();
    let err = MistralGateway::new(config)
        .unwrap()
        .complete("prompt")
        .await
        .unwrap_err();
    assert_eq!(err, ExtractionError::Timeout);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn missing_api_key_makes_no_call() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(json!({"choices": [{"message": {"content": "{}"}}]}))
            }
        }),
    );
    let addr = spawn_stub(router).await;
    let config = LlmConfig {
        api_key: None,
        ..config_for(addr)
    };

    let err = MistralGateway::new(config)
        .unwrap()
        .complete("prompt")
        .await
        .unwrap_err();
    assert_eq!(err, ExtractionError::Unconfigured);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
