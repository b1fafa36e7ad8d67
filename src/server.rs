use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::{Config, ServerConfig};
use crate::error::ExtractionError;
use crate::gateway::{CompletionGateway, GatewayBuildError, MistralGateway};
use crate::models::{ExtractionRequest, ExtractionResult};
use crate::ratelimit::{rate_limit, RateLimiter};
use crate::service::ExtractionService;

const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// State shared by the API handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ExtractionService>,
    pub limiter: Arc<RateLimiter>,
    pub environment: String,
    pub llm_configured: bool,
    pub started: Instant,
}

impl AppState {
    pub fn new(service: ExtractionService, server: &ServerConfig, llm_configured: bool) -> Self {
        Self {
            service: Arc::new(service),
            limiter: Arc::new(RateLimiter::new(
                server.rate_limit_max_requests,
                Duration::from_millis(server.rate_limit_window_ms),
            )),
            environment: server.environment.clone(),
            llm_configured,
            started: Instant::now(),
        }
    }
}

/// Wire the Mistral gateway into a ready-to-serve router.
pub fn build_app(config: &Config) -> Result<Router, GatewayBuildError> {
    let gateway = MistralGateway::new(config.llm.clone())?;
    tracing::info!(endpoint = %gateway.endpoint(), "completion gateway ready");
    let gateway: Arc<dyn CompletionGateway> = Arc::new(gateway);
    let service = ExtractionService::new(gateway, config.llm.cost_per_1k_tokens);
    let state = AppState::new(service, &config.server, config.llm.is_configured());
    Ok(build_router(state, &config.server))
}

/// Everything under `/api`, unknown paths included, is rate limited; unknown
/// API paths get a JSON 404 instead of the frontend.
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/mistral/analyze", post(analyze))
        .route("/extract", post(analyze))
        .fallback(api_not_found)
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit,
        ))
        .with_state(state);

    let static_dir = PathBuf::from(&server.static_dir);
    let frontend = ServeDir::new(&static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .nest("/api", api)
        .fallback_service(frontend)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("same-origin"),
        ))
        .layer(cors_layer(server))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "skipping invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": state.environment,
    }))
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "uptimeSeconds": state.started.elapsed().as_secs(),
        "environment": state.environment,
        "version": env!("CARGO_PKG_VERSION"),
        "llmConfigured": state.llm_configured,
    }))
}

async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<ExtractionRequest>, JsonRejection>,
) -> Response {
    let ocr_text = match payload {
        Ok(Json(ExtractionRequest {
            ocr_text: Value::String(text),
        })) => text,
        Ok(_) => return invalid_body("Testo OCR mancante o non valido"),
        Err(rejection) => {
            tracing::warn!(error = %rejection, "rejected analyze body");
            return invalid_body("Corpo della richiesta non valido");
        }
    };

    let result = state.service.run(&ocr_text).await;
    let status = result.error_kind.map(status_for_kind).unwrap_or(StatusCode::OK);
    (status, Json(result)).into_response()
}

async fn api_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Endpoint non trovato",
        })),
    )
        .into_response()
}

fn invalid_body(message: &str) -> Response {
    let result = ExtractionResult::from(&ExtractionError::InvalidInput(message.to_string()));
    (StatusCode::BAD_REQUEST, Json(result)).into_response()
}

/// HTTP status for a failed extraction.
pub fn status_for_kind(kind: crate::error::ErrorKind) -> StatusCode {
    use crate::error::ErrorKind;
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::NetworkError => StatusCode::BAD_GATEWAY,
        ErrorKind::Unconfigured
        | ErrorKind::AuthError
        | ErrorKind::ServiceUnavailable
        | ErrorKind::ServiceFailure
        | ErrorKind::MalformedResponse
        | ErrorKind::NoJsonFound
        | ErrorKind::InvalidJson => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
