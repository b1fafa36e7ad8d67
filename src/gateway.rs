use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::LlmConfig;
use crate::error::ExtractionError;
use crate::models::{LlmCompletion, Usage};

// ── Constants ────────────────────────────────────────────────────────────────

const USER_AGENT: &str = "id-ocr-extractor/1.0";
const CONNECT_TIMEOUT_SECS: u64 = 5;

// ── Gateway seam ─────────────────────────────────────────────────────────────

/// A chat-completion backend. Implementations make at most one outbound
/// call per invocation and never retry.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<LlmCompletion, ExtractionError>;

    /// Model identifier reported alongside cost estimates.
    fn model(&self) -> &str;
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Every level is optional so that a partial envelope is reported as a
/// malformed response instead of a decode error.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<Choice>>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

impl From<WireUsage> for Usage {
    fn from(wire: WireUsage) -> Self {
        let prompt_tokens = wire.prompt_tokens.unwrap_or(0);
        let completion_tokens = wire.completion_tokens.unwrap_or(0);
        Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: wire
                .total_tokens
                .unwrap_or_else(|| prompt_tokens.saturating_add(completion_tokens)),
        }
    }
}

// ── Mistral (OpenAI-compatible) gateway ──────────────────────────────────────

pub struct MistralGateway {
    client: reqwest::Client,
    endpoint: Url,
    config: LlmConfig,
}

impl MistralGateway {
    pub fn new(config: LlmConfig) -> Result<Self, GatewayBuildError> {
        let endpoint = config.completions_url()?;
        let client = reqwest::ClientBuilder::new()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Construction-time failure; distinct from per-request errors because it
/// happens once at startup.
#[derive(Debug, thiserror::Error)]
pub enum GatewayBuildError {
    #[error("invalid completion endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[async_trait]
impl CompletionGateway for MistralGateway {
    async fn complete(&self, prompt: &str) -> Result<LlmCompletion, ExtractionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ExtractionError::Unconfigured)?;

        let body = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
        };

        tracing::debug!(model = %self.config.model, "sending completion request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %error_body, "completion API error");
            return Err(classify_status(status.as_u16()));
        }

        let raw = response.text().await.map_err(classify_transport_error)?;
        parse_completion(&raw)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// ── Failure classification ───────────────────────────────────────────────────

fn classify_status(status: u16) -> ExtractionError {
    match status {
        401 => ExtractionError::AuthError,
        429 => ExtractionError::RateLimited,
        s if s >= 500 => ExtractionError::ServiceUnavailable(s),
        s => ExtractionError::ServiceFailure(s),
    }
}

fn classify_transport_error(err: reqwest::Error) -> ExtractionError {
    if err.is_timeout() {
        tracing::error!(error = %err, "completion request timed out");
        ExtractionError::Timeout
    } else if err.is_connect() {
        tracing::error!(error = %err, "could not connect to completion API");
        ExtractionError::NetworkError
    } else if err.is_decode() {
        tracing::error!(error = %err, "completion body could not be decoded");
        ExtractionError::MalformedResponse
    } else if err.is_body() {
        tracing::error!(error = %err, "completion body could not be read");
        ExtractionError::NetworkError
    } else if err.is_redirect() {
        tracing::error!(error = %err, "completion API redirect failed");
        ExtractionError::NetworkError
    } else if err.is_builder() {
        tracing::error!(error = %err, "completion request could not be built");
        ExtractionError::NetworkError
    } else {
        tracing::error!(error = %err, "completion request failed");
        ExtractionError::NetworkError
    }
}

fn parse_completion(raw: &str) -> Result<LlmCompletion, ExtractionError> {
    let envelope: ChatResponse = serde_json::from_str(raw).map_err(|e| {
        tracing::error!(error = %e, "completion body is not JSON");
        ExtractionError::MalformedResponse
    })?;

    let content = envelope
        .choices
        .and_then(|choices| choices.into_iter().next())
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or_else(|| {
            tracing::error!("completion envelope has no choices[0].message.content");
            ExtractionError::MalformedResponse
        })?;

    Ok(LlmCompletion {
        content: content.trim().to_string(),
        usage: envelope.usage.map(Usage::from),
    })
}
