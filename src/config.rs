use std::str::FromStr;
use std::time::Duration;

use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_MODEL: &str = "mistral-small-latest";

/// Settings handed to the completion gateway at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// EUR per 1000 tokens, used for the cost estimate only.
    pub cost_per_1k_tokens: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_ms: 20_000,
            max_tokens: 300,
            temperature: 0.1,
            top_p: 1.0,
            cost_per_1k_tokens: 0.0001,
        }
    }
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `{base_url}/chat/completions`, tolerating a trailing slash on the base.
    pub fn completions_url(&self) -> Result<Url, url::ParseError> {
        let base = format!("{}/", self.base_url.trim_end_matches('/'));
        Url::parse(&base)?.join("chat/completions")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: String,
    pub allowed_origins: Vec<String>,
    pub rate_limit_window_ms: u64,
    pub rate_limit_max_requests: u32,
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            environment: "development".to_string(),
            allowed_origins: Vec::new(),
            rate_limit_window_ms: 15 * 60 * 1000,
            rate_limit_max_requests: 100,
            static_dir: "frontend".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Origins CORS should accept: the configured list in production,
    /// the local dev server otherwise.
    pub fn cors_origins(&self) -> Vec<String> {
        if self.is_production() {
            self.allowed_origins.clone()
        } else {
            vec![
                format!("http://localhost:{}", self.port),
                format!("http://127.0.0.1:{}", self.port),
            ]
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub llm: LlmConfig,
    pub server: ServerConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Unset or blank values
    /// keep their default; unparsable numbers are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let llm_defaults = LlmConfig::default();
        let server_defaults = ServerConfig::default();

        let llm = LlmConfig {
            api_key: get("MISTRAL_API_KEY"),
            base_url: get("MISTRAL_BASE_URL").unwrap_or(llm_defaults.base_url),
            model: get("MISTRAL_MODEL").unwrap_or(llm_defaults.model),
            timeout_ms: parse_or(&get, "LLM_TIMEOUT_MS", llm_defaults.timeout_ms),
            max_tokens: parse_or(&get, "LLM_MAX_TOKENS", llm_defaults.max_tokens),
            temperature: parse_or(&get, "LLM_TEMPERATURE", llm_defaults.temperature),
            top_p: parse_or(&get, "LLM_TOP_P", llm_defaults.top_p),
            cost_per_1k_tokens: parse_or(
                &get,
                "LLM_COST_PER_1K_TOKENS",
                llm_defaults.cost_per_1k_tokens,
            ),
        };

        let server = ServerConfig {
            port: parse_or(&get, "PORT", server_defaults.port),
            environment: get("APP_ENV")
                .or_else(|| get("NODE_ENV"))
                .unwrap_or(server_defaults.environment),
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|list| {
                    list.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            rate_limit_window_ms: parse_or(
                &get,
                "RATE_LIMIT_WINDOW_MS",
                server_defaults.rate_limit_window_ms,
            ),
            rate_limit_max_requests: parse_or(
                &get,
                "RATE_LIMIT_MAX_REQUESTS",
                server_defaults.rate_limit_max_requests,
            ),
            static_dir: get("STATIC_DIR").unwrap_or(server_defaults.static_dir),
        };

        Self { llm, server }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> T
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            default
        }),
        None => default,
    }
}
