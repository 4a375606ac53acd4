//! Model backends for adk-mcp agents.
//!
//! # Architecture
//!
//! Agents talk to a language model through the [`ModelBackend`] trait: one
//! non-streaming `generate` call per turn, taking an [`LlmRequest`] built from
//! the session history and returning the model's [`LlmResponse`].
//!
//! - [`gemini`] - Google Gemini API client (GenerateContent API)
//! - [`retry`] - shared HTTP retry policy
//!
//! # Error Handling
//!
//! Every failure surfaces as a [`ModelError`]. Transient HTTP failures are
//! retried inside the backend before an error is returned, so callers never
//! need their own retry loop.

pub mod gemini;
pub mod retry;

use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;
use std::time::Duration;

use adk_mcp_types::{Content, ToolDefinition, Usage};

pub use gemini::GeminiBackend;

/// Canonical Gemini API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 300;

// reqwest only exposes tcp_keepalive (idle time); interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Shared HTTP client for model calls.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        base_client_builder().build().unwrap_or_else(|e| {
            tracing::error!("Failed to build tuned HTTP client: {e}. Falling back to defaults.");
            reqwest::Client::new()
        })
    })
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!("adk-mcp/", env!("CARGO_PKG_VERSION")))
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

/// Read an error body, truncated to a bounded size.
pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// One model turn: everything the backend needs to produce the next content.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub content: Content,
    pub usage: Usage,
    /// Raw finish reason reported by the backend, if any.
    pub finish_reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("no Google API key configured (set GOOGLE_API_KEY or api_keys.google)")]
    MissingApiKey,
    #[error("invalid model name '{0}'")]
    InvalidModel(String),
    #[error("API error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request failed after {attempts} attempts: {source}")]
    Connection {
        attempts: u32,
        source: reqwest::Error,
    },
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
    #[error("response blocked: {0}")]
    Blocked(String),
}

pub type ModelFut<'a> = Pin<Box<dyn Future<Output = Result<LlmResponse, ModelError>> + Send + 'a>>;

/// A language model reachable for one-shot generation.
pub trait ModelBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn generate<'a>(&'a self, request: &'a LlmRequest) -> ModelFut<'a>;
}
