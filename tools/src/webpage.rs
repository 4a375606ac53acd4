//! `load_web_page`: fetch a URL and reduce its HTML to readable lines.

use std::time::Duration;

use futures_util::StreamExt;
use scraper::{Html, Node};
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use super::{ToolCtx, ToolError, ToolExecutor, ToolFut, parse_args};

pub const LOAD_WEB_PAGE_TOOL_NAME: &str = "load_web_page";

/// Lines with this many words or fewer are dropped as navigation noise.
const MIN_WORDS_EXCLUSIVE: usize = 3;

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

#[derive(Debug, Clone)]
pub struct WebPageConfig {
    pub timeout_seconds: u64,
    pub max_download_bytes: usize,
    pub user_agent: String,
}

impl Default for WebPageConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 20,
            max_download_bytes: 5 * 1024 * 1024,
            user_agent: concat!("adk-mcp/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoadWebPageArgs {
    url: String,
}

#[derive(Debug)]
pub struct LoadWebPageTool {
    config: WebPageConfig,
    client: reqwest::Client,
}

impl LoadWebPageTool {
    #[must_use]
    pub fn new(config: WebPageConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build web page HTTP client: {e}. Falling back to defaults.");
                reqwest::Client::new()
            });
        Self { config, client }
    }

    /// Fetch `url` and return its text content.
    ///
    /// A non-200 status is not an error: the page text becomes
    /// `Failed to fetch url: {url}`. Transport failures and bad URLs are.
    pub async fn load(&self, url: &str) -> Result<String, ToolError> {
        let parsed = Url::parse(url.trim()).map_err(|e| ToolError::BadArgs {
            message: format!("invalid url '{url}': {e}"),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ToolError::BadArgs {
                message: format!("unsupported url scheme '{}'", parsed.scheme()),
            });
        }

        tracing::debug!(url = %parsed, "Loading web page");
        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| ToolError::failed(LOAD_WEB_PAGE_TOOL_NAME, e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            tracing::info!(url = %parsed, status = response.status().as_u16(), "Web page fetch failed");
            return Ok(keep_informative_lines(&format!("Failed to fetch url: {url}")));
        }

        let body = self.read_body(response).await?;
        let text = html_to_text(&String::from_utf8_lossy(&body));
        Ok(keep_informative_lines(&text))
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<Vec<u8>, ToolError> {
        let max = self.config.max_download_bytes;
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| ToolError::failed(LOAD_WEB_PAGE_TOOL_NAME, e.to_string()))?;
            body.extend_from_slice(&chunk);
            if body.len() > max {
                tracing::warn!(max, "Web page exceeds download cap; truncating");
                body.truncate(max);
                break;
            }
        }
        Ok(body)
    }
}

/// Every non-blank text node outside script-like elements, one per line.
fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines = Vec::new();
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_TAGS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    lines.join("\n")
}

fn keep_informative_lines(text: &str) -> String {
    text.lines()
        .filter(|line| line.split_whitespace().count() > MIN_WORDS_EXCLUSIVE)
        .collect::<Vec<_>>()
        .join("\n")
}

impl ToolExecutor for LoadWebPageTool {
    fn name(&self) -> &str {
        LOAD_WEB_PAGE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Load and extract content from web pages"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to browse"
                }
            },
            "required": ["url"]
        })
    }

    fn timeout(&self) -> Option<Duration> {
        Some(Duration::from_secs(self.config.timeout_seconds + 5))
    }

    fn execute<'a>(&'a self, args: Value, _ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: LoadWebPageArgs = parse_args(&args)?;
            Ok(Value::String(self.load(&typed.url).await?))
        })
    }
}
