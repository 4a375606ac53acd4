//! `google_search`: web search through the Google Programmable Search JSON
//! API.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use super::{ToolCtx, ToolError, ToolExecutor, ToolFut, parse_args};

pub const GOOGLE_SEARCH_TOOL_NAME: &str = "google_search";

/// Canonical Custom Search JSON API endpoint.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

const DEFAULT_NUM_RESULTS: u8 = 5;
const MAX_NUM_RESULTS: u8 = 10;
const SEARCH_TIMEOUT_SECS: u64 = 30;
const MAX_ERROR_BODY_CHARS: usize = 2_000;

#[derive(Clone)]
pub struct GoogleSearchConfig {
    pub api_key: Option<String>,
    pub engine_id: Option<String>,
    pub endpoint: String,
}

impl Default for GoogleSearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            engine_id: None,
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
        }
    }
}

impl fmt::Debug for GoogleSearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleSearchConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("engine_id", &self.engine_id)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    num_results: Option<u8>,
}

/// One search hit as handed back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchHit>,
    #[serde(default, rename = "searchInformation")]
    search_information: Option<SearchInformation>,
}

#[derive(Debug, Deserialize)]
struct SearchInformation {
    #[serde(default, rename = "totalResults")]
    total_results: Option<String>,
}

#[derive(Debug)]
pub struct GoogleSearchTool {
    config: GoogleSearchConfig,
    client: reqwest::Client,
}

impl GoogleSearchTool {
    #[must_use]
    pub fn new(config: GoogleSearchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .user_agent(concat!("adk-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build search HTTP client: {e}. Falling back to defaults.");
                reqwest::Client::new()
            });
        Self { config, client }
    }

    #[must_use]
    pub fn config(&self) -> &GoogleSearchConfig {
        &self.config
    }

    /// Run one query and return `{query, total_results, results[{title, link, snippet}]}`.
    pub async fn search(&self, query: &str, num_results: u8) -> Result<Value, ToolError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ToolError::BadArgs {
                message: "query must not be empty".to_string(),
            });
        }
        if !(1..=MAX_NUM_RESULTS).contains(&num_results) {
            return Err(ToolError::BadArgs {
                message: format!("num_results must be between 1 and {MAX_NUM_RESULTS}"),
            });
        }
        let (Some(api_key), Some(engine_id)) = (
            self.config.api_key.as_deref(),
            self.config.engine_id.as_deref(),
        ) else {
            return Err(ToolError::failed(
                GOOGLE_SEARCH_TOOL_NAME,
                "search is not configured (set GOOGLE_API_KEY and GOOGLE_CSE_ID)",
            ));
        };

        let mut url = Url::parse(&self.config.endpoint).map_err(|e| {
            ToolError::failed(GOOGLE_SEARCH_TOOL_NAME, format!("invalid search endpoint: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("key", api_key)
            .append_pair("cx", engine_id)
            .append_pair("q", query)
            .append_pair("num", &num_results.to_string());

        tracing::debug!(%query, num_results, "Running web search");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::failed(GOOGLE_SEARCH_TOOL_NAME, e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(ToolError::failed(
                GOOGLE_SEARCH_TOOL_NAME,
                format!("search API returned {}: {body}", status.as_u16()),
            ));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            ToolError::failed(
                GOOGLE_SEARCH_TOOL_NAME,
                format!("invalid search response: {}", e.without_url()),
            )
        })?;

        let total_results = parsed
            .search_information
            .and_then(|info| info.total_results)
            .and_then(|total| total.parse::<u64>().ok());
        let mut results = parsed.items;
        results.truncate(usize::from(num_results));

        Ok(json!({
            "query": query,
            "total_results": total_results,
            "results": results,
        }))
    }
}

impl ToolExecutor for GoogleSearchTool {
    fn name(&self) -> &str {
        GOOGLE_SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the web using Google Search API"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_NUM_RESULTS,
                    "default": DEFAULT_NUM_RESULTS,
                    "description": "Number of results to return"
                }
            },
            "required": ["query"]
        })
    }

    fn timeout(&self) -> Option<Duration> {
        Some(Duration::from_secs(SEARCH_TIMEOUT_SECS + 5))
    }

    fn execute<'a>(&'a self, args: Value, _ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: SearchArgs = parse_args(&args)?;
            self.search(&typed.query, typed.num_results.unwrap_or(DEFAULT_NUM_RESULTS))
                .await
        })
    }
}
