use serde::Deserialize;
use serde_json::{Value, json};

use crate::operation::{Envelope, OpFut, Operation, parse_args};
use crate::state::ServerState;

const DEFAULT_NUM_RESULTS: i64 = 5;

fn default_num_results() -> i64 {
    DEFAULT_NUM_RESULTS
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default = "default_num_results")]
    num_results: i64,
}

/// Direct web search, outside any agent.
pub struct SearchWeb;

impl Operation for SearchWeb {
    fn name(&self) -> &'static str {
        "search_web"
    }

    fn description(&self) -> &'static str {
        "Perform a web search using Google Search"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of results to return",
                    "default": DEFAULT_NUM_RESULTS
                }
            },
            "required": ["query"]
        })
    }

    fn call<'a>(&'a self, state: &'a ServerState, args: Value) -> OpFut<'a> {
        Box::pin(async move {
            let args: SearchArgs = parse_args(args)?;
            // Out-of-range counts are rejected by the search tool itself.
            let num_results = u8::try_from(args.num_results).unwrap_or(u8::MAX);
            match state
                .catalog()
                .google_search()
                .search(&args.query, num_results)
                .await
            {
                Ok(result) => Ok(Envelope::Success(result)),
                Err(e) => {
                    tracing::warn!(query = %args.query, %e, "Search failed");
                    Ok(Envelope::failure(format!("Search failed: {e}")))
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct LoadArgs {
    url: String,
}

pub struct LoadWebpageContent;

impl Operation for LoadWebpageContent {
    fn name(&self) -> &'static str {
        "load_webpage_content"
    }

    fn description(&self) -> &'static str {
        "Load and extract content from a webpage URL"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL of the webpage to load"
                }
            },
            "required": ["url"]
        })
    }

    fn call<'a>(&'a self, state: &'a ServerState, args: Value) -> OpFut<'a> {
        Box::pin(async move {
            let args: LoadArgs = parse_args(args)?;
            match state.catalog().load_web_page().load(&args.url).await {
                Ok(text) => Ok(Envelope::Success(Value::String(text))),
                Err(e) => {
                    tracing::warn!(url = %args.url, %e, "Webpage load failed");
                    Ok(Envelope::failure(format!("Failed to load webpage: {e}")))
                }
            }
        })
    }
}
