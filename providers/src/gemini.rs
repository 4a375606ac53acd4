//! Google Gemini backend over the non-streaming `generateContent` endpoint.
//!
//! Note: the API mixes casing. `system_instruction` is snake_case while
//! `functionCall`, `functionDeclarations` and the response fields are
//! camelCase.

use std::fmt;

use adk_mcp_types::{Content, FunctionCall, Part, Role, ToolDefinition, Usage};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};
use crate::{
    GEMINI_API_BASE_URL, LlmRequest, LlmResponse, ModelBackend, ModelError, ModelFut,
    http_client, read_capped_error_body,
};

/// Gemini client. Cheap to clone.
#[derive(Clone)]
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
    retry: RetryConfig,
}

impl fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl GeminiBackend {
    /// A backend using the shared HTTP client and the public API endpoint.
    ///
    /// A missing key is not an error until the first call.
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: http_client().clone(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            api_base: GEMINI_API_BASE_URL.to_string(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The model name becomes a path segment, so it may not contain URL
    /// delimiters.
    fn endpoint(&self, model: &str) -> Result<String, ModelError> {
        if model.is_empty() || model.contains(['/', '?', '#']) {
            return Err(ModelError::InvalidModel(model.to_string()));
        }
        Ok(format!(
            "{}/models/{model}:generateContent",
            self.api_base.trim_end_matches('/')
        ))
    }

    async fn generate_content(&self, request: &LlmRequest) -> Result<LlmResponse, ModelError> {
        let api_key = self.api_key.as_deref().ok_or(ModelError::MissingApiKey)?;
        let url = self.endpoint(&request.model)?;
        let body = build_request_body(request);

        tracing::debug!(
            model = %request.model,
            contents = request.contents.len(),
            tools = request.tools.len(),
            "Sending Gemini generateContent request"
        );

        let outcome = send_with_retry(
            || {
                self.client
                    .post(&url)
                    .header("x-goog-api-key", api_key)
                    .json(&body)
            },
            &self.retry,
        )
        .await;

        let response = match outcome {
            RetryOutcome::Success(response) => response,
            RetryOutcome::HttpError(response) => {
                let status = response.status().as_u16();
                let body = read_capped_error_body(response).await;
                return Err(ModelError::Http { status, body });
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                return Err(ModelError::Connection { attempts, source });
            }
            RetryOutcome::NonRetryable(e) => return Err(ModelError::Request(e)),
        };

        let wire: wire::Response = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        parse_response(wire)
    }
}

impl ModelBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn generate<'a>(&'a self, request: &'a LlmRequest) -> ModelFut<'a> {
        Box::pin(self.generate_content(request))
    }
}

fn remove_additional_properties(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("additionalProperties");
            for value in map.values_mut() {
                remove_additional_properties(value);
            }
        }
        Value::Array(values) => {
            for value in values {
                remove_additional_properties(value);
            }
        }
        _ => {}
    }
}

fn part_to_wire(part: &Part) -> Value {
    match part {
        Part::Text { text } => json!({ "text": text }),
        Part::FunctionCall(call) => json!({
            "functionCall": {
                "name": call.name,
                "args": call.args,
            }
        }),
        Part::FunctionResponse(response) => {
            // `response` must be a JSON object on the wire.
            let payload = if response.response.is_object() {
                response.response.clone()
            } else {
                json!({ "result": response.response })
            };
            json!({
                "functionResponse": {
                    "name": response.name,
                    "response": payload,
                }
            })
        }
    }
}

fn build_request_body(request: &LlmRequest) -> Value {
    let contents: Vec<Value> = request
        .contents
        .iter()
        .filter(|content| !content.is_empty())
        .map(|content| {
            json!({
                "role": content.role.as_str(),
                "parts": content.parts.iter().map(part_to_wire).collect::<Vec<_>>(),
            })
        })
        .collect();

    let mut body = serde_json::Map::new();
    body.insert("contents".into(), json!(contents));

    if let Some(instruction) = &request.system_instruction
        && !instruction.trim().is_empty()
    {
        body.insert(
            "system_instruction".into(),
            json!({ "parts": [{ "text": instruction }] }),
        );
    }

    if !request.tools.is_empty() {
        body.insert(
            "tools".into(),
            json!([{ "functionDeclarations": function_declarations(&request.tools) }]),
        );
    }

    Value::Object(body)
}

fn function_declarations(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            let mut parameters = t.parameters.clone();
            remove_additional_properties(&mut parameters);
            json!({
                "name": t.name,
                "description": t.description,
                "parameters": parameters
            })
        })
        .collect()
}

fn parse_response(response: wire::Response) -> Result<LlmResponse, ModelError> {
    if let Some(error) = response.error {
        return Err(ModelError::Api(error.message_or_default().to_string()));
    }

    let usage = response
        .usage_metadata
        .map(|u| Usage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        })
        .unwrap_or_default();

    let Some(candidate) = response.candidates.and_then(|c| c.into_iter().next()) else {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::Blocked(format!("prompt blocked: {reason}")));
        }
        return Err(ModelError::InvalidResponse(
            "response contained no candidates".to_string(),
        ));
    };

    let mut parts = Vec::new();
    for part in candidate
        .content
        .and_then(|content| content.parts)
        .unwrap_or_default()
    {
        if part.thought {
            continue;
        }
        if let Some(text) = part.text {
            parts.push(Part::Text { text });
        }
        if let Some(call) = part.function_call {
            let name = call.name.unwrap_or_default();
            if name.is_empty() {
                tracing::warn!("Gemini function call with empty name, skipping");
                continue;
            }
            parts.push(Part::FunctionCall(FunctionCall {
                id: call
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
                name,
                args: call.args.unwrap_or_else(|| json!({})),
            }));
        }
    }

    if parts.is_empty()
        && let Some(reason) = candidate.finish_reason.as_deref()
        && let Some(message) = FinishReason::parse(reason).error_message()
    {
        return Err(ModelError::Blocked(message.to_string()));
    }

    Ok(LlmResponse {
        content: Content::new(Role::Model, parts),
        usage,
        finish_reason: candidate.finish_reason,
    })
}

/// Known Gemini finish reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Recitation,
    Blocklist,
    ProhibitedContent,
    Spii,
    MalformedFunctionCall,
    Other,
    Unknown,
}

impl FinishReason {
    fn parse(s: &str) -> Self {
        match s {
            "STOP" => Self::Stop,
            "MAX_TOKENS" => Self::MaxTokens,
            "SAFETY" => Self::Safety,
            "RECITATION" => Self::Recitation,
            "BLOCKLIST" => Self::Blocklist,
            "PROHIBITED_CONTENT" => Self::ProhibitedContent,
            "SPII" => Self::Spii,
            "MALFORMED_FUNCTION_CALL" => Self::MalformedFunctionCall,
            "OTHER" => Self::Other,
            _ => Self::Unknown,
        }
    }

    fn error_message(self) -> Option<&'static str> {
        match self {
            Self::Stop | Self::MaxTokens | Self::Unknown => None,
            Self::Safety => Some("Content filtered by safety settings"),
            Self::Recitation => Some("Response blocked: recitation"),
            Self::Blocklist => Some("Content blocked by blocklist"),
            Self::ProhibitedContent => Some("Prohibited content detected"),
            Self::Spii => Some("Sensitive personal information detected"),
            Self::MalformedFunctionCall => Some("Model produced a malformed function call"),
            Self::Other => Some("Generation stopped for an unspecified reason"),
        }
    }
}

mod wire {
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct UsageMetadata {
        #[serde(default)]
        pub prompt_token_count: u32,
        #[serde(default)]
        pub candidates_token_count: u32,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Response {
        pub candidates: Option<Vec<Candidate>>,
        pub error: Option<ErrorInfo>,
        pub usage_metadata: Option<UsageMetadata>,
        pub prompt_feedback: Option<PromptFeedback>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PromptFeedback {
        pub block_reason: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Candidate {
        pub content: Option<Content>,
        pub finish_reason: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Content {
        pub parts: Option<Vec<Part>>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Part {
        pub text: Option<String>,
        #[serde(default)]
        pub thought: bool,
        pub function_call: Option<FunctionCall>,
    }

    #[derive(Debug, Deserialize)]
    pub struct FunctionCall {
        pub id: Option<String>,
        pub name: Option<String>,
        pub args: Option<serde_json::Value>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorInfo {
        pub message: Option<String>,
    }

    impl ErrorInfo {
        pub fn message_or_default(&self) -> &str {
            self.message.as_deref().unwrap_or("Unknown error")
        }
    }
}
