//! JSON-RPC 2.0 message types shared by the server and client halves.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// MCP revision advertised during `initialize`.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("JSON-RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(Self::PARSE_ERROR, format!("Parse error: {detail}"))
    }

    pub fn invalid_request(detail: impl std::fmt::Display) -> Self {
        Self::new(Self::INVALID_REQUEST, format!("Invalid request: {detail}"))
    }

    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self::new(Self::INVALID_PARAMS, format!("Invalid params: {detail}"))
    }

    pub fn internal(detail: impl std::fmt::Display) -> Self {
        Self::new(Self::INTERNAL_ERROR, format!("Internal error: {detail}"))
    }
}

#[derive(Debug, Serialize)]
pub struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Notification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
        }
    }
}

/// A reply to a request. Exactly one of `result` / `error` is present.
#[derive(Debug, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    /// Echoes the request id; `null` when the id could not be determined.
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Response {
        id: Value,
        result: Result<Value, RpcError>,
    },
}

/// Classify a JSON value as a request, notification or response.
///
/// Returns `None` for anything that is not a well-formed JSON-RPC 2.0
/// message: non-objects, a wrong `jsonrpc` tag, a non-string method, ids that
/// are neither strings nor numbers, or a response carrying neither `result`
/// nor `error`.
#[must_use]
pub fn parse_incoming(frame: &Value) -> Option<Incoming> {
    let obj = frame.as_object()?;
    if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return None;
    }

    let id = obj.get("id");
    if let Some(id) = id
        && !(id.is_string() || id.is_number() || id.is_null())
    {
        return None;
    }

    let params = obj.get("params").cloned();
    match (id, obj.get("method")) {
        (Some(id), Some(method)) => Some(Incoming::Request {
            id: id.clone(),
            method: method.as_str()?.to_string(),
            params,
        }),
        (None, Some(method)) => Some(Incoming::Notification {
            method: method.as_str()?.to_string(),
            params,
        }),
        (Some(id), None) => {
            let result = if let Some(error) = obj.get("error") {
                Err(serde_json::from_value(error.clone()).ok()?)
            } else {
                Ok(obj.get("result")?.clone())
            };
            Some(Incoming::Response {
                id: id.clone(),
                result,
            })
        }
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_classified() {
        let frame = json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"});
        assert_eq!(
            parse_incoming(&frame),
            Some(Incoming::Request {
                id: json!(7),
                method: "tools/list".into(),
                params: None,
            })
        );
    }

    #[test]
    fn test_string_id_request() {
        let frame = json!({"jsonrpc": "2.0", "id": "abc", "method": "ping", "params": {}});
        let Some(Incoming::Request { id, params, .. }) = parse_incoming(&frame) else {
            panic!("expected request");
        };
        assert_eq!(id, json!("abc"));
        assert_eq!(params, Some(json!({})));
    }

    #[test]
    fn test_notification_classified() {
        let frame = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert!(matches!(
            parse_incoming(&frame),
            Some(Incoming::Notification { method, params: None }) if method == "notifications/initialized"
        ));
    }

    #[test]
    fn test_success_and_error_responses() {
        let ok = json!({"jsonrpc": "2.0", "id": 1, "result": {"tools": []}});
        assert_eq!(
            parse_incoming(&ok),
            Some(Incoming::Response {
                id: json!(1),
                result: Ok(json!({"tools": []})),
            })
        );

        let err = json!({"jsonrpc": "2.0", "id": 2, "error": {"code": -32601, "message": "nope"}});
        let Some(Incoming::Response { result: Err(e), .. }) = parse_incoming(&err) else {
            panic!("expected error response");
        };
        assert_eq!(e.code, RpcError::METHOD_NOT_FOUND);
        assert_eq!(e.message, "nope");
    }

    #[test]
    fn test_malformed_frames_rejected() {
        for frame in [
            json!([1, 2, 3]),
            json!({"id": 1, "method": "ping"}),
            json!({"jsonrpc": "1.0", "id": 1, "method": "ping"}),
            json!({"jsonrpc": "2.0", "id": 1, "method": 42}),
            json!({"jsonrpc": "2.0", "id": {"x": 1}, "method": "ping"}),
            json!({"jsonrpc": "2.0", "id": 1}),
            json!({"jsonrpc": "2.0"}),
        ] {
            assert!(parse_incoming(&frame).is_none(), "accepted {frame}");
        }
    }

    #[test]
    fn test_response_serialization_omits_absent_half() {
        let ok = serde_json::to_value(Response::success(json!(1), json!({}))).unwrap();
        assert!(ok.get("error").is_none());
        assert_eq!(ok["jsonrpc"], "2.0");

        let err = serde_json::to_value(Response::failure(
            Value::Null,
            RpcError::parse_error("expected value"),
        ))
        .unwrap();
        assert!(err.get("result").is_none());
        assert!(err["id"].is_null());
        assert_eq!(err["error"]["code"], -32700);
    }

    #[test]
    fn test_request_serialization_without_params() {
        let json = serde_json::to_value(Request::new(1, "tools/list", None)).unwrap();
        assert_eq!(json["id"], 1);
        assert!(
            json.get("params").is_none(),
            "params must be omitted, not null"
        );
    }

    #[test]
    fn test_notification_has_no_id() {
        let json =
            serde_json::to_value(Notification::new("notifications/initialized", None)).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["method"], "notifications/initialized");
    }
}
