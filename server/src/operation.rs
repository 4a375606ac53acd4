//! Named operations exposed through `tools/call`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::state::ServerState;

pub type OpFut<'a> = Pin<Box<dyn Future<Output = Result<Envelope, OperationError>> + Send + 'a>>;

/// Result text of an operation.
///
/// Handlers report expected failures (unknown agent, failed run) as
/// [`Envelope::Failure`]; both variants are rendered as pretty-printed JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Success(Value),
    Failure(String),
}

impl Envelope {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    #[must_use]
    pub fn render(&self) -> String {
        let body = match self {
            Self::Success(value) => value.clone(),
            Self::Failure(message) => json!({ "error": message }),
        };
        serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Unknown tool: {0}")]
    Unknown(String),
    #[error("Duplicate operation registered: {0}")]
    Duplicate(String),
    #[error("{0}")]
    Internal(String),
}

pub trait Operation: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn schema(&self) -> Value;

    /// `args` has already been validated against [`Operation::schema`].
    fn call<'a>(&'a self, state: &'a ServerState, args: Value) -> OpFut<'a>;

    /// MCP `tools/list` entry.
    fn definition(&self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description(),
            "inputSchema": self.schema(),
        })
    }
}

pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, OperationError> {
    serde_json::from_value(args).map_err(|e| OperationError::InvalidArguments(e.to_string()))
}

pub fn validate_args(schema: &Value, args: &Value) -> Result<(), OperationError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| OperationError::Internal(format!("Invalid operation schema: {e}")))?;
    let messages: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(OperationError::InvalidArguments(messages.join("; ")))
    }
}

/// Flat name-to-operation table.
#[derive(Default)]
pub struct OperationRegistry {
    operations: HashMap<&'static str, Arc<dyn Operation>>,
    order: Vec<&'static str>,
}

impl OperationRegistry {
    pub fn register(&mut self, operation: Arc<dyn Operation>) -> Result<(), OperationError> {
        let name = operation.name();
        if self.operations.contains_key(name) {
            return Err(OperationError::Duplicate(name.to_string()));
        }
        self.order.push(name);
        self.operations.insert(name, operation);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    #[must_use]
    pub fn names(&self) -> &[&'static str] {
        &self.order
    }

    /// `tools/list` entries in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.operations.get(name))
            .map(|op| op.definition())
            .collect()
    }

    /// Validate `args` and run the named operation.
    ///
    /// A missing argument object is treated as `{}`.
    pub async fn dispatch(
        &self,
        state: &ServerState,
        name: &str,
        args: Option<Value>,
    ) -> Result<Envelope, OperationError> {
        let operation = self
            .operations
            .get(name)
            .ok_or_else(|| OperationError::Unknown(name.to_string()))?;
        let args = match args {
            None | Some(Value::Null) => json!({}),
            Some(args) => args,
        };
        validate_args(&operation.schema(), &args)?;
        operation.call(state, args).await
    }
}
