//! Running and evaluating agents.

use std::sync::Arc;

use adk_mcp_agents::runner::response_text;
use adk_mcp_agents::{EvaluationReport, Runner, TestCase, evaluate};
use adk_mcp_types::Content;
use serde::Deserialize;
use serde_json::{Value, json};

use super::agent_not_found;
use crate::operation::{Envelope, OpFut, Operation, parse_args};
use crate::state::ServerState;

fn default_session_id() -> String {
    "default".to_string()
}

fn default_user_id() -> String {
    "user".to_string()
}

#[derive(Debug, Deserialize)]
struct RunAgentArgs {
    agent_name: String,
    message: String,
    #[serde(default = "default_session_id")]
    session_id: String,
    #[serde(default = "default_user_id")]
    user_id: String,
}

pub struct RunAgent;

impl Operation for RunAgent {
    fn name(&self) -> &'static str {
        "run_adk_agent"
    }

    fn description(&self) -> &'static str {
        "Run an ADK agent with a user message and get the response"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_name": {
                    "type": "string",
                    "description": "Name of the agent to run"
                },
                "message": {
                    "type": "string",
                    "description": "User message to send to the agent"
                },
                "session_id": {
                    "type": "string",
                    "description": "Session ID to maintain conversation history (optional)",
                    "default": "default"
                },
                "user_id": {
                    "type": "string",
                    "description": "User ID for the session",
                    "default": "user"
                }
            },
            "required": ["agent_name", "message"]
        })
    }

    fn call<'a>(&'a self, state: &'a ServerState, args: Value) -> OpFut<'a> {
        Box::pin(async move {
            let args: RunAgentArgs = parse_args(args)?;
            let Some(entry) = state.agent(&args.agent_name).await else {
                return Ok(agent_not_found(&args.agent_name));
            };

            let key = match state
                .session_for(&args.agent_name, &args.session_id, &args.user_id)
                .await
            {
                Ok(key) => key,
                Err(e) => return Ok(Envelope::failure(format!("Failed to run agent: {e}"))),
            };

            let runner = Runner::new(&key.app_name, entry.agent, Arc::clone(state.sessions()))
                .with_run_config(state.run_config());
            let events = match runner
                .run(
                    &key.user_id,
                    &key.session_id,
                    Content::user_text(&args.message),
                )
                .await
            {
                Ok(events) => events,
                Err(e) => {
                    tracing::error!(agent = %args.agent_name, %e, "Error running agent");
                    return Ok(Envelope::failure(format!("Failed to run agent: {e}")));
                }
            };

            Ok(Envelope::Success(json!({
                "status": "success",
                "agent_name": args.agent_name,
                "user_message": args.message,
                "agent_response": response_text(&events),
                "session_id": args.session_id,
                "events_count": events.len(),
            })))
        })
    }
}

#[derive(Debug, Deserialize)]
struct EvaluateArgs {
    agent_name: String,
    test_cases: Vec<TestCase>,
}

pub struct EvaluateAgent;

impl Operation for EvaluateAgent {
    fn name(&self) -> &'static str {
        "evaluate_adk_agent"
    }

    fn description(&self) -> &'static str {
        "Evaluate an ADK agent using a test dataset"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_name": {
                    "type": "string",
                    "description": "Name of the agent to evaluate"
                },
                "test_cases": {
                    "type": "array",
                    "description": "Array of test cases with input and expected output",
                    "items": {
                        "type": "object",
                        "properties": {
                            "input": {"type": "string"},
                            "expected_output": {"type": "string"}
                        },
                        "required": ["input", "expected_output"]
                    }
                }
            },
            "required": ["agent_name", "test_cases"]
        })
    }

    fn call<'a>(&'a self, state: &'a ServerState, args: Value) -> OpFut<'a> {
        Box::pin(async move {
            let args: EvaluateArgs = parse_args(args)?;
            let Some(entry) = state.agent(&args.agent_name).await else {
                return Ok(agent_not_found(&args.agent_name));
            };

            let report = evaluate(
                entry.agent,
                Arc::clone(state.sessions()),
                &args.test_cases,
                state.run_config(),
            )
            .await;
            tracing::info!(
                agent = %args.agent_name,
                passed = report.passed_tests,
                total = report.total_tests,
                "Evaluation finished"
            );

            Ok(Envelope::Success(json!({
                "status": "success",
                "agent_name": args.agent_name,
                "total_tests": report.total_tests,
                "passed_tests": report.passed_tests,
                "success_rate": success_rate(&report),
                "results": report.results,
            })))
        })
    }
}

/// An empty evaluation reports an integer `0` rather than `0.0`.
fn success_rate(report: &EvaluationReport) -> Value {
    if report.total_tests == 0 {
        Value::from(0)
    } else {
        Value::from(report.success_rate)
    }
}
