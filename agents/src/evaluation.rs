//! Substring-based agent evaluation.

use std::collections::BTreeMap;
use std::sync::Arc;

use adk_mcp_types::Content;
use serde::{Deserialize, Serialize};

use crate::runner::response_text;
use crate::{AgentError, InMemorySessionService, RunConfig, Runner, SharedAgent};

pub const EVALUATOR_USER: &str = "evaluator";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    /// 1-based position of the case.
    pub test_case: usize,
    pub input: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub success_rate: f64,
    pub results: Vec<CaseResult>,
}

/// Run every case in its own fresh session.
///
/// A case passes when the agent's concatenated response contains the
/// expected output, ignoring case. A failing run records `Error: ...` as the
/// actual output and does not stop the evaluation.
pub async fn evaluate(
    agent: SharedAgent,
    sessions: Arc<InMemorySessionService>,
    cases: &[TestCase],
    run_config: RunConfig,
) -> EvaluationReport {
    let app_name = format!("eval-{}", agent.name());
    let runner = Runner::new(&app_name, agent, Arc::clone(&sessions)).with_run_config(run_config);

    let mut results = Vec::with_capacity(cases.len());
    for (index, case) in cases.iter().enumerate() {
        let actual = match run_case(&runner, &sessions, &app_name, &case.input).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(app = %app_name, case = index + 1, %e, "Evaluation case failed");
                format!("Error: {e}")
            }
        };
        let passed = actual
            .to_lowercase()
            .contains(&case.expected_output.to_lowercase());
        results.push(CaseResult {
            test_case: index + 1,
            input: case.input.clone(),
            expected: case.expected_output.clone(),
            actual,
            passed,
        });
    }

    let passed_tests = results.iter().filter(|r| r.passed).count();
    let success_rate = if cases.is_empty() {
        0.0
    } else {
        passed_tests as f64 / cases.len() as f64
    };
    EvaluationReport {
        total_tests: cases.len(),
        passed_tests,
        success_rate,
        results,
    }
}

async fn run_case(
    runner: &Runner,
    sessions: &InMemorySessionService,
    app_name: &str,
    input: &str,
) -> Result<String, AgentError> {
    let session = sessions
        .create_session(app_name, EVALUATOR_USER, None, BTreeMap::new())
        .await?;
    let events = runner
        .run(EVALUATOR_USER, session.id(), Content::user_text(input))
        .await?;
    Ok(response_text(&events))
}
