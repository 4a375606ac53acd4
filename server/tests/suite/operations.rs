//! Operation envelopes with a scripted model.

use std::sync::Arc;
use std::time::Duration;

use adk_mcp_types::Content;
use serde_json::json;

use crate::common::{ScriptedModel, function_call, start};

#[tokio::test]
async fn create_run_and_inspect_agent() {
    let model = Arc::new(ScriptedModel::new(vec![Content::model_text(
        "Rust is a systems programming language.",
    )]));
    let mut client = start(model.clone());
    client.initialize().await;

    let (created, is_error) = client
        .call(
            "create_adk_agent",
            json!({
                "name": "explainer",
                "instruction": "Explain things in one sentence.",
                "description": "Explains concepts",
                "tools": ["load_web_page", "made_up"]
            }),
        )
        .await;
    assert!(!is_error);
    assert_eq!(
        created,
        json!({
            "status": "success",
            "message": "Successfully created agent 'explainer'",
            "agent": {
                "name": "explainer",
                "model": "gemini-2.0-flash",
                "description": "Explains concepts",
                "tools_count": 1
            }
        })
    );

    let (run, is_error) = client
        .call(
            "run_adk_agent",
            json!({"agent_name": "explainer", "message": "What is Rust?"}),
        )
        .await;
    assert!(!is_error);
    assert_eq!(
        run,
        json!({
            "status": "success",
            "agent_name": "explainer",
            "user_message": "What is Rust?",
            "agent_response": "Rust is a systems programming language.",
            "session_id": "default",
            "events_count": 1
        })
    );

    let request = &model.requests()[0];
    let system = request.system_instruction.as_deref().unwrap();
    assert!(system.starts_with("Explain things in one sentence."), "{system}");
    assert!(system.contains("\"explainer\""), "{system}");
    assert_eq!(request.tools.len(), 1);
    assert_eq!(request.tools[0].name, "load_web_page");

    let (listed, _) = client.call("list_adk_agents", json!({})).await;
    assert_eq!(listed["total_count"], 1);
    assert_eq!(listed["agents"][0]["tools"], json!(["load_web_page", "made_up"]));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn not_found_envelopes_are_errors() {
    let mut client = start(Arc::new(ScriptedModel::default()));
    for (operation, args) in [
        ("get_adk_agent_info", json!({"agent_name": "ghost"})),
        ("run_adk_agent", json!({"agent_name": "ghost", "message": "hi"})),
        (
            "evaluate_adk_agent",
            json!({"agent_name": "ghost", "test_cases": []}),
        ),
        (
            "add_mcp_tools_to_agent",
            json!({"agent_name": "ghost", "mcp_server_command": "npx", "mcp_server_args": []}),
        ),
    ] {
        let (body, is_error) = client.call(operation, args).await;
        assert!(is_error, "{operation}");
        assert_eq!(body, json!({"error": "Agent 'ghost' not found"}), "{operation}");
    }
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn coordinator_transfers_to_sub_agent() {
    let model = Arc::new(ScriptedModel::new(vec![
        function_call("t1", "transfer_to_agent", json!({"agent_name": "billing"})),
        Content::model_text("Your invoice is attached."),
    ]));
    let mut client = start(model.clone());

    for (name, description) in [("billing", "Handles invoices"), ("support", "Fixes bugs")] {
        client
            .call(
                "create_adk_agent",
                json!({"name": name, "instruction": "Help", "description": description}),
            )
            .await;
    }
    let (system, is_error) = client
        .call(
            "create_multi_agent_system",
            json!({
                "coordinator_name": "desk",
                "coordinator_instruction": "Route the request.",
                "sub_agents": ["billing", "support"]
            }),
        )
        .await;
    assert!(!is_error);
    assert_eq!(
        system["message"],
        "Successfully created multi-agent system 'desk'"
    );
    assert_eq!(system["coordinator"]["sub_agent_count"], 2);

    let (run, _) = client
        .call(
            "run_adk_agent",
            json!({"agent_name": "desk", "message": "Where is my invoice?"}),
        )
        .await;
    assert_eq!(run["agent_response"], "Your invoice is attached.");
    // Transfer call, transfer response, billing's answer.
    assert_eq!(run["events_count"], 3);

    let requests = model.requests();
    assert!(
        requests[0]
            .tools
            .iter()
            .any(|tool| tool.name == "transfer_to_agent")
    );
    let coordinator_prompt = requests[0].system_instruction.as_deref().unwrap();
    assert!(coordinator_prompt.contains("Agent name: billing"));
    assert!(coordinator_prompt.contains("Agent description: Fixes bugs"));

    let (listed, _) = client.call("list_adk_agents", json!({})).await;
    assert_eq!(listed["agents"][2]["name"], "desk");
    assert_eq!(
        listed["agents"][2]["description"],
        "Multi-agent coordinator with 2 sub-agents"
    );
    assert_eq!(listed["agents"][2]["tools"], json!([]));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn sequential_system_runs_sub_agents_in_order() {
    let model = Arc::new(ScriptedModel::new(vec![
        Content::model_text("draft;"),
        Content::model_text("review"),
    ]));
    let mut client = start(model);
    for name in ["drafter", "reviewer"] {
        client
            .call("create_adk_agent", json!({"name": name, "instruction": "Work"}))
            .await;
    }
    let (created, _) = client
        .call(
            "create_multi_agent_system",
            json!({
                "coordinator_name": "pipeline",
                "coordinator_instruction": "unused",
                "sub_agents": ["drafter", "reviewer"],
                "mode": "sequential"
            }),
        )
        .await;
    assert_eq!(created["coordinator"]["mode"], "sequential");

    let (run, _) = client
        .call(
            "run_adk_agent",
            json!({"agent_name": "pipeline", "message": "Write a haiku"}),
        )
        .await;
    assert_eq!(run["agent_response"], "draft;review");
    assert_eq!(run["events_count"], 2);

    let (info, _) = client
        .call("get_adk_agent_info", json!({"agent_name": "pipeline"}))
        .await;
    assert_eq!(info["agent"]["type"], "sequential_agent");
    assert_eq!(info["agent"]["sub_agents"], json!(["drafter", "reviewer"]));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn loop_system_stops_on_exit_loop() {
    let model = Arc::new(ScriptedModel::new(vec![
        Content::model_text("attempt 1"),
        function_call("x1", "exit_loop", json!({})),
    ]));
    let mut client = start(model.clone());
    client
        .call(
            "create_adk_agent",
            json!({"name": "worker", "instruction": "Try", "tools": ["exit_loop"]}),
        )
        .await;
    client
        .call(
            "create_multi_agent_system",
            json!({
                "coordinator_name": "retry",
                "coordinator_instruction": "unused",
                "sub_agents": ["worker"],
                "mode": "loop",
                "max_iterations": 5
            }),
        )
        .await;

    let (run, is_error) = client
        .call(
            "run_adk_agent",
            json!({"agent_name": "retry", "message": "go"}),
        )
        .await;
    assert!(!is_error);
    assert_eq!(run["agent_response"], "attempt 1");
    assert_eq!(model.requests().len(), 2);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn evaluation_counts_passes() {
    let model = Arc::new(ScriptedModel::new(vec![
        Content::model_text("4"),
        Content::model_text("The answer is five."),
    ]));
    let mut client = start(model);
    client
        .call("create_adk_agent", json!({"name": "calc", "instruction": "Add"}))
        .await;

    let (report, is_error) = client
        .call(
            "evaluate_adk_agent",
            json!({
                "agent_name": "calc",
                "test_cases": [
                    {"input": "2+2", "expected_output": "4"},
                    {"input": "2+2", "expected_output": "FOUR"}
                ]
            }),
        )
        .await;
    assert!(!is_error);
    assert_eq!(report["agent_name"], "calc");
    assert_eq!(report["total_tests"], 2);
    assert_eq!(report["passed_tests"], 1);
    assert_eq!(report["success_rate"], 0.5);
    assert_eq!(report["results"][1]["actual"], "The answer is five.");
    assert_eq!(report["results"][1]["test_case"], 2);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_sub_agents_are_named() {
    let mut client = start(Arc::new(ScriptedModel::default()));
    client
        .call("create_adk_agent", json!({"name": "a", "instruction": "x"}))
        .await;
    let (body, is_error) = client
        .call(
            "create_multi_agent_system",
            json!({
                "coordinator_name": "boss",
                "coordinator_instruction": "x",
                "sub_agents": ["a", "b"]
            }),
        )
        .await;
    assert!(is_error);
    assert_eq!(
        body,
        json!({"error": "Missing sub-agents: ['b']. Create them first."})
    );
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn documentation_and_tool_listing() {
    let mut client = start(Arc::new(ScriptedModel::default()));

    let (docs, _) = client
        .call("get_adk_documentation", json!({"topic": "DEPLOYMENT"}))
        .await;
    assert_eq!(docs["status"], "success");
    assert_eq!(docs["topic"], "DEPLOYMENT");
    assert_eq!(docs["documentation"]["options"][1], "Google Cloud Run");

    let (tools, _) = client.call("list_available_tools", json!({})).await;
    assert_eq!(tools["total_count"], 4);
    assert_eq!(tools["available_tools"]["load_web_page"]["type"], "function_tool");

    let (version, _) = client.call("get_server_version", json!({})).await;
    assert_eq!(
        version["version_info"],
        json!({"major": 1, "minor": 0, "patch": 0, "prerelease": null, "build": null})
    );

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn slow_runs_do_not_block_other_requests() {
    struct SlowModel;

    impl adk_mcp_providers::ModelBackend for SlowModel {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn generate<'a>(
            &'a self,
            _request: &'a adk_mcp_providers::LlmRequest,
        ) -> adk_mcp_providers::ModelFut<'a> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(adk_mcp_providers::LlmResponse {
                    content: Content::model_text("finally"),
                    usage: adk_mcp_types::Usage::default(),
                    finish_reason: None,
                })
            })
        }
    }

    let mut client = start(Arc::new(SlowModel));
    client
        .call("create_adk_agent", json!({"name": "sloth", "instruction": "x"}))
        .await;

    client
        .send(&json!({
            "jsonrpc": "2.0",
            "id": "slow",
            "method": "tools/call",
            "params": {"name": "run_adk_agent", "arguments": {"agent_name": "sloth", "message": "hi"}}
        }))
        .await;
    client
        .send(&json!({"jsonrpc": "2.0", "id": "fast", "method": "ping"}))
        .await;

    let first = client.recv().await;
    let second = client.recv().await;
    assert_eq!(first["id"], "fast");
    assert_eq!(second["id"], "slow");

    client.shutdown().await.unwrap();
}

/// Minimal MCP server over stdio: answers the handshake, lists three tools
/// and returns fixed text for every call.
#[cfg(unix)]
const FAKE_FS_SERVER: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/^{"jsonrpc":"2.0","id":\([0-9]*\),.*/\1/p')
  [ -n "$id" ] || continue
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"fake-fs","version":"0.1.0"}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"read_file","description":"Read a file","inputSchema":{"type":"object","properties":{"path":{"type":"string"}},"required":["path"]}},{"name":"list_dir","description":"List a directory","inputSchema":{"type":"object"}},{"name":"delete_file","description":"Delete a file","inputSchema":{"type":"object"}}]}}\n' "$id" ;;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"hello from disk"}]}}\n' "$id" ;;
    *)
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32601,"message":"Method not found"}}\n' "$id" ;;
  esac
done
"#;

#[cfg(unix)]
#[tokio::test]
async fn mcp_tools_are_attached_and_callable() {
    let model = Arc::new(ScriptedModel::new(vec![
        function_call("r1", "read_file", json!({"path": "/notes.txt"})),
        Content::model_text("The file says hello."),
    ]));
    let mut client = start(model.clone());
    client
        .call(
            "create_adk_agent",
            json!({"name": "reader", "instruction": "Read files", "tools": ["exit_loop"]}),
        )
        .await;

    let (added, is_error) = client
        .call(
            "add_mcp_tools_to_agent",
            json!({
                "agent_name": "reader",
                "mcp_server_command": "sh",
                "mcp_server_args": ["-c", FAKE_FS_SERVER],
                "tool_filter": ["read_file", "list_dir"]
            }),
        )
        .await;
    assert!(!is_error, "{added}");
    assert_eq!(
        added,
        json!({
            "status": "success",
            "message": "Successfully added MCP tools to agent 'reader'",
            "mcp_server": {
                "command": "sh",
                "args": ["-c", FAKE_FS_SERVER],
                "filter": ["read_file", "list_dir"]
            }
        })
    );

    let (run, is_error) = client
        .call(
            "run_adk_agent",
            json!({"agent_name": "reader", "message": "What is in /notes.txt?"}),
        )
        .await;
    assert!(!is_error, "{run}");
    assert_eq!(run["agent_response"], "The file says hello.");

    let requests = model.requests();
    let mut names: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    names.sort_unstable();
    // The built-in tool plus the two filtered remote tools.
    assert_eq!(names, vec!["exit_loop", "list_dir", "read_file"]);
    let history = serde_json::to_string(&requests[1].contents).unwrap();
    assert!(history.contains("hello from disk"), "{history}");

    let (info, _) = client
        .call("get_adk_agent_info", json!({"agent_name": "reader"}))
        .await;
    assert_eq!(info["agent"]["mcp_tools"]["command"], "sh");

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn empty_workflow_loops_are_refused() {
    let mut client = start(Arc::new(ScriptedModel::default()));

    let (body, is_error) = client
        .call(
            "create_multi_agent_system",
            json!({
                "coordinator_name": "empty",
                "coordinator_instruction": "unused",
                "sub_agents": [],
                "mode": "sequential"
            }),
        )
        .await;
    assert!(is_error);
    assert_eq!(
        body,
        json!({"error": "A sequential system needs at least one sub-agent"})
    );

    client
        .call("create_adk_agent", json!({"name": "step", "instruction": "x"}))
        .await;
    let (text, is_error) = client
        .call_text(
            "create_multi_agent_system",
            json!({
                "coordinator_name": "spin",
                "coordinator_instruction": "unused",
                "sub_agents": ["step"],
                "mode": "loop",
                "max_iterations": 9e18
            }),
        )
        .await;
    assert!(is_error);
    assert!(
        text.starts_with("Error executing create_multi_agent_system: Invalid arguments:"),
        "{text}"
    );

    let (listed, _) = client.call("list_adk_agents", json!({})).await;
    assert_eq!(listed["total_count"], 1);
    client.shutdown().await.unwrap();
}
