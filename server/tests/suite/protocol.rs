//! JSON-RPC handling: handshake, listing, malformed frames.

use std::sync::Arc;

use serde_json::json;

use crate::common::{ScriptedModel, start};

#[tokio::test]
async fn handshake_reports_server_info() {
    let mut client = start(Arc::new(ScriptedModel::default()));
    let response = client.initialize().await;

    let result = &response["result"];
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "google-adk-mcp-server");
    assert_eq!(result["serverInfo"]["version"], adk_mcp_server::SERVER_VERSION);
    assert!(result["capabilities"]["tools"].is_object());

    let pong = client.request("ping", None).await;
    assert_eq!(pong["result"], json!({}));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn tools_list_declares_every_operation() {
    let mut client = start(Arc::new(ScriptedModel::default()));
    client.initialize().await;

    let response = client.request("tools/list", None).await;
    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 12);
    assert_eq!(tools[0]["name"], "create_adk_agent");
    assert_eq!(
        tools[0]["inputSchema"]["required"],
        json!(["name", "instruction"])
    );
    assert_eq!(tools[11]["name"], "get_server_version");
    for tool in tools {
        assert!(tool["description"].as_str().is_some_and(|d| !d.is_empty()));
    }

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_method_is_rejected() {
    let mut client = start(Arc::new(ScriptedModel::default()));
    let response = client.request("resources/list", None).await;
    assert_eq!(response["error"]["code"], -32601);
    assert!(response.get("result").is_none());
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_frames_get_error_responses() {
    let mut client = start(Arc::new(ScriptedModel::default()));

    client.send_raw(b"{not json\n").await;
    let response = client.recv().await;
    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(response["id"], json!(null));

    client.send_raw(b"{\"jsonrpc\": \"1.0\", \"id\": 9, \"method\": \"ping\"}\n").await;
    let response = client.recv().await;
    assert_eq!(response["error"]["code"], -32600);
    assert_eq!(response["id"], 9);

    // The connection survives both.
    let pong = client.request("ping", None).await;
    assert_eq!(pong["result"], json!({}));
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn tools_call_without_name_is_invalid_params() {
    let mut client = start(Arc::new(ScriptedModel::default()));
    let response = client
        .request("tools/call", Some(json!({"arguments": {}})))
        .await;
    assert_eq!(response["error"]["code"], -32602);
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_tool_is_an_error_result() {
    let mut client = start(Arc::new(ScriptedModel::default()));
    let (text, is_error) = client.call_text("make_coffee", json!({})).await;
    assert!(is_error);
    assert_eq!(text, "Error executing make_coffee: Unknown tool: make_coffee");
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn schema_violations_are_error_results() {
    let mut client = start(Arc::new(ScriptedModel::default()));
    let (text, is_error) = client
        .call_text("create_adk_agent", json!({"name": "missing_instruction"}))
        .await;
    assert!(is_error);
    assert!(
        text.starts_with("Error executing create_adk_agent: Invalid arguments:"),
        "{text}"
    );
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn notifications_get_no_reply() {
    let mut client = start(Arc::new(ScriptedModel::default()));
    client
        .send(&json!({"jsonrpc": "2.0", "method": "notifications/cancelled", "params": {}}))
        .await;
    // The next frame on the wire is the ping reply, not a notification ack.
    let pong = client.request("ping", None).await;
    assert_eq!(pong["result"], json!({}));
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn envelopes_are_pretty_printed() {
    let mut client = start(Arc::new(ScriptedModel::default()));
    let response = client
        .request(
            "tools/call",
            Some(json!({"name": "get_server_version", "arguments": {}})),
        )
        .await;
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("{\n  \""), "{text}");
    assert_eq!(response["result"]["content"][0]["type"], "text");
    assert_eq!(response["result"]["isError"], false);
    client.shutdown().await.unwrap();
}
