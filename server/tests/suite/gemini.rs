//! Agent runs against a fake Gemini endpoint.

use adk_mcp_server::{ServerState, Settings};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{Client, start_state};

fn gemini_client(api_key: Option<&str>, api_base: String) -> Client {
    start_state(ServerState::with_gemini(Settings {
        google_api_key: api_key.map(str::to_string),
        google_api_base: api_base,
        ..Settings::default()
    }))
}

async fn create_greeter(client: &mut Client) {
    let (_, is_error) = client
        .call(
            "create_adk_agent",
            json!({
                "name": "greeter",
                "instruction": "Greet the user",
                "model": "gemini-1.5-flash"
            }),
        )
        .await;
    assert!(!is_error);
}

#[tokio::test]
async fn run_reaches_gemini() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "Say hi"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hi there!"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = gemini_client(Some("test-key"), server.uri());
    create_greeter(&mut client).await;

    let (body, is_error) = client
        .call(
            "run_adk_agent",
            json!({"agent_name": "greeter", "message": "Say hi"}),
        )
        .await;
    assert!(!is_error, "{body}");
    assert_eq!(body["agent_response"], "Hi there!");
    assert_eq!(body["events_count"], 1);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_key_fails_the_run() {
    let mut client = gemini_client(None, "http://127.0.0.1:9".into());
    create_greeter(&mut client).await;

    let (body, is_error) = client
        .call(
            "run_adk_agent",
            json!({"agent_name": "greeter", "message": "Say hi"}),
        )
        .await;
    assert!(is_error);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Failed to run agent: "), "{message}");
    assert!(message.contains("GOOGLE_API_KEY"), "{message}");

    client.shutdown().await.unwrap();
}

fn answer(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    }))
}

#[tokio::test]
async fn parallel_branches_do_not_see_each_other() {
    let server = MockServer::start().await;
    for (instruction, reply) in [("Answer as alpha", "ALPHA-OUT"), ("Answer as beta", "BETA-OUT")] {
        Mock::given(method("POST"))
            .and(body_string_contains(instruction))
            .respond_with(answer(reply))
            .expect(2)
            .mount(&server)
            .await;
    }

    let mut client = gemini_client(Some("test-key"), server.uri());
    for (name, instruction) in [("alpha", "Answer as alpha"), ("beta", "Answer as beta")] {
        client
            .call("create_adk_agent", json!({"name": name, "instruction": instruction}))
            .await;
    }
    let (created, is_error) = client
        .call(
            "create_multi_agent_system",
            json!({
                "coordinator_name": "team",
                "coordinator_instruction": "unused",
                "sub_agents": ["alpha", "beta"],
                "mode": "parallel"
            }),
        )
        .await;
    assert!(!is_error, "{created}");

    for message in ["first", "second"] {
        let (run, is_error) = client
            .call(
                "run_adk_agent",
                json!({"agent_name": "team", "message": message}),
            )
            .await;
        assert!(!is_error, "{run}");
        assert_eq!(run["events_count"], 2);
        let response = run["agent_response"].as_str().unwrap();
        assert!(response.contains("ALPHA-OUT") && response.contains("BETA-OUT"), "{response}");
    }

    // On the second run each branch sees its own earlier answer and never
    // its sibling's.
    let requests = server.received_requests().await.unwrap();
    let bodies: Vec<String> = requests
        .iter()
        .map(|request| String::from_utf8_lossy(&request.body).into_owned())
        .filter(|body| body.contains("\"second\""))
        .collect();
    assert_eq!(bodies.len(), 2);
    for body in &bodies {
        let (own, sibling) = if body.contains("Answer as alpha") {
            ("ALPHA-OUT", "BETA-OUT")
        } else {
            ("BETA-OUT", "ALPHA-OUT")
        };
        assert!(body.contains(own), "{body}");
        assert!(!body.contains(sibling), "{body}");
    }

    client.shutdown().await.unwrap();
}
