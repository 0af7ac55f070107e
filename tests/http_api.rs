mod common;

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{agent, tool_call, ScriptedLlm};
use quickstart_agent::agent::Agent;
use quickstart_agent::api;
use quickstart_agent::config::Config;
use quickstart_agent::llm::{ChatResponse, LlmError};
use quickstart_agent::tools::ToolRegistry;

async fn spawn_app(llm: Arc<ScriptedLlm>) -> (String, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let agent = agent(llm, dir.path(), 5);
    (serve(agent).await, dir)
}

async fn serve(agent: Agent) -> String {
    let app = api::router(Arc::new(agent));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn session_count(client: &reqwest::Client, base: &str) -> u64 {
    let health: Value = client
        .get(format!("{}/api/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    health["sessions"].as_u64().unwrap()
}

#[tokio::test]
async fn health_and_tools() {
    let (base, _dir) = spawn_app(ScriptedLlm::new(vec![])).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/api/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let tools: Vec<Value> = client
        .get(format!("{}/api/tools", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(tools.iter().any(|t| t["name"] == "grep_search"));
}

#[tokio::test]
async fn chat_session_lifecycle() {
    let llm = ScriptedLlm::new(vec![
        Ok(ChatResponse::with_tool_calls(
            None,
            vec![tool_call("t1", "think", json!({"thought": "greet"}))],
        )),
        Ok(ChatResponse::text("Hello!")),
        Ok(ChatResponse::text("Still here.")),
    ]);
    let (base, _dir) = spawn_app(llm.clone()).await;
    let client = reqwest::Client::new();

    let first: Value = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"message": "hi"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["response"], "Hello!");
    assert_eq!(first["status"], "completed");
    assert_eq!(first["iterations"], 2);
    let session_id = first["session_id"].as_str().unwrap().to_string();

    let second: Value = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"session_id": session_id, "message": "again"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["response"], "Still here.");
    // system, user, assistant+call, tool, assistant, user, assistant
    assert_eq!(second["turns"], 7);

    let transcript: Value = client
        .get(format!("{}/api/sessions/{}", base, session_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let turns = transcript["turns"].as_array().unwrap();
    assert_eq!(turns[3]["role"], "tool");
    assert_eq!(turns[3]["tool_call_id"], "t1");

    let deleted = client
        .delete(format!("{}/api/sessions/{}", base, session_id))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = client
        .get(format!("{}/api/sessions/{}", base, session_id))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_requests_are_rejected() {
    let (base, _dir) = spawn_app(ScriptedLlm::new(vec![])).await;
    let client = reqwest::Client::new();

    let empty = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"message": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let unknown = client
        .post(format!("{}/api/chat", base))
        .json(&json!({
            "session_id": "00000000-0000-0000-0000-000000000000",
            "message": "hi"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn model_failure_is_bad_gateway() {
    let llm = ScriptedLlm::new(vec![Err(LlmError::Network("connection refused".into()))]);
    let (base, _dir) = spawn_app(llm).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/tasks", base))
        .json(&json!({"task": "anything"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn one_shot_task_returns_log() {
    let llm = ScriptedLlm::new(vec![
        Ok(ChatResponse::with_tool_calls(
            None,
            vec![tool_call("l1", "list_dir", json!({}))],
        )),
        Ok(ChatResponse::text("The workspace is empty.")),
    ]);
    let (base, _dir) = spawn_app(llm).await;

    let body: Value = reqwest::Client::new()
        .post(format!("{}/api/tasks", base))
        .json(&json!({"task": "what is here?", "model": "other-model"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "completed");
    assert_eq!(body["response"], "The workspace is empty.");
    let kinds: Vec<&str> = body["log"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["entry_type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["tool_call", "tool_result", "response"]);
}

#[tokio::test]
async fn failed_first_turn_leaves_no_session() {
    let llm = ScriptedLlm::new(vec![
        Err(LlmError::Network("connection reset".into())),
        Ok(ChatResponse::text("Recovered.")),
    ]);
    let (base, _dir) = spawn_app(llm).await;
    let client = reqwest::Client::new();

    let failed = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"message": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(session_count(&client, &base).await, 0);

    let retry: Value = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"message": "hello"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(retry["response"], "Recovered.");
    // system, user, assistant
    assert_eq!(retry["turns"], 3);
    assert_eq!(session_count(&client, &base).await, 1);
}

#[tokio::test]
async fn oldest_session_is_evicted_at_capacity() {
    let llm = ScriptedLlm::new(vec![
        Ok(ChatResponse::text("first")),
        Ok(ChatResponse::text("second")),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::new("test-key".into(), "test-model".into(), dir.path().to_path_buf());
    config.max_sessions = 1;
    let base = serve(Agent::with_parts(config, llm, ToolRegistry::new())).await;
    let client = reqwest::Client::new();

    let mut ids = Vec::new();
    for message in ["a", "b"] {
        let reply: Value = client
            .post(format!("{}/api/chat", base))
            .json(&json!({ "message": message }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        ids.push(reply["session_id"].as_str().unwrap().to_string());
    }

    assert_eq!(session_count(&client, &base).await, 1);
    let evicted = client
        .get(format!("{}/api/sessions/{}", base, ids[0]))
        .send()
        .await
        .unwrap();
    assert_eq!(evicted.status(), StatusCode::NOT_FOUND);
    let kept = client
        .get(format!("{}/api/sessions/{}", base, ids[1]))
        .send()
        .await
        .unwrap();
    assert_eq!(kept.status(), StatusCode::OK);
}
