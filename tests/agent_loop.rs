mod common;

use serde_json::json;

use common::{agent, tool_call, ScriptedLlm};
use quickstart_agent::api::types::TaskStatus;
use quickstart_agent::llm::{ChatResponse, LlmError, Role};

#[tokio::test]
async fn edits_a_file_through_tools() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "colour: red\n").unwrap();

    let llm = ScriptedLlm::new(vec![
        Ok(ChatResponse::with_tool_calls(
            Some("Let me look first.".into()),
            vec![tool_call("r1", "read_file", json!({"path": "notes.txt"}))],
        )),
        Ok(ChatResponse::with_tool_calls(
            None,
            vec![tool_call(
                "e1",
                "edit_file",
                json!({"path": "notes.txt", "old_str": "red", "new_str": "blue"}),
            )],
        )),
        Ok(ChatResponse::text("Changed the colour to blue.")),
    ]);
    let agent = agent(llm.clone(), dir.path(), 10);

    let outcome = agent.run_task("make it blue").await.unwrap();

    assert_eq!(outcome.status, TaskStatus::Completed);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "colour: blue\n"
    );

    // Second request ends with the read result.
    let requests = llm.requests.lock().unwrap();
    let read_result = requests[1].last().unwrap();
    assert_eq!(read_result.role, Role::Tool);
    assert!(read_result.content.as_deref().unwrap().contains("colour: red"));
}

#[tokio::test]
async fn tool_schemas_are_sent_every_call() {
    let dir = tempfile::tempdir().unwrap();
    let llm = ScriptedLlm::new(vec![Ok(ChatResponse::text("hi"))]);
    agent(llm.clone(), dir.path(), 3).run_task("hello").await.unwrap();

    let names = llm.tool_names.lock().unwrap();
    assert!(names.contains(&"think".to_string()));
    assert!(names.contains(&"chart".to_string()));
}

#[tokio::test]
async fn failed_command_is_reported_and_loop_continues() {
    let dir = tempfile::tempdir().unwrap();
    let llm = ScriptedLlm::new(vec![
        Ok(ChatResponse::with_tool_calls(
            None,
            vec![tool_call("w1", "write_file", json!({"path": "../escape.txt", "content": "x"}))],
        )),
        Ok(ChatResponse::text("Could not write outside the workspace.")),
    ]);
    let agent = agent(llm.clone(), dir.path(), 5);
    let mut conversation = agent.new_conversation();

    let outcome = agent
        .continue_conversation(&mut conversation, "write a file")
        .await
        .unwrap();
    assert_eq!(outcome.status, TaskStatus::Completed);

    let result = conversation
        .turns()
        .find(|t| t.role == Role::Tool)
        .unwrap();
    assert!(result.is_error);
    assert!(result.content.as_deref().unwrap().contains("outside the workspace"));
    assert_eq!(conversation.tool_call_count(), conversation.tool_result_count());
}

#[tokio::test]
async fn loop_is_bounded_when_model_never_stops() {
    let dir = tempfile::tempdir().unwrap();
    let script = (0..20)
        .map(|i| {
            Ok(ChatResponse::with_tool_calls(
                None,
                vec![tool_call(&format!("c{}", i), "list_dir", json!({"path": "."}))],
            ))
        })
        .collect();
    let llm = ScriptedLlm::new(script);

    let outcome = agent(llm.clone(), dir.path(), 4).run_task("loop").await.unwrap();

    assert_eq!(outcome.status, TaskStatus::MaxIterations);
    assert_eq!(llm.request_count(), 4);
    assert_eq!(outcome.response, "Max iterations (4) reached");
}

#[tokio::test]
async fn rate_limit_surfaces_to_caller() {
    let dir = tempfile::tempdir().unwrap();
    let llm = ScriptedLlm::new(vec![Err(LlmError::RateLimited {
        retry_after: Some(30),
    })]);

    let err = agent(llm.clone(), dir.path(), 5).run_task("hi").await.unwrap_err();

    assert!(err.to_string().contains("30"));
    assert_eq!(llm.request_count(), 1, "errors are not retried");
}

#[tokio::test]
async fn chart_spec_round_trips_to_model() {
    let dir = tempfile::tempdir().unwrap();
    let llm = ScriptedLlm::new(vec![
        Ok(ChatResponse::with_tool_calls(
            None,
            vec![tool_call(
                "ch1",
                "chart",
                json!({
                    "chart_type": "pie",
                    "x_key": "lang",
                    "y_keys": ["files"],
                    "data": [{"lang": "rust", "files": 12}, {"lang": "toml", "files": 1}]
                }),
            )],
        )),
        Ok(ChatResponse::text("Here is the chart.")),
    ]);
    let agent = agent(llm.clone(), dir.path(), 5);
    let mut conversation = agent.new_conversation();
    agent
        .continue_conversation(&mut conversation, "chart it")
        .await
        .unwrap();

    let result = conversation.turns().find(|t| t.role == Role::Tool).unwrap();
    assert!(!result.is_error);
    let spec: serde_json::Value =
        serde_json::from_str(result.content.as_deref().unwrap()).unwrap();
    assert_eq!(spec["chart_type"], "pie");
    assert_eq!(spec["data"][0]["files"], 12);
}
