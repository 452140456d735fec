//! Weather agent scenarios driven through the public API with a scripted
//! model in place of the provider.

use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use tether::prelude::*;
use tether::{ChatCompletion, ChatFuture, ToolCall, error::ApiError};

struct ScriptedModel {
    replies: Mutex<VecDeque<ChatCompletion>>,
}

impl ScriptedModel {
    fn new(replies: Vec<ChatCompletion>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

impl ChatModel for ScriptedModel {
    fn chat<'a>(&'a self, _body: &'a ChatRequest) -> ChatFuture<'a> {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ApiError::Provider("no scripted reply left".into()));
        Box::pin(async move { reply })
    }
}

const SF_JSON: &str = r#"{"city":"SF","weather":"sunny","recommends":"visit the park"}"#;

fn weather_agent(final_answer: &str) -> Agent {
    let model = ScriptedModel::new(vec![
        ChatCompletion::tool_calls(vec![ToolCall::function(
            "call_0",
            "get_weather",
            r#"{"city":"SF"}"#,
        )]),
        ChatCompletion::text(final_answer),
    ]);
    Agent::new(
        model,
        ToolSet::new().with(GetWeather),
        AgentConfig::new("qwen-plus", DEFAULT_SYSTEM_PROMPT),
    )
}

fn question() -> Vec<AgentMessage> {
    vec![AgentMessage::human("get me the weather in SF")]
}

#[tokio::test]
async fn sf_weather_with_both_directives() {
    let schema = Arc::new(StructuredSchema::contact_info());
    let agent = weather_agent(SF_JSON).with_response_format(Arc::clone(&schema));
    let options = InvocationOptions::default().with_response_format(schema);

    let result = agent.invoke(question(), options).await.unwrap();

    let points: Vec<ValidationPoint> = result.validations.iter().map(|v| v.point).collect();
    assert_eq!(
        points,
        vec![ValidationPoint::ToolReturn, ValidationPoint::FinalResponse]
    );
    assert!(result.validations.iter().all(|v| v.passed));
    assert!(result.hook_failures.is_empty());

    let record = format_response(result, &RoleMapper::default()).unwrap();
    assert_eq!(
        serde_json::to_value(&record.structured_response).unwrap(),
        json!({"city": "SF", "weather": "sunny", "recommends": "visit the park"})
    );
    let roles: Vec<MessageRole> = record.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Assistant
        ]
    );
    assert_eq!(record.messages[2].content, SF_JSON);
    assert_eq!(record.messages[3].content, SF_JSON);
}

#[tokio::test]
async fn plain_answer_without_directives() {
    let agent = weather_agent("It is sunny in SF. Visit the park!");
    let record = agent
        .invoke_formatted(question(), InvocationOptions::default())
        .await
        .unwrap();

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["structured_response"], serde_json::Value::Null);
    assert_eq!(value["messages"][0]["role"], "user");
    assert_eq!(
        value["messages"][3]["content"],
        "It is sunny in SF. Visit the park!"
    );
}

#[tokio::test]
async fn saved_result_formats_from_disk() {
    let result = weather_agent("done")
        .invoke(question(), InvocationOptions::default())
        .await
        .unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    serde_json::to_writer(&mut file, &result).unwrap();

    let raw = std::fs::read_to_string(file.path()).unwrap();
    let loaded: InvocationResult = serde_json::from_str(&raw).unwrap();
    assert_eq!(loaded, result);

    let record = format_response(loaded, &RoleMapper::default()).unwrap();
    assert_eq!(record.messages.len(), 4);
    assert!(record.structured_response.is_none());
}

#[test]
fn hand_written_transcript_formats() {
    let raw = json!({
        "messages": [
            {"type": "human", "content": "hi"},
            {"type": "ai", "content": "hello"}
        ],
        "structured_response": {"city": "SF"}
    });
    let result: InvocationResult = serde_json::from_value(raw).unwrap();
    let record = format_response(result, &RoleMapper::default()).unwrap();
    assert_eq!(
        serde_json::to_string(&record).unwrap(),
        r#"{"structured_response":{"city":"SF"},"messages":[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]}"#
    );
}

#[test]
fn unknown_kind_is_an_error_record() {
    let raw = json!({"messages": [{"type": "unknown_tag", "content": "?"}]});
    let result: InvocationResult = serde_json::from_value(raw).unwrap();
    let err = tether::Error::from(format_response(result, &RoleMapper::default()).unwrap_err());
    let record = tether::ErrorRecord::from(&err);
    assert_eq!(record.error.kind, "unknown_role_kind");
    assert!(record.error.message.contains("unknown_tag"));
}
