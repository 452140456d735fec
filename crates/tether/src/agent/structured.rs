//! One-shot structured calls in JSON mode.
//!
//! No tools and no agent loop: the prompt goes out once with a
//! `json_object` response format, and the reply is parsed and checked
//! against a [`StructuredSchema`]. JSON mode does not constrain field
//! names, so the prompt itself should name the keys it expects (most
//! providers also require the word "JSON" to appear in it).

use crate::agent::config::AgentConfig;
use crate::agent::strategy::ValidationPoint;
use crate::api::retry::retry_api_call;
use crate::error::Error;
use crate::schema::StructuredSchema;
use crate::{ChatModel, ChatRequest, Message, ResponseFormat};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Send `prompt` as a single user message in JSON mode and validate the
/// reply against `schema`.
///
/// A reply that is not a matching JSON object fails with
/// [`Error::Validation`]; there is no re-prompting.
pub async fn invoke_json_mode(
    model: &dyn ChatModel,
    config: &AgentConfig,
    schema: &StructuredSchema,
    prompt: &str,
) -> Result<Map<String, Value>, Error> {
    let request = ChatRequest {
        model: config.model.clone(),
        messages: vec![Message::user(prompt)],
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        tools: None,
        response_format: Some(ResponseFormat::json_object()),
        extra: config.extra_body.clone(),
    };
    info!(
        "JSON mode call: model={}, schema={}",
        config.model, schema.name
    );

    let request = &request;
    let completion = retry_api_call(&config.retry, move || model.chat(request)).await?;
    let content = completion.content.unwrap_or_default();
    debug!("JSON mode reply: {} chars", content.len());

    Ok(schema.parse_and_validate(&content, ValidationPoint::FinalResponse)?)
}
