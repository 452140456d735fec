//! Invocation result → canonical output record.

use super::normalize::{OutputMessage, normalize_messages};
use super::role::RoleMapper;
use crate::agent::strategy::ValidationEvent;
use crate::error::{FormatError, HookFailure};
use crate::message::AgentMessage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Everything an agent run produced.
///
/// Only `messages` and `structured_response` reach the canonical record;
/// the rest is run metadata for logging and inspection. Deserializable so
/// transcripts saved to disk can be formatted offline.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct InvocationResult {
    pub messages: Vec<AgentMessage>,
    #[serde(default)]
    pub structured_response: Option<Map<String, Value>>,
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub rounds_used: u32,
    /// Validation checks in the order they ran.
    #[serde(default)]
    pub validations: Vec<ValidationEvent>,
    #[serde(default)]
    pub hook_failures: Vec<HookFailure>,
}

impl InvocationResult {
    pub fn new(messages: Vec<AgentMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_structured_response(mut self, payload: Map<String, Value>) -> Self {
        self.structured_response = Some(payload);
        self
    }

    /// Content of the last assistant message, if any.
    pub fn final_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.kind == crate::message::MessageKind::Ai && m.tool_calls.is_empty())
            .map(|m| m.content.as_str())
    }
}

/// The only artifact exposed to callers.
///
/// `structured_response` serializes as `null` when absent, never `{}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CanonicalOutputRecord {
    pub structured_response: Option<Map<String, Value>>,
    pub messages: Vec<OutputMessage>,
}

/// Format a finished run.
///
/// Performs no schema validation; the payload is copied through as-is.
pub fn format_response(
    result: InvocationResult,
    mapper: &RoleMapper,
) -> Result<CanonicalOutputRecord, FormatError> {
    let messages = normalize_messages(&result.messages, mapper)?;
    Ok(CanonicalOutputRecord {
        structured_response: result.structured_response,
        messages,
    })
}
