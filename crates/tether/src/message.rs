//! Internal message representation.
//!
//! The agent records every turn as an [`AgentMessage`] tagged with a
//! [`MessageKind`]. Kinds outside the closed set can still be carried (they
//! arrive from transcripts on disk) and are rejected when the message is
//! mapped to a role.

use crate::error::FormatError;
use crate::response::role::RoleMapper;
use crate::{Message, MessageRole, ToolCall};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    Human,
    Ai,
    System,
    Tool,
    /// Unrecognized tag, kept verbatim so it can be reported.
    Other(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Human => "human",
            MessageKind::Ai => "ai",
            MessageKind::System => "system",
            MessageKind::Tool => "tool",
            MessageKind::Other(tag) => tag,
        }
    }
}

impl From<&str> for MessageKind {
    fn from(tag: &str) -> Self {
        match tag {
            "human" => MessageKind::Human,
            "ai" => MessageKind::Ai,
            "system" => MessageKind::System,
            "tool" => MessageKind::Tool,
            other => MessageKind::Other(other.to_string()),
        }
    }
}

impl From<String> for MessageKind {
    fn from(tag: String) -> Self {
        MessageKind::from(tag.as_str())
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of an agent conversation.
///
/// `content` is always present; assistant turns that only request tools
/// carry an empty string.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AgentMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// May be empty, never absent.
    pub content: String,
    /// Tool name, for tool results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl AgentMessage {
    pub fn new(kind: impl Into<MessageKind>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Human, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Ai, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageKind::System, content)
    }

    /// Assistant turn requesting tool calls.
    pub fn ai_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::new(MessageKind::Ai, content)
        }
    }

    /// Result of a tool call.
    pub fn tool(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            tool_call_id: Some(call_id.into()),
            ..Self::new(MessageKind::Tool, content)
        }
    }

    /// Convert to the wire message sent to the model.
    ///
    /// Uses the fixed protocol roles; fails on an unrecognized kind.
    pub fn to_wire(&self) -> Result<Message, FormatError> {
        let role = RoleMapper::default().map(&self.kind)?;
        let content = Some(self.content.clone());
        Ok(match role {
            MessageRole::Assistant if !self.tool_calls.is_empty() => Message {
                content: content.filter(|c| !c.is_empty()),
                ..Message::assistant_tool_calls(self.tool_calls.clone())
            },
            MessageRole::Tool => Message {
                role,
                content,
                tool_calls: None,
                tool_call_id: self.tool_call_id.clone(),
            },
            _ => Message {
                role,
                content,
                tool_calls: None,
                tool_call_id: None,
            },
        })
    }
}
