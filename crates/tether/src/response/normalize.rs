//! Ordered messages → ordered `{role, content}` records.

use super::role::RoleMapper;
use crate::MessageRole;
use crate::error::FormatError;
use crate::message::AgentMessage;
use serde::{Deserialize, Serialize};

/// One entry of the canonical `messages` array.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OutputMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Normalize `messages` in order.
///
/// Output index `i` corresponds to input index `i`. Content is copied
/// verbatim, empty strings included. The first unmappable message fails the
/// whole call; no partial output is returned.
pub fn normalize_messages(
    messages: &[AgentMessage],
    mapper: &RoleMapper,
) -> Result<Vec<OutputMessage>, FormatError> {
    messages
        .iter()
        .map(|m| {
            Ok(OutputMessage {
                role: mapper.map(&m.kind)?,
                content: m.content.clone(),
            })
        })
        .collect()
}
