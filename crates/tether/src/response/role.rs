//! Message kind → transport role.

use crate::MessageRole;
use crate::error::FormatError;
use crate::message::MessageKind;

/// Maps message kinds to canonical roles.
///
/// `human` → user, `ai` → assistant, `system` → system, `tool` → tool (or
/// the configured tool role). Anything else is [`FormatError::UnknownRoleKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleMapper {
    tool_role: MessageRole,
}

impl Default for RoleMapper {
    fn default() -> Self {
        Self {
            tool_role: MessageRole::Tool,
        }
    }
}

impl RoleMapper {
    /// Role emitted for tool results (builder pattern).
    ///
    /// Some consumers only understand user/assistant/system and want tool
    /// output folded into one of those.
    pub fn with_tool_role(mut self, role: MessageRole) -> Self {
        self.tool_role = role;
        self
    }

    pub fn map(&self, kind: &MessageKind) -> Result<MessageRole, FormatError> {
        match kind {
            MessageKind::Human => Ok(MessageRole::User),
            MessageKind::Ai => Ok(MessageRole::Assistant),
            MessageKind::System => Ok(MessageRole::System),
            MessageKind::Tool => Ok(self.tool_role),
            MessageKind::Other(tag) => Err(FormatError::UnknownRoleKind(tag.clone())),
        }
    }
}
