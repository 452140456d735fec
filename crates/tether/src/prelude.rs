//! Convenience re-exports for common `tether` types.
//!
//! Meant to be glob-imported when building agents:
//!
//! ```ignore
//! use tether::prelude::*;
//! ```

pub use std::sync::Arc;

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{ChatClient, ChatModel, ChatRequest, Message, MessageRole, ToolDef, json_schema_for};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    Agent, AgentConfig, DEFAULT_SYSTEM_PROMPT, EnforcementDirective, FnHook, Hooks,
    InvocationOptions, LoggingHook, PreAgentHook, PreModelHook, RunState, ValidationPoint,
};

// ── Messages and output ─────────────────────────────────────────────
pub use crate::message::{AgentMessage, MessageKind};
pub use crate::response::{CanonicalOutputRecord, InvocationResult, RoleMapper, format_response};
pub use crate::schema::{FieldType, StructuredSchema};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{FnTool, GetWeather, Tool, ToolFuture, ToolSet, parse_tool_args};

// ── Configuration ───────────────────────────────────────────────────
pub use crate::settings::ProviderSettings;
