//! Configuration types for the [`Agent`](super::harness::Agent).
//!
//! [`AgentConfig`] is fixed when the agent is built. [`InvocationOptions`]
//! carries what may change per call: the debug flag and the tool-level
//! enforcement directive.
//!
//! ```
//! use tether::agent::config::AgentConfig;
//!
//! let config = AgentConfig::new("qwen-plus", "You are a helpful assistant")
//!     .with_max_rounds(5)
//!     .with_temperature(0.2)
//!     .with_extra_body("enable_cache", true);
//! assert_eq!(config.extra_body["enable_cache"], true);
//! ```

use crate::MessageRole;
use crate::agent::strategy::EnforcementDirective;
use crate::api::retry::RetryConfig;
use crate::schema::StructuredSchema;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Default system prompt for the weather agent.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant";

/// Settings for an [`Agent`](super::harness::Agent).
///
/// Builder methods cover the common settings; the remaining knobs are
/// public fields for struct update syntax.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model identifier sent with every request.
    pub model: String,
    /// Prepended as a system message when the conversation has none.
    pub system_prompt: Option<String>,
    /// Maximum model calls per invocation.
    pub max_rounds: u32,
    /// Maximum tokens per model response.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Retry configuration for transient API failures.
    pub retry: RetryConfig,
    /// How many failed structured-output validations the agent re-prompts
    /// for before giving up.
    pub max_validation_retries: u32,
    /// Provider-specific fields merged into every request body.
    pub extra_body: Map<String, Value>,
    /// Role tool results take in the canonical output record.
    pub tool_role: MessageRole,
    /// Request a strict `json_schema` response format for agent-level
    /// enforcement.
    pub strict_schema: bool,
    /// Run a round's tool calls one at a time instead of concurrently.
    pub sequential_tools: bool,
}

impl AgentConfig {
    /// Create a config with a model and system prompt.
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: Some(system_prompt.into()),
            ..Default::default()
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Enable automatic retries for transient API failures (429, 5xx,
    /// network errors). Pass `0` to disable retries (the default).
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.retry = RetryConfig::with_retries(max_retries);
        self
    }

    pub fn with_max_validation_retries(mut self, retries: u32) -> Self {
        self.max_validation_retries = retries;
        self
    }

    /// Add a provider-specific request body field, e.g. `enable_cache`.
    pub fn with_extra_body(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_body.insert(key.into(), value.into());
        self
    }

    pub fn with_tool_role(mut self, role: MessageRole) -> Self {
        self.tool_role = role;
        self
    }

    pub fn with_sequential_tools(mut self, sequential: bool) -> Self {
        self.sequential_tools = sequential;
        self
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            system_prompt: None,
            max_rounds: 10,
            max_tokens: 1024,
            temperature: 0.7,
            retry: RetryConfig::default(),
            max_validation_retries: 2,
            extra_body: Map::new(),
            tool_role: MessageRole::Tool,
            strict_schema: true,
            sequential_tools: false,
        }
    }
}

/// Per-invocation options.
#[derive(Debug, Clone, Default)]
pub struct InvocationOptions {
    /// Log each outgoing request payload at `info` level. Registered hooks
    /// such as [`LoggingHook`](super::hooks::LoggingHook) log regardless.
    pub debug: bool,
    /// Tool-level directive for this invocation only. An agent-level
    /// directive here is rejected when the run starts.
    pub response_format: Option<EnforcementDirective>,
}

impl InvocationOptions {
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enforce `schema` on every tool return of this invocation.
    pub fn with_response_format(mut self, schema: Arc<StructuredSchema>) -> Self {
        self.response_format = Some(EnforcementDirective::ToolLevel(schema));
        self
    }
}
