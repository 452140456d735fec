//! Agent runtime: the [`Agent`] loop and its supporting modules.
//!
//! - [`harness::Agent`] runs the tool-use loop. Start here.
//! - [`config`] holds [`AgentConfig`] and per-call [`InvocationOptions`].
//! - [`hooks`] provides pre-agent and pre-model lifecycle hooks.
//! - [`strategy`] reconciles tool-level and agent-level structured output
//!   directives and decides when each payload is validated.
//! - [`structured`] makes one-shot JSON mode calls without the loop.

pub mod config;
pub mod harness;
pub mod hooks;
pub mod strategy;
pub mod structured;

pub use config::{AgentConfig, DEFAULT_SYSTEM_PROMPT, InvocationOptions};
pub use harness::Agent;
pub use hooks::{FnHook, HookStage, Hooks, LoggingHook, PreAgentHook, PreModelHook, RunState};
pub use strategy::{
    DirectiveLevel, EnforcementDirective, EnforcementPlan, ValidationEvent, ValidationPoint,
    Verdict,
};
pub use structured::invoke_json_mode;
