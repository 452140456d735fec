//! Lifecycle hooks over a per-invocation run state.
//!
//! Two independent capabilities:
//!
//! 1. **[`PreAgentHook`]** runs exactly once per invocation, before any
//!    model or tool interaction.
//! 2. **[`PreModelHook`]** runs immediately before every model call.
//!
//! Hooks are registered in order on [`Hooks`] and communicate only through
//! the [`RunState`] they receive. A hook that returns `Err` or panics is
//! logged and recorded as a [`HookFailure`]; the run continues and any
//! message changes the failing hook made are rolled back.

use crate::agent::strategy::ValidationEvent;
use crate::error::HookFailure;
use crate::message::AgentMessage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{info, warn};

// ── Run state ──────────────────────────────────────────────────────

/// Mutable context for one invocation. Never shared between invocations.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub trace_id: String,
    /// Conversation so far, including messages added during the run.
    pub messages: Vec<AgentMessage>,
    /// Model calls completed so far.
    pub model_calls: u32,
    /// Free-form scratch space for hooks.
    pub values: Map<String, Value>,
    /// Validation checks in execution order.
    pub validations: Vec<ValidationEvent>,
    pub hook_failures: Vec<HookFailure>,
    /// Per-invocation debug flag.
    pub debug: bool,
    agent_started: bool,
}

impl RunState {
    pub fn new(trace_id: impl Into<String>, messages: Vec<AgentMessage>, debug: bool) -> Self {
        Self {
            trace_id: trace_id.into(),
            messages,
            debug,
            ..Default::default()
        }
    }

    /// Whether the pre-agent stage has already run.
    pub fn agent_started(&self) -> bool {
        self.agent_started
    }

    /// Top-level keys visible to hooks: `messages` followed by any
    /// hook-written values.
    pub fn state_keys(&self) -> Vec<String> {
        std::iter::once("messages".to_string())
            .chain(self.values.keys().cloned())
            .collect()
    }
}

// ── Hook traits ────────────────────────────────────────────────────

/// Lifecycle stage a hook runs at.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HookStage {
    PreAgent,
    PreModel,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookStage::PreAgent => write!(f, "pre_agent"),
            HookStage::PreModel => write!(f, "pre_model"),
        }
    }
}

/// Runs once per invocation before anything else.
pub trait PreAgentHook: Send + Sync {
    /// Name used in logs and [`HookFailure`] records.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn pre_agent(&self, state: &mut RunState) -> Result<(), String>;
}

/// Runs before every model call.
pub trait PreModelHook: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn pre_model(&self, state: &mut RunState) -> Result<(), String>;
}

/// Closure-based hook usable at either stage.
///
/// ```
/// use tether::agent::hooks::{FnHook, Hooks, RunState};
///
/// let hooks = Hooks::new().with_pre_model(FnHook::new("count", |state: &mut RunState| {
///     let seen = state.values.get("seen").and_then(|v| v.as_u64()).unwrap_or(0);
///     state.values.insert("seen".into(), (seen + 1).into());
///     Ok(())
/// }));
/// ```
pub struct FnHook<F> {
    name: String,
    f: F,
}

impl<F> FnHook<F>
where
    F: Fn(&mut RunState) -> Result<(), String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> PreAgentHook for FnHook<F>
where
    F: Fn(&mut RunState) -> Result<(), String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn pre_agent(&self, state: &mut RunState) -> Result<(), String> {
        (self.f)(state)
    }
}

impl<F> PreModelHook for FnHook<F>
where
    F: Fn(&mut RunState) -> Result<(), String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn pre_model(&self, state: &mut RunState) -> Result<(), String> {
        (self.f)(state)
    }
}

/// Logs run-state keys before the agent starts and the message count
/// before each model call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHook;

impl PreAgentHook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn pre_agent(&self, state: &mut RunState) -> Result<(), String> {
        info!(
            "Before agent: trace_id={}, state keys={:?}",
            state.trace_id,
            state.state_keys()
        );
        Ok(())
    }
}

impl PreModelHook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn pre_model(&self, state: &mut RunState) -> Result<(), String> {
        info!(
            "Before model call {}: {} message(s) in state",
            state.model_calls + 1,
            state.messages.len()
        );
        Ok(())
    }
}

// ── Registry ───────────────────────────────────────────────────────

/// Ordered hook registrations for an agent.
#[derive(Default)]
pub struct Hooks {
    pre_agent: Vec<Box<dyn PreAgentHook>>,
    pre_model: Vec<Box<dyn PreModelHook>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field(
                "pre_agent",
                &self.pre_agent.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .field(
                "pre_model",
                &self.pre_model.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pre-agent hook (builder pattern).
    pub fn with_pre_agent(mut self, hook: impl PreAgentHook + 'static) -> Self {
        self.pre_agent.push(Box::new(hook));
        self
    }

    /// Append a pre-model hook (builder pattern).
    pub fn with_pre_model(mut self, hook: impl PreModelHook + 'static) -> Self {
        self.pre_model.push(Box::new(hook));
        self
    }

    /// Register [`LoggingHook`] at both stages.
    pub fn with_logging(self) -> Self {
        self.with_pre_agent(LoggingHook).with_pre_model(LoggingHook)
    }

    pub fn is_empty(&self) -> bool {
        self.pre_agent.is_empty() && self.pre_model.is_empty()
    }

    /// Run pre-agent hooks. Does nothing if they already ran for `state`.
    pub fn run_pre_agent(&self, state: &mut RunState) {
        if state.agent_started {
            return;
        }
        state.agent_started = true;
        for hook in &self.pre_agent {
            run_guarded(hook.name(), HookStage::PreAgent, state, |s| {
                hook.pre_agent(s)
            });
        }
    }

    /// Run pre-model hooks, running the pre-agent stage first if it has not
    /// run yet.
    pub fn run_pre_model(&self, state: &mut RunState) {
        if !state.agent_started {
            self.run_pre_agent(state);
        }
        for hook in &self.pre_model {
            run_guarded(hook.name(), HookStage::PreModel, state, |s| {
                hook.pre_model(s)
            });
        }
    }
}

fn run_guarded(
    name: &str,
    stage: HookStage,
    state: &mut RunState,
    hook: impl FnOnce(&mut RunState) -> Result<(), String>,
) {
    let snapshot = state.messages.clone();
    let message = match catch_unwind(AssertUnwindSafe(|| hook(&mut *state))) {
        Ok(Ok(())) => return,
        Ok(Err(message)) => message,
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };
    state.messages = snapshot;
    warn!("Hook {name} failed at {stage}: {message}");
    state.hook_failures.push(HookFailure {
        hook: name.to_string(),
        stage,
        message,
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
