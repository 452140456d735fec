//! Error types for tether.
//!
//! Each stage of the pipeline has its own error type so callers can tell a
//! malformed transcript ([`FormatError`]) from a payload that missed the
//! schema ([`SchemaValidationFailure`]) or a transport problem
//! ([`ApiError`]). [`Error`] is the umbrella returned by an agent run, and
//! [`ErrorRecord`] is the JSON object printed when a run cannot produce a
//! canonical output record.

use crate::agent::hooks::HookStage;
use crate::agent::strategy::{DirectiveLevel, ValidationPoint};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Normalization ──────────────────────────────────────────────────

/// Failure converting internal messages into canonical role/content records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A message carries a kind tag outside the closed set
    /// (`human`, `ai`, `system`, `tool`).
    #[error("unknown message kind '{0}'")]
    UnknownRoleKind(String),
}

// ── Structured output ──────────────────────────────────────────────

/// A structured payload did not match the required fields or types.
///
/// Recoverable: the agent loop feeds the failure back to the model and
/// retries within its validation budget.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{point} output does not match schema '{schema}': {}", .errors.join("; "))]
pub struct SchemaValidationFailure {
    /// Name of the schema the payload was checked against.
    pub schema: String,
    /// Which enforcement point rejected the payload.
    pub point: ValidationPoint,
    /// One entry per violation, e.g. `/city: "city" is a required property`.
    pub errors: Vec<String>,
}

/// Invalid combination of enforcement directives, or a check requested out
/// of order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    /// Tool-level and agent-level directives reference structurally
    /// different schemas.
    #[error(
        "tool-level schema '{tool}' and agent-level schema '{agent}' are not structurally identical"
    )]
    SchemaMismatch { tool: String, agent: String },
    /// The same directive level was supplied twice for one invocation.
    #[error("{0} directive supplied more than once")]
    DuplicateDirective(DirectiveLevel),
    /// A directive arrived at the wrong binding point: agent-level
    /// directives belong to the agent, tool-level ones to an invocation.
    #[error("{level} directive cannot be bound {bound_at}")]
    MisplacedDirective {
        level: DirectiveLevel,
        bound_at: &'static str,
    },
    /// Tool-level validation requested after the final response was accepted.
    #[error("tool-level validation requested after the final response was accepted")]
    OutOfOrder,
}

// ── Hooks ──────────────────────────────────────────────────────────

/// A lifecycle hook returned an error or panicked.
///
/// Hook failures are logged and recorded on the run, never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{stage} hook '{hook}' failed: {message}")]
pub struct HookFailure {
    pub hook: String,
    pub stage: HookStage,
    pub message: String,
}

// ── Transport ──────────────────────────────────────────────────────

/// Failure talking to the chat completions endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("API HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Decode(String),
    #[error("API error: {0}")]
    Provider(String),
}

impl ApiError {
    /// Whether the failure is worth retrying (rate limits, 5xx, network).
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            ApiError::Decode(_) | ApiError::Provider(_) => false,
        }
    }
}

// ── Configuration ──────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Umbrella ───────────────────────────────────────────────────────

/// Error returned by an agent invocation or the CLI.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Strategy(#[from] StrategyError),
    /// Structured-output validation kept failing after the retry budget.
    #[error(transparent)]
    Validation(#[from] SchemaValidationFailure),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable snake_case identifier used in [`ErrorRecord`].
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Format(FormatError::UnknownRoleKind(_)) => "unknown_role_kind",
            Error::Strategy(StrategyError::SchemaMismatch { .. }) => "schema_mismatch",
            Error::Strategy(_) => "strategy",
            Error::Validation(_) => "schema_validation_failure",
            Error::Api(_) => "api",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
        }
    }
}

// ── User-visible error object ──────────────────────────────────────

/// JSON form of an unrecovered failure:
/// `{"error": {"kind": "...", "message": "..."}}`.
///
/// Deliberately shaped differently from
/// [`CanonicalOutputRecord`](crate::response::CanonicalOutputRecord) so a
/// consumer can never mistake a failure for a partial result.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub error: ErrorBody,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl From<&Error> for ErrorRecord {
    fn from(err: &Error) -> Self {
        Self {
            error: ErrorBody {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }
}
