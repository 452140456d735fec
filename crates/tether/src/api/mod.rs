//! API support: retry with backoff, trace IDs and token accounting.
//!
//! - [`retry`]: transient error retry (429, 5xx, network) with
//!   configurable exponential backoff and jitter.
//! - [`tracing`]: per-run `trace_id` generation and cumulative
//!   [`UsageTotals`].

pub mod retry;
pub mod tracing;

pub use retry::{RetryConfig, retry_api_call};
pub use tracing::{UsageTotals, generate_trace_id};
