//! Correlation IDs and token accounting for agent runs.
//!
//! Assigns a unique `trace_id` to each invocation and sums the token usage
//! reported by the provider across its model calls.

use crate::UsageInfo;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Generate a unique trace ID for an agent run.
pub fn generate_trace_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("tr-{ts:x}-{count:04x}")
}

/// Cumulative token usage for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageTotals {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub calls: u32,
}

impl UsageTotals {
    /// Add one model call. Missing usage still counts as a call.
    pub fn record(&mut self, usage: Option<&UsageInfo>) {
        self.calls += 1;
        if let Some(u) = usage {
            self.prompt_tokens += u.prompt_tokens.unwrap_or(0);
            self.completion_tokens += u.completion_tokens.unwrap_or(0);
        }
    }

    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}
