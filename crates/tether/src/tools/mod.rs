//! Tools the agent can call.
//!
//! - [`core`]: the [`Tool`] trait, [`ToolSet`] dispatch and [`FnTool`]
//!   for closure-based tools.
//! - [`weather`]: the `get_weather` demo tool.

pub mod core;
pub mod weather;

pub use self::core::{FnTool, Tool, ToolFuture, ToolSet, parse_tool_args};
pub use weather::GetWeather;
