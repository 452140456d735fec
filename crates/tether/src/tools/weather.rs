//! Demo weather tool.

use super::core::{Tool, ToolFuture, parse_tool_args};
use crate::schema::ContactInfo;
use crate::{ToolDef, json_schema_for};
use schemars::JsonSchema;
use serde::Deserialize;

/// Arguments for `get_weather`.
#[derive(Deserialize, JsonSchema)]
pub struct GetWeatherArgs {
    /// City to look up.
    pub city: String,
}

/// `get_weather(city)`: canned forecast shaped like [`ContactInfo`].
///
/// Always reports sunny weather and recommends visiting the park.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetWeather;

impl GetWeather {
    pub fn forecast(city: &str) -> ContactInfo {
        ContactInfo {
            city: city.to_string(),
            weather: "sunny".into(),
            recommends: "visit the park".into(),
        }
    }
}

impl Tool for GetWeather {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "get_weather",
            "Get weather for a given city.",
            json_schema_for::<GetWeatherArgs>(),
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<GetWeatherArgs>(arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            serde_json::to_string(&Self::forecast(&args.city))
                .unwrap_or_else(|e| format!("Error: failed to encode forecast: {e}"))
        })
    }
}
