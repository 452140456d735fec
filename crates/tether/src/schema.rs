//! Structured output schemas.
//!
//! A [`StructuredSchema`] is a named record type with an ordered set of
//! required, typed, described fields. It is the contract both enforcement
//! points check payloads against, and it renders to the JSON Schema sent to
//! the model as a `json_schema` response format.

use crate::agent::strategy::ValidationPoint;
use crate::error::SchemaValidationFailure;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Primitive type of a schema field.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
}

impl FieldType {
    /// JSON Schema `type` keyword for this field type.
    pub fn json_type(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_type())
    }
}

/// One required field of a [`StructuredSchema`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Guidance for the model; does not affect validation.
    pub description: String,
}

/// Named record type with ordered, required fields.
///
/// Build once and share behind an `Arc` across every directive that
/// references it:
///
/// ```
/// use tether::schema::{FieldType, StructuredSchema};
///
/// let schema = StructuredSchema::new("ContactInfo")
///     .field("city", FieldType::String, "City name")
///     .field("weather", FieldType::String, "Weather condition");
/// assert_eq!(schema.field_names(), vec!["city", "weather"]);
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StructuredSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<SchemaField>,
}

impl StructuredSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a required field (builder pattern). Field order is significant.
    pub fn field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(SchemaField {
            name: name.into(),
            field_type,
            description: description.into(),
        });
        self
    }

    /// The weather demo contract: `city`, `weather`, `recommends`.
    pub fn contact_info() -> Self {
        Self::new("ContactInfo")
            .with_description("Contact information including weather and recommendations.")
            .field("city", FieldType::String, "City name")
            .field("weather", FieldType::String, "Weather condition")
            .field("recommends", FieldType::String, "Recommendations for activities")
    }

    /// The JSON-mode demo contract: `setup`, `punchline`.
    pub fn joke() -> Self {
        Self::new("Joke")
            .field("setup", FieldType::String, "The setup of the joke")
            .field("punchline", FieldType::String, "The punchline of the joke")
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Same field names, in the same order, with the same types.
    ///
    /// Record names and descriptions are guidance only and are ignored.
    pub fn is_structurally_identical(&self, other: &StructuredSchema) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.name == b.name && a.field_type == b.field_type)
    }

    /// Render as a JSON Schema object.
    ///
    /// `strict` closes the object (`additionalProperties: false`), which is
    /// what providers expect for a strict `json_schema` response format.
    pub fn json_schema(&self, strict: bool) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| {
                (
                    f.name.clone(),
                    json!({"type": f.field_type.json_type(), "description": f.description}),
                )
            })
            .collect();
        let mut schema = json!({
            "type": "object",
            "properties": properties,
            "required": self.field_names(),
        });
        if let Some(desc) = &self.description {
            schema["description"] = Value::String(desc.clone());
        }
        if strict {
            schema["additionalProperties"] = Value::Bool(false);
        }
        schema
    }

    /// Check that `payload` is an object carrying every required field with
    /// the declared type. Extra fields are tolerated.
    pub fn validate(
        &self,
        payload: &Value,
        point: ValidationPoint,
    ) -> Result<Map<String, Value>, SchemaValidationFailure> {
        let schema = self.json_schema(false);
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| self.failure(point, vec![format!("invalid schema: {e}")]))?;

        let errors: Vec<String> = validator
            .iter_errors(payload)
            .map(|e| {
                let path = e.instance_path().to_string();
                let path = if path.is_empty() { "/".to_string() } else { path };
                format!("{path}: {e}")
            })
            .collect();

        if !errors.is_empty() {
            return Err(self.failure(point, errors));
        }
        match payload {
            Value::Object(map) => Ok(map.clone()),
            _ => Err(self.failure(point, vec!["/: payload is not an object".into()])),
        }
    }

    /// Parse model or tool text as JSON, then [`validate`](Self::validate).
    ///
    /// A surrounding Markdown code fence (```` ```json ... ``` ````) is
    /// stripped first.
    pub fn parse_and_validate(
        &self,
        text: &str,
        point: ValidationPoint,
    ) -> Result<Map<String, Value>, SchemaValidationFailure> {
        let payload: Value = serde_json::from_str(strip_code_fence(text))
            .map_err(|e| self.failure(point, vec![format!("/: payload is not valid JSON: {e}")]))?;
        self.validate(&payload, point)
    }

    fn failure(&self, point: ValidationPoint, errors: Vec<String>) -> SchemaValidationFailure {
        SchemaValidationFailure {
            schema: self.name.clone(),
            point,
            errors,
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest).trim_end();
    // Language tag, with or without a newline before the body.
    let body = rest
        .trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        .trim_start();
    if body.starts_with('{') || body.starts_with('[') {
        body
    } else {
        rest.trim()
    }
}

// ── Typed payload ──────────────────────────────────────────────────

/// Typed view of a payload validated against
/// [`StructuredSchema::contact_info`].
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq, Eq)]
pub struct ContactInfo {
    /// City name
    pub city: String,
    /// Weather condition
    pub weather: String,
    /// Recommendations for activities
    pub recommends: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> StructuredSchema {
        StructuredSchema::contact_info()
    }

    #[test]
    fn valid_payload_passes() {
        let payload = json!({"city": "SF", "weather": "sunny", "recommends": "visit the park"});
        let map = contact()
            .validate(&payload, ValidationPoint::ToolReturn)
            .unwrap();
        assert_eq!(map["city"], "SF");
    }

    #[test]
    fn missing_field_fails() {
        let payload = json!({"city": "SF", "weather": "sunny"});
        let err = contact()
            .validate(&payload, ValidationPoint::FinalResponse)
            .unwrap_err();
        assert_eq!(err.schema, "ContactInfo");
        assert_eq!(err.point, ValidationPoint::FinalResponse);
        assert_eq!(err.errors.len(), 1);
        assert!(err.errors[0].contains("recommends"), "{:?}", err.errors);
    }

    #[test]
    fn wrong_type_fails() {
        let payload = json!({"city": 42, "weather": "sunny", "recommends": "x"});
        let err = contact()
            .validate(&payload, ValidationPoint::ToolReturn)
            .unwrap_err();
        assert!(err.errors[0].starts_with("/city"), "{:?}", err.errors);
    }

    #[test]
    fn non_object_fails() {
        let err = contact()
            .validate(&json!(["SF"]), ValidationPoint::ToolReturn)
            .unwrap_err();
        assert!(!err.errors.is_empty());
    }

    #[test]
    fn extra_fields_tolerated_by_validation() {
        let payload = json!({"city": "SF", "weather": "sunny", "recommends": "x", "extra": 1});
        assert!(
            contact()
                .validate(&payload, ValidationPoint::ToolReturn)
                .is_ok()
        );
    }

    #[test]
    fn parse_strips_code_fence() {
        let text = "```json\n{\"city\": \"SF\", \"weather\": \"sunny\", \"recommends\": \"x\"}\n```";
        let map = contact()
            .parse_and_validate(text, ValidationPoint::FinalResponse)
            .unwrap();
        assert_eq!(map["weather"], "sunny");
    }

    #[test]
    fn parse_strips_single_line_fence() {
        for text in [
            "```json{\"city\": \"SF\", \"weather\": \"sunny\", \"recommends\": \"x\"}```",
            "```json {\"city\": \"SF\", \"weather\": \"sunny\", \"recommends\": \"x\"}```",
            "```{\"city\": \"SF\", \"weather\": \"sunny\", \"recommends\": \"x\"}```",
        ] {
            let map = contact()
                .parse_and_validate(text, ValidationPoint::FinalResponse)
                .unwrap();
            assert_eq!(map["city"], "SF", "{text}");
        }
    }

    #[test]
    fn contact_info_describes_weather_contract() {
        let schema = contact().json_schema(true);
        assert_eq!(
            schema["description"],
            "Contact information including weather and recommendations."
        );
    }

    #[test]
    fn parse_rejects_prose() {
        let err = contact()
            .parse_and_validate("It's sunny in SF", ValidationPoint::FinalResponse)
            .unwrap_err();
        assert!(err.errors[0].contains("not valid JSON"));
    }

    #[test]
    fn strict_schema_closes_object() {
        let strict = contact().json_schema(true);
        assert_eq!(strict["additionalProperties"], false);
        assert_eq!(strict["required"], json!(["city", "weather", "recommends"]));
        assert_eq!(strict["properties"]["city"]["description"], "City name");

        let loose = contact().json_schema(false);
        assert!(loose.get("additionalProperties").is_none());
    }

    #[test]
    fn structural_identity_ignores_descriptions() {
        let renamed = StructuredSchema::new("Other")
            .field("city", FieldType::String, "where")
            .field("weather", FieldType::String, "sky")
            .field("recommends", FieldType::String, "what to do");
        assert!(contact().is_structurally_identical(&renamed));
    }

    #[test]
    fn structural_identity_checks_order_and_type() {
        let reordered = StructuredSchema::new("ContactInfo")
            .field("weather", FieldType::String, "")
            .field("city", FieldType::String, "")
            .field("recommends", FieldType::String, "");
        assert!(!contact().is_structurally_identical(&reordered));

        let retyped = StructuredSchema::new("ContactInfo")
            .field("city", FieldType::String, "")
            .field("weather", FieldType::Boolean, "")
            .field("recommends", FieldType::String, "");
        assert!(!contact().is_structurally_identical(&retyped));
    }

    #[test]
    fn typed_contact_info_agrees_with_schema() {
        let generated = crate::json_schema_for::<ContactInfo>();
        let mut required: Vec<String> = generated["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        required.sort();
        let mut expected: Vec<String> = contact()
            .field_names()
            .into_iter()
            .map(String::from)
            .collect();
        expected.sort();
        assert_eq!(required, expected);

        let payload = serde_json::to_value(ContactInfo {
            city: "SF".into(),
            weather: "sunny".into(),
            recommends: "visit the park".into(),
        })
        .unwrap();
        assert!(
            contact()
                .validate(&payload, ValidationPoint::FinalResponse)
                .is_ok()
        );
    }
}
