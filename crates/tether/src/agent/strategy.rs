//! Tool-level and agent-level structured output enforcement.
//!
//! Two independent enforcement points share one [`StructuredSchema`]:
//!
//! - **Tool-level** ([`EnforcementDirective::ToolLevel`]): every tool call's
//!   return value is validated as soon as the tool returns, before the agent
//!   decides whether to continue or finish.
//! - **Agent-level** ([`EnforcementDirective::AgentLevel`]): the agent's
//!   terminal answer is validated last.
//!
//! An [`EnforcementPlan`] holds whichever directives apply to one
//! invocation. A missing directive means its check never runs (the check
//! returns [`Verdict::Skipped`] and nothing is recorded). Failures are
//! returned as [`Verdict::Failed`] so the agent loop can re-prompt.

use crate::ResponseFormat;
use crate::error::{SchemaValidationFailure, StrategyError};
use crate::schema::StructuredSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

// ── Directives ─────────────────────────────────────────────────────

/// Which enforcement point a directive governs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirectiveLevel {
    Tool,
    Agent,
}

impl fmt::Display for DirectiveLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveLevel::Tool => write!(f, "tool-level"),
            DirectiveLevel::Agent => write!(f, "agent-level"),
        }
    }
}

/// Request to enforce a schema at one point of the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnforcementDirective {
    ToolLevel(Arc<StructuredSchema>),
    AgentLevel(Arc<StructuredSchema>),
}

impl EnforcementDirective {
    pub fn level(&self) -> DirectiveLevel {
        match self {
            EnforcementDirective::ToolLevel(_) => DirectiveLevel::Tool,
            EnforcementDirective::AgentLevel(_) => DirectiveLevel::Agent,
        }
    }

    pub fn schema(&self) -> &Arc<StructuredSchema> {
        match self {
            EnforcementDirective::ToolLevel(s) | EnforcementDirective::AgentLevel(s) => s,
        }
    }
}

// ── Validation log ─────────────────────────────────────────────────

/// Where in the run a payload was checked.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPoint {
    ToolReturn,
    FinalResponse,
}

impl fmt::Display for ValidationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationPoint::ToolReturn => write!(f, "tool-level"),
            ValidationPoint::FinalResponse => write!(f, "agent-level"),
        }
    }
}

/// One executed check, recorded on the run state in execution order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ValidationEvent {
    pub point: ValidationPoint,
    pub passed: bool,
    /// Tool whose return value was checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// No directive governs this point.
    Skipped,
    Passed(Map<String, Value>),
    Failed(SchemaValidationFailure),
}

impl Verdict {
    /// Validation event for this verdict, or `None` when skipped.
    pub fn event(&self, point: ValidationPoint, tool: Option<&str>) -> Option<ValidationEvent> {
        let passed = match self {
            Verdict::Skipped => return None,
            Verdict::Passed(_) => true,
            Verdict::Failed(_) => false,
        };
        Some(ValidationEvent {
            point,
            passed,
            tool: tool.map(str::to_string),
        })
    }
}

// ── Plan ───────────────────────────────────────────────────────────

/// Directives active for one invocation, plus the payloads they accepted.
#[derive(Debug, Clone, Default)]
pub struct EnforcementPlan {
    tool_level: Option<Arc<StructuredSchema>>,
    agent_level: Option<Arc<StructuredSchema>>,
    last_tool_payload: Option<Map<String, Value>>,
    final_payload: Option<Map<String, Value>>,
}

impl EnforcementPlan {
    /// Build a plan from zero, one or two directives.
    ///
    /// Fails when a level is supplied twice, or when the tool-level and
    /// agent-level schemas are not structurally identical.
    pub fn from_directives(
        directives: impl IntoIterator<Item = EnforcementDirective>,
    ) -> Result<Self, StrategyError> {
        let mut plan = Self::default();
        for directive in directives {
            let slot = match directive.level() {
                DirectiveLevel::Tool => &mut plan.tool_level,
                DirectiveLevel::Agent => &mut plan.agent_level,
            };
            if slot.is_some() {
                return Err(StrategyError::DuplicateDirective(directive.level()));
            }
            *slot = Some(directive.schema().clone());
        }

        if let (Some(tool), Some(agent)) = (&plan.tool_level, &plan.agent_level)
            && !tool.is_structurally_identical(agent)
        {
            return Err(StrategyError::SchemaMismatch {
                tool: tool.name.clone(),
                agent: agent.name.clone(),
            });
        }

        debug!(
            "Enforcement plan: tool_level={}, agent_level={}",
            plan.tool_level.as_ref().map_or("none", |s| s.name.as_str()),
            plan.agent_level.as_ref().map_or("none", |s| s.name.as_str()),
        );
        Ok(plan)
    }

    /// Build the plan for one invocation.
    ///
    /// `bound` is the directive fixed on the agent and must be agent-level.
    /// `per_call` comes with the invocation and must be tool-level.
    pub fn bind(
        bound: Option<EnforcementDirective>,
        per_call: Option<EnforcementDirective>,
    ) -> Result<Self, StrategyError> {
        if let Some(d) = &bound
            && d.level() != DirectiveLevel::Agent
        {
            return Err(StrategyError::MisplacedDirective {
                level: d.level(),
                bound_at: "on the agent",
            });
        }
        if let Some(d) = &per_call
            && d.level() != DirectiveLevel::Tool
        {
            return Err(StrategyError::MisplacedDirective {
                level: d.level(),
                bound_at: "per invocation",
            });
        }
        Self::from_directives(bound.into_iter().chain(per_call))
    }

    pub fn tool_level(&self) -> Option<&StructuredSchema> {
        self.tool_level.as_deref()
    }

    pub fn agent_level(&self) -> Option<&StructuredSchema> {
        self.agent_level.as_deref()
    }

    /// Whether neither directive is active.
    pub fn is_empty(&self) -> bool {
        self.tool_level.is_none() && self.agent_level.is_none()
    }

    /// Validate a tool's return value.
    ///
    /// Must be called before the final answer is accepted; afterwards it
    /// fails with [`StrategyError::OutOfOrder`].
    pub fn check_tool_return(&mut self, output: &str) -> Result<Verdict, StrategyError> {
        if self.final_payload.is_some() {
            return Err(StrategyError::OutOfOrder);
        }
        let Some(schema) = &self.tool_level else {
            return Ok(Verdict::Skipped);
        };
        Ok(
            match schema.parse_and_validate(output, ValidationPoint::ToolReturn) {
                Ok(payload) => {
                    self.last_tool_payload = Some(payload.clone());
                    Verdict::Passed(payload)
                }
                Err(failure) => Verdict::Failed(failure),
            },
        )
    }

    /// Validate the agent's terminal answer.
    pub fn check_final(&mut self, output: &str) -> Verdict {
        let Some(schema) = &self.agent_level else {
            return Verdict::Skipped;
        };
        match schema.parse_and_validate(output, ValidationPoint::FinalResponse) {
            Ok(payload) => {
                self.final_payload = Some(payload.clone());
                Verdict::Passed(payload)
            }
            Err(failure) => Verdict::Failed(failure),
        }
    }

    /// `json_schema` response format for the agent-level schema, if any.
    pub fn response_format(&self, strict: bool) -> Option<ResponseFormat> {
        self.agent_level
            .as_ref()
            .map(|s| ResponseFormat::json_schema(s.name.clone(), s.json_schema(strict), strict))
    }

    /// Payload to expose as `structured_response`.
    ///
    /// With an agent-level directive only the accepted final answer counts.
    /// With only a tool-level directive, the last accepted tool return is
    /// used. With neither, `None`.
    pub fn into_structured_response(self) -> Option<Map<String, Value>> {
        if self.agent_level.is_some() {
            self.final_payload
        } else {
            self.last_tool_payload
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    const GOOD: &str = r#"{"city": "SF", "weather": "sunny", "recommends": "visit the park"}"#;
    const BAD: &str = r#"{"city": "SF"}"#;

    fn schema() -> Arc<StructuredSchema> {
        Arc::new(StructuredSchema::contact_info())
    }

    fn both() -> EnforcementPlan {
        let s = schema();
        EnforcementPlan::from_directives([
            EnforcementDirective::AgentLevel(s.clone()),
            EnforcementDirective::ToolLevel(s),
        ])
        .unwrap()
    }

    #[test]
    fn empty_plan_skips_everything() {
        let mut plan = EnforcementPlan::from_directives([]).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.check_tool_return("not json").unwrap(), Verdict::Skipped);
        assert_eq!(plan.check_final("free text"), Verdict::Skipped);
        assert!(plan.response_format(true).is_none());
        assert!(plan.into_structured_response().is_none());
    }

    #[test]
    fn skipped_verdict_records_no_event() {
        assert!(
            Verdict::Skipped
                .event(ValidationPoint::ToolReturn, Some("get_weather"))
                .is_none()
        );
    }

    #[test]
    fn mismatched_schemas_fail_construction() {
        let other = Arc::new(
            StructuredSchema::new("Forecast")
                .field("city", FieldType::String, "")
                .field("high", FieldType::Number, ""),
        );
        let err = EnforcementPlan::from_directives([
            EnforcementDirective::ToolLevel(other),
            EnforcementDirective::AgentLevel(schema()),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            StrategyError::SchemaMismatch {
                tool: "Forecast".into(),
                agent: "ContactInfo".into()
            }
        );
    }

    #[test]
    fn duplicate_level_rejected() {
        let err = EnforcementPlan::from_directives([
            EnforcementDirective::ToolLevel(schema()),
            EnforcementDirective::ToolLevel(schema()),
        ])
        .unwrap_err();
        assert_eq!(err, StrategyError::DuplicateDirective(DirectiveLevel::Tool));
    }

    #[test]
    fn bind_accepts_each_level_at_its_own_point() {
        let plan = EnforcementPlan::bind(
            Some(EnforcementDirective::AgentLevel(schema())),
            Some(EnforcementDirective::ToolLevel(schema())),
        )
        .unwrap();
        assert!(plan.agent_level().is_some());
        assert!(plan.tool_level().is_some());
    }

    #[test]
    fn tool_level_bound_on_agent_is_rejected() {
        let err =
            EnforcementPlan::bind(Some(EnforcementDirective::ToolLevel(schema())), None).unwrap_err();
        assert_eq!(
            err,
            StrategyError::MisplacedDirective {
                level: DirectiveLevel::Tool,
                bound_at: "on the agent"
            }
        );
        assert_eq!(err.to_string(), "tool-level directive cannot be bound on the agent");
    }

    #[test]
    fn agent_level_per_invocation_is_rejected() {
        let err =
            EnforcementPlan::bind(None, Some(EnforcementDirective::AgentLevel(schema()))).unwrap_err();
        assert_eq!(
            err,
            StrategyError::MisplacedDirective {
                level: DirectiveLevel::Agent,
                bound_at: "per invocation"
            }
        );
    }

    #[test]
    fn tool_level_only_uses_last_passing_tool_payload() {
        let mut plan =
            EnforcementPlan::from_directives([EnforcementDirective::ToolLevel(schema())]).unwrap();
        assert!(matches!(plan.check_tool_return(GOOD).unwrap(), Verdict::Passed(_)));
        assert!(matches!(plan.check_tool_return(BAD).unwrap(), Verdict::Failed(_)));
        assert_eq!(plan.check_final("It's sunny"), Verdict::Skipped);
        assert!(plan.response_format(true).is_none());
        let payload = plan.into_structured_response().unwrap();
        assert_eq!(payload["recommends"], "visit the park");
    }

    #[test]
    fn agent_level_payload_wins_over_tool_payload() {
        let mut plan = both();
        plan.check_tool_return(GOOD).unwrap();
        let final_answer = r#"{"city": "San Francisco", "weather": "sunny", "recommends": "walk"}"#;
        assert!(matches!(plan.check_final(final_answer), Verdict::Passed(_)));
        let payload = plan.into_structured_response().unwrap();
        assert_eq!(payload["city"], "San Francisco");
    }

    #[test]
    fn agent_level_without_accepted_answer_is_null() {
        let mut plan = both();
        plan.check_tool_return(GOOD).unwrap();
        assert!(matches!(plan.check_final(BAD), Verdict::Failed(_)));
        assert!(plan.into_structured_response().is_none());
    }

    #[test]
    fn tool_check_after_final_is_out_of_order() {
        let mut plan = both();
        assert!(matches!(plan.check_final(GOOD), Verdict::Passed(_)));
        assert_eq!(
            plan.check_tool_return(GOOD).unwrap_err(),
            StrategyError::OutOfOrder
        );
    }

    #[test]
    fn failed_final_does_not_block_further_tool_checks() {
        let mut plan = both();
        assert!(matches!(plan.check_final(BAD), Verdict::Failed(_)));
        assert!(plan.check_tool_return(GOOD).is_ok());
    }

    #[test]
    fn response_format_carries_strict_schema() {
        let fmt = serde_json::to_value(both().response_format(true).unwrap()).unwrap();
        assert_eq!(fmt["type"], "json_schema");
        assert_eq!(fmt["json_schema"]["name"], "ContactInfo");
        assert_eq!(fmt["json_schema"]["schema"]["additionalProperties"], false);
    }
}
