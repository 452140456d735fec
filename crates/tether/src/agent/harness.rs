//! The agent loop.
//!
//! [`Agent::invoke`] sends the conversation to the model, executes any
//! requested tool calls, appends the results and repeats until the model
//! produces a text-only answer or the round limit is reached. Structured
//! output enforcement hooks into two points of that loop: tool returns are
//! checked as soon as each tool finishes, and the terminal answer is checked
//! last. A failed check is fed back to the model and retried within
//! [`AgentConfig::max_validation_retries`].

use crate::agent::config::{AgentConfig, InvocationOptions};
use crate::agent::hooks::{Hooks, RunState};
use crate::agent::strategy::{
    EnforcementDirective, EnforcementPlan, ValidationPoint, Verdict,
};
use crate::agent::structured::invoke_json_mode;
use crate::api::retry::retry_api_call;
use crate::api::tracing::{UsageTotals, generate_trace_id};
use crate::error::{Error, FormatError, SchemaValidationFailure};
use crate::message::{AgentMessage, MessageKind};
use crate::response::{CanonicalOutputRecord, InvocationResult, RoleMapper, format_response};
use crate::schema::StructuredSchema;
use crate::settings::ProviderSettings;
use crate::tools::core::ToolSet;
use crate::{ChatClient, ChatModel, ChatRequest, Message, ResponseFormat, ToolCall, ToolDef};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A tool-using agent bound to one model, tool set and configuration.
///
/// The agent-level directive, if any, is fixed here; a tool-level directive
/// is supplied per call through [`InvocationOptions`].
pub struct Agent {
    model: Box<dyn ChatModel>,
    tools: ToolSet,
    config: AgentConfig,
    hooks: Hooks,
    response_format: Option<EnforcementDirective>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("tools", &self.tools)
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .field("response_format", &self.response_format)
            .finish_non_exhaustive()
    }
}

impl Agent {
    pub fn new(model: impl ChatModel + 'static, tools: ToolSet, config: AgentConfig) -> Self {
        Self {
            model: Box::new(model),
            tools,
            config,
            hooks: Hooks::default(),
            response_format: None,
        }
    }

    /// Build an agent talking to the provider described by `settings`.
    ///
    /// An empty `config.model` is filled from the settings.
    pub fn from_settings(
        settings: &ProviderSettings,
        tools: ToolSet,
        mut config: AgentConfig,
    ) -> Result<Self, Error> {
        if config.model.is_empty() {
            config.model = settings.model.clone();
        }
        let client = ChatClient::new(&settings.api_key, &settings.base_url)?;
        debug!("Chat client ready: endpoint={}", client.endpoint());
        Ok(Self::new(client, tools, config))
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Enforce `schema` on the final answer of every invocation.
    pub fn with_response_format(mut self, schema: Arc<StructuredSchema>) -> Self {
        self.response_format = Some(EnforcementDirective::AgentLevel(schema));
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Role mapper honoring the configured tool role.
    pub fn role_mapper(&self) -> RoleMapper {
        RoleMapper::default().with_tool_role(self.config.tool_role)
    }

    /// Run the agent loop over `messages`.
    ///
    /// Fails on an invalid directive combination, an unmappable message
    /// kind, a non-retryable API error, or structured output that is still
    /// invalid after the validation retry budget. Hook failures never fail
    /// the run; they are recorded on the result.
    pub async fn invoke(
        &self,
        messages: Vec<AgentMessage>,
        options: InvocationOptions,
    ) -> Result<InvocationResult, Error> {
        let mut plan = EnforcementPlan::bind(self.response_format.clone(), options.response_format)?;

        let trace_id = generate_trace_id();
        info!(
            "Agent run started: trace_id={}, model={}, tools={}, debug={}",
            trace_id,
            self.config.model,
            self.tools.len(),
            options.debug
        );

        let mut state = RunState::new(&trace_id, messages, options.debug);
        self.hooks.run_pre_agent(&mut state);

        let tool_defs = (!self.tools.is_empty()).then(|| self.tools.definitions());
        let response_format = plan.response_format(self.config.strict_schema);
        let mut usage = UsageTotals::default();
        let mut failures: u32 = 0;
        let mut finished = false;

        for round in 0..self.config.max_rounds {
            self.hooks.run_pre_model(&mut state);

            let request =
                self.build_request(&state.messages, tool_defs.clone(), response_format.clone())?;
            if state.debug {
                info!(
                    "[debug] round {} request: {}",
                    round + 1,
                    serde_json::to_string(&request)?
                );
            }

            let model = self.model.as_ref();
            let request = &request;
            let completion = retry_api_call(&self.config.retry, move || model.chat(request)).await?;
            state.model_calls += 1;
            usage.record(completion.usage.as_ref());
            let content = completion.content.unwrap_or_default();

            // ── Terminal answer ──
            if completion.tool_calls.is_empty() {
                debug!("Round {}: final answer ({} chars)", round + 1, content.len());
                state.messages.push(AgentMessage::ai(content.clone()));
                let verdict = plan.check_final(&content);
                record_validation(&mut state, &verdict, ValidationPoint::FinalResponse, None);

                let Verdict::Failed(failure) = verdict else {
                    finished = true;
                    break;
                };
                failures += 1;
                if failures > self.config.max_validation_retries {
                    return Err(exhausted(failure, failures));
                }
                warn!(
                    "Final answer failed validation (attempt {}/{}): {failure}. Re-prompting.",
                    failures, self.config.max_validation_retries
                );
                state
                    .messages
                    .push(AgentMessage::human(corrective_prompt(&failure, &plan)));
                continue;
            }

            // ── Tool calls ──
            debug!(
                "Round {}: {} tool call(s)",
                round + 1,
                completion.tool_calls.len()
            );
            state
                .messages
                .push(AgentMessage::ai_tool_calls(content, completion.tool_calls.clone()));

            let outputs = self.execute_tool_calls(&completion.tool_calls).await;
            let mut last_failure = None;
            for (call, mut output) in completion.tool_calls.iter().zip(outputs) {
                let verdict = plan.check_tool_return(&output)?;
                record_validation(
                    &mut state,
                    &verdict,
                    ValidationPoint::ToolReturn,
                    Some(&call.function.name),
                );
                if let Verdict::Failed(failure) = verdict {
                    failures += 1;
                    warn!(
                        "Tool {} returned output that failed validation: {failure}",
                        call.function.name
                    );
                    output = format!(
                        "{output}\n\nError: {failure}. The result must be a JSON object with the fields: {}.",
                        field_list(&failure.schema, &plan)
                    );
                    last_failure = Some(failure);
                }
                state.messages.push(AgentMessage::tool(
                    call.id.clone(),
                    call.function.name.clone(),
                    output,
                ));
            }
            if let Some(failure) = last_failure
                && failures > self.config.max_validation_retries
            {
                return Err(exhausted(failure, failures));
            }
        }

        if !finished {
            warn!(
                "Round limit reached ({}) without a final answer: trace_id={}",
                self.config.max_rounds, trace_id
            );
        }

        info!(
            "Agent run completed: trace_id={}, rounds={}, tokens={} (prompt={}, completion={}), validations={}, hook_failures={}",
            trace_id,
            state.model_calls,
            usage.total_tokens(),
            usage.prompt_tokens,
            usage.completion_tokens,
            state.validations.len(),
            state.hook_failures.len(),
        );

        let structured_response = if finished {
            plan.into_structured_response()
        } else {
            None
        };

        Ok(InvocationResult {
            messages: state.messages,
            structured_response,
            trace_id,
            rounds_used: state.model_calls,
            validations: state.validations,
            hook_failures: state.hook_failures,
        })
    }

    /// [`invoke`](Self::invoke) followed by
    /// [`format_response`] with this agent's role mapper.
    pub async fn invoke_formatted(
        &self,
        messages: Vec<AgentMessage>,
        options: InvocationOptions,
    ) -> Result<CanonicalOutputRecord, Error> {
        let result = self.invoke(messages, options).await?;
        Ok(format_response(result, &self.role_mapper())?)
    }

    /// One-shot JSON mode call through this agent's model and config.
    /// See [`invoke_json_mode`].
    pub async fn invoke_json_mode(
        &self,
        schema: &StructuredSchema,
        prompt: &str,
    ) -> Result<Map<String, Value>, Error> {
        invoke_json_mode(self.model.as_ref(), &self.config, schema, prompt).await
    }

    fn build_request(
        &self,
        messages: &[AgentMessage],
        tools: Option<Vec<ToolDef>>,
        response_format: Option<ResponseFormat>,
    ) -> Result<ChatRequest, FormatError> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if let Some(prompt) = &self.config.system_prompt
            && !messages.iter().any(|m| m.kind == MessageKind::System)
        {
            wire.push(Message::system(prompt));
        }
        for message in messages {
            wire.push(message.to_wire()?);
        }
        Ok(ChatRequest {
            model: self.config.model.clone(),
            messages: wire,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            tools,
            response_format,
            extra: self.config.extra_body.clone(),
        })
    }

    /// Execute a round's tool calls, concurrently unless configured
    /// otherwise. Results come back in call order.
    async fn execute_tool_calls(&self, calls: &[ToolCall]) -> Vec<String> {
        if self.config.sequential_tools || calls.len() < 2 {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(
                    self.tools
                        .execute(&call.function.name, &call.function.arguments)
                        .await,
                );
            }
            results
        } else {
            let futures = calls
                .iter()
                .map(|call| self.tools.execute(&call.function.name, &call.function.arguments));
            futures::future::join_all(futures).await
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn record_validation(
    state: &mut RunState,
    verdict: &Verdict,
    point: ValidationPoint,
    tool: Option<&str>,
) {
    if let Some(event) = verdict.event(point, tool) {
        debug!(
            "Validation: point={}, passed={}, tool={}",
            event.point,
            event.passed,
            event.tool.as_deref().unwrap_or("-")
        );
        state.validations.push(event);
    }
}

fn exhausted(failure: SchemaValidationFailure, failures: u32) -> Error {
    warn!("Structured output still invalid after {failures} failed validation(s); giving up");
    Error::Validation(failure)
}

fn field_list(schema: &str, plan: &EnforcementPlan) -> String {
    [plan.agent_level(), plan.tool_level()]
        .into_iter()
        .flatten()
        .find(|s| s.name == schema)
        .map(|s| s.field_names().join(", "))
        .unwrap_or_default()
}

fn corrective_prompt(failure: &SchemaValidationFailure, plan: &EnforcementPlan) -> String {
    format!(
        "Your previous answer did not match the required {} format ({}). \
         Reply with only a JSON object containing the fields: {}.",
        failure.schema,
        failure.errors.join("; "),
        field_list(&failure.schema, plan)
    )
}
