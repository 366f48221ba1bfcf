//! ReAct pattern — Think → Act → Observe loop.
//!
//! The model either answers directly or replies with a tool-call directive:
//!
//! ```text
//! TOOL_CALL: {"name": "add", "arguments": {"a": 2, "b": 3}}
//! ```
//!
//! The tool result is appended to the conversation as a system message
//! holding its JSON encoding, and the model is asked again. The loop ends on
//! the first reply without the prefix, or fails with
//! [`Error::IterationExceeded`] once the model has been called
//! `max_iterations` times without answering.

use async_trait::async_trait;
use chrono::Utc;
use clawloop_config::{AgentSettings, DEFAULT_MAX_ITERATIONS, DEFAULT_TOOL_CALL_PREFIX};
use clawloop_core::agent::{Agent, AgentDescription};
use clawloop_core::error::{Error, Result, ToolError};
use clawloop_core::event::{DomainEvent, EventBus};
use clawloop_core::message::{ConversationHistory, Message};
use clawloop_core::provider::Provider;
use clawloop_core::result::CallResult;
use clawloop_core::state::AgentState;
use clawloop_core::task::ExecContext;
use clawloop_core::tool::ToolRegistry;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A parsed tool-call directive.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,

    /// An object, or a JSON-encoded string holding one.
    #[serde(default)]
    pub arguments: Value,
}

/// Parse a model reply as a tool-call directive.
///
/// Returns `None` when the reply does not start with `prefix` (a final
/// answer), and `Some(Err(MalformedToolCall))` when it does but the JSON
/// that follows is unusable. Text after the JSON object is ignored.
pub fn parse_tool_call(prefix: &str, content: &str) -> Option<Result<ToolCallRequest>> {
    let rest = content.trim_start().strip_prefix(prefix)?;
    let malformed = |reason: String| Error::MalformedToolCall {
        content: content.to_string(),
        reason,
    };

    let parsed = serde_json::Deserializer::from_str(rest)
        .into_iter::<ToolCallRequest>()
        .next();
    Some(match parsed {
        None => Err(malformed("no JSON object after the tool-call prefix".into())),
        Some(Err(e)) => Err(malformed(e.to_string())),
        Some(Ok(call)) if call.name.trim().is_empty() => {
            Err(malformed("tool call has an empty name".into()))
        }
        Some(Ok(call)) => Ok(call),
    })
}

/// A single agent driving the model/tool loop.
pub struct ReactAgent {
    name: String,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    state: AgentState,
    max_iterations: u32,
    tool_call_prefix: String,
    system_prompt: Option<String>,
    timeout: Option<Duration>,
    event_bus: Option<EventBus>,
}

impl ReactAgent {
    /// Create a new ReAct agent with default settings.
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            name: "react".into(),
            provider,
            tools,
            state: AgentState::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_call_prefix: DEFAULT_TOOL_CALL_PREFIX.into(),
            system_prompt: None,
            timeout: None,
            event_bus: None,
        }
    }

    /// Apply the `[agent]` section of the engine configuration.
    pub fn with_settings(mut self, settings: &AgentSettings) -> Self {
        self.max_iterations = settings.max_iterations;
        self.tool_call_prefix = settings.tool_call_prefix.clone();
        self.system_prompt = settings.system_prompt.clone();
        self.timeout = settings.timeout();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set max iterations.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Bound each invocation; the caller's deadline still applies if earlier.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Share state with another agent or with the caller.
    pub fn with_state(mut self, state: AgentState) -> Self {
        self.state = state;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Execute the loop on one prompt with a fresh conversation.
    pub async fn run(&self, ctx: &ExecContext, prompt: &str) -> Result<CallResult> {
        let result = match self.timeout {
            Some(timeout) => self.run_loop(&ctx.child().with_timeout(timeout), prompt).await,
            None => self.run_loop(ctx, prompt).await,
        };
        if let Err(e) = &result {
            warn!(agent = %self.name, error = %e, "ReAct loop failed");
            if let Some(bus) = &self.event_bus {
                bus.error(&self.name, e);
            }
        }
        result
    }

    async fn run_loop(&self, ctx: &ExecContext, prompt: &str) -> Result<CallResult> {
        let mut history = ConversationHistory::new();
        if let Some(system) = &self.system_prompt {
            history.push(Message::system(system.as_str()));
        }
        history.push(Message::user(prompt));

        info!(agent = %self.name, max_iter = self.max_iterations, "ReAct loop starting");
        let mut tool_calls = 0u32;

        for iteration in 1..=self.max_iterations {
            ctx.check()?;
            debug!(agent = %self.name, iteration, "ReAct iteration");

            // ── Ask the model ──
            let reply = ctx
                .run(async {
                    self.provider
                        .generate(history.messages())
                        .await
                        .map_err(Error::from)
                })
                .await?;
            let content = reply.content.clone();
            history.push(reply);

            let request = parse_tool_call(&self.tool_call_prefix, &content);
            self.publish(DomainEvent::ModelResponded {
                agent: self.name.clone(),
                iteration,
                requested_tool: request.is_some(),
                timestamp: Utc::now(),
            });

            // ── Final answer ──
            let Some(request) = request else {
                info!(agent = %self.name, iterations = iteration, tool_calls, "ReAct loop completed");
                self.publish(DomainEvent::AgentCompleted {
                    agent: self.name.clone(),
                    iterations: iteration,
                    timestamp: Utc::now(),
                });
                return Ok(CallResult::success(content)
                    .with_metadata("agent", self.name.clone())
                    .with_metadata("iterations", iteration)
                    .with_metadata("tool_calls", tool_calls)
                    .with_metadata("history_len", history.len()));
            };

            // ── Run the requested tool ──
            let request = request?;
            tool_calls += 1;
            let start = Instant::now();
            let outcome = ctx
                .run(async { self.dispatch(&request).await.map_err(Error::from) })
                .await;
            self.publish(DomainEvent::ToolExecuted {
                agent: self.name.clone(),
                tool_name: request.name.clone(),
                success: outcome.is_ok(),
                duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                timestamp: Utc::now(),
            });
            let value = outcome?;

            // ── Observe ──
            history.push(
                Message::system(serde_json::to_string(&value)?)
                    .with_metadata("tool", json!(request.name)),
            );
        }

        warn!(agent = %self.name, "ReAct: max iterations reached ({})", self.max_iterations);
        Err(Error::IterationExceeded {
            agent: self.name.clone(),
            max_iterations: self.max_iterations,
        })
    }

    async fn dispatch(&self, request: &ToolCallRequest) -> std::result::Result<Value, ToolError> {
        debug!(tool = %request.name, "Dispatching tool call");
        match &request.arguments {
            Value::String(encoded) => self.tools.call(&request.name, encoded, &self.state).await,
            args => {
                self.tools
                    .call_value(&request.name, args.clone(), &self.state)
                    .await
            }
        }
    }
}

#[async_trait]
impl Agent for ReactAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> AgentDescription {
        AgentDescription {
            name: self.name.clone(),
            capabilities: vec!["reasoning".into(), "tool-use".into()],
            tools: self.tools.names(),
        }
    }

    fn state(&self) -> &AgentState {
        &self.state
    }

    async fn invoke(&self, ctx: &ExecContext, input: &str) -> Result<CallResult> {
        self.run(ctx, input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_helpers::{builtin_registry, scripted, tool_call};
    use clawloop_core::error::ProviderError;
    use clawloop_core::message::Role;
    use clawloop_core::provider::ScriptedProvider;

    #[test]
    fn plain_reply_is_not_a_tool_call() {
        assert!(parse_tool_call("TOOL_CALL:", "The answer is 4.").is_none());
    }

    #[test]
    fn parses_object_and_string_arguments() {
        let call = parse_tool_call("TOOL_CALL:", r#"TOOL_CALL: {"name":"add","arguments":{"a":1,"b":2}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(call.name, "add");
        assert_eq!(call.arguments, json!({"a": 1, "b": 2}));

        let call = parse_tool_call(
            "TOOL_CALL:",
            r#"TOOL_CALL:{"name":"add","arguments":"{\"a\":1,\"b\":2}"} trailing words"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(call.arguments, json!(r#"{"a":1,"b":2}"#));
    }

    #[test]
    fn malformed_directive_is_reported() {
        for bad in ["TOOL_CALL: {not json", "TOOL_CALL:", r#"TOOL_CALL: {"name":"","arguments":{}}"#] {
            let err = parse_tool_call("TOOL_CALL:", bad).unwrap().unwrap_err();
            assert!(matches!(err, Error::MalformedToolCall { .. }), "{bad}");
        }
    }

    #[tokio::test]
    async fn plain_answer_terminates_in_one_iteration() {
        let provider = scripted(&["Paris."]);
        let agent = ReactAgent::new(provider.clone(), builtin_registry());

        let result = agent.invoke(&ExecContext::new(), "Capital of France?").await.unwrap();

        assert_eq!(result.output, "Paris.");
        assert_eq!(result.metadata["iterations"], json!(1));
        assert_eq!(result.metadata["tool_calls"], json!(0));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_result_is_appended_as_system_json() {
        let provider = scripted(&[tool_call("add", json!({"a": 2, "b": 3})), "It is 5.".into()]);
        let agent = ReactAgent::new(provider.clone(), builtin_registry());

        let result = agent.invoke(&ExecContext::new(), "2 + 3?").await.unwrap();
        assert_eq!(result.output, "It is 5.");
        assert_eq!(result.metadata["tool_calls"], json!(1));

        let histories = provider.histories();
        let second = &histories[1];
        assert_eq!(second.len(), 3);
        assert_eq!(second[0].role, Role::User);
        assert_eq!(second[1].role, Role::Assistant);
        assert_eq!(second[2].role, Role::System);
        assert_eq!(second[2].content, "5");
    }

    #[tokio::test]
    async fn exact_iteration_bound() {
        let replies: Vec<String> = (0..10)
            .map(|_| tool_call("uppercase", json!({"text": "again"})))
            .collect();
        let provider = scripted(&replies);
        let agent = ReactAgent::new(provider.clone(), builtin_registry()).with_max_iterations(3);

        let err = agent.invoke(&ExecContext::new(), "loop").await.unwrap_err();
        assert!(matches!(
            err,
            Error::IterationExceeded { max_iterations: 3, .. }
        ));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn answer_on_last_allowed_iteration_succeeds() {
        let provider = scripted(&[
            tool_call("reverse", json!({"text": "ab"})),
            tool_call("reverse", json!({"text": "ba"})),
            "done".into(),
        ]);
        let agent = ReactAgent::new(provider, builtin_registry()).with_max_iterations(3);
        let result = agent.invoke(&ExecContext::new(), "go").await.unwrap();
        assert_eq!(result.metadata["iterations"], json!(3));
    }

    #[tokio::test]
    async fn unknown_tool_fails_fast() {
        let provider = scripted(&[tool_call("teleport", json!({})), "unreachable".into()]);
        let agent = ReactAgent::new(provider.clone(), builtin_registry());

        let err = agent.invoke(&ExecContext::new(), "go").await.unwrap_err();
        assert!(matches!(err, Error::Tool(ToolError::NotFound(ref n)) if n == "teleport"));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_error_is_not_swallowed() {
        let provider = scripted(&[tool_call("divide", json!({"a": 1, "b": 0}))]);
        let agent = ReactAgent::new(provider, builtin_registry());
        let err = agent.invoke(&ExecContext::new(), "1/0").await.unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[tokio::test]
    async fn model_failure_is_distinct_from_iteration_limit() {
        let provider = Arc::new(ScriptedProvider::with_replies([Err(ProviderError::NoResponse)]));
        let agent = ReactAgent::new(provider, builtin_registry());
        let err = agent.invoke(&ExecContext::new(), "hi").await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::NoResponse)));
    }

    #[tokio::test]
    async fn stateful_tool_writes_agent_state() {
        let provider = scripted(&[
            tool_call("note_set", json!(r#"{"key":"city","content":"Lyon"}"#)),
            "Saved.".into(),
        ]);
        let agent = ReactAgent::new(provider, builtin_registry());
        agent.invoke(&ExecContext::new(), "remember Lyon").await.unwrap();
        assert_eq!(agent.state().get("note.city"), Some(json!("Lyon")));
    }

    #[tokio::test]
    async fn system_prompt_leads_the_history() {
        let provider = scripted(&["ok"]);
        let agent = ReactAgent::new(provider.clone(), builtin_registry()).with_system_prompt("Be brief.");
        agent.invoke(&ExecContext::new(), "hi").await.unwrap();

        let first = &provider.histories()[0];
        assert_eq!(first[0].role, Role::System);
        assert_eq!(first[0].content, "Be brief.");
        assert_eq!(first[1].content, "hi");
    }

    #[tokio::test]
    async fn canceled_context_stops_before_model_call() {
        let provider = scripted(&["never"]);
        let agent = ReactAgent::new(provider.clone(), builtin_registry());
        let ctx = ExecContext::new();
        ctx.cancel();

        let err = agent.invoke(&ctx, "hi").await.unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn events_are_published() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();
        let provider = scripted(&[tool_call("add", json!({"a": 1, "b": 1})), "2".into()]);
        let agent = ReactAgent::new(provider, builtin_registry()).with_event_bus(bus);
        agent.invoke(&ExecContext::new(), "1+1").await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event.as_ref() {
                DomainEvent::ModelResponded { .. } => "model",
                DomainEvent::ToolExecuted { .. } => "tool",
                DomainEvent::AgentCompleted { .. } => "done",
                _ => "other",
            });
        }
        assert_eq!(kinds, ["model", "tool", "model", "done"]);
    }

    #[test]
    fn describe_lists_tools() {
        let agent = ReactAgent::new(scripted::<&str>(&[]), builtin_registry()).with_name("solver");
        let desc = agent.describe();
        assert_eq!(desc.name, "solver");
        assert!(desc.tools.contains(&"calculator".to_string()));
    }

    #[test]
    fn settings_are_applied() {
        let settings = AgentSettings {
            max_iterations: 4,
            tool_call_prefix: "CALL>".into(),
            temperature: 0.2,
            system_prompt: Some("sys".into()),
            timeout_secs: 3,
        };
        let agent = ReactAgent::new(scripted::<&str>(&[]), builtin_registry()).with_settings(&settings);
        assert_eq!(agent.max_iterations(), 4);
        assert_eq!(agent.tool_call_prefix, "CALL>");
        assert_eq!(agent.timeout, Some(Duration::from_secs(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn agent_timeout_bounds_a_slow_model() {
        let provider = Arc::new(ScriptedProvider::new(["late"]).with_delay(Duration::from_secs(30)));
        let agent = ReactAgent::new(provider, builtin_registry()).with_timeout(Duration::from_secs(1));
        let ctx = ExecContext::new();

        let err = agent.invoke(&ctx, "hurry").await.unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded));
        assert!(!ctx.is_cancelled());
    }
}
