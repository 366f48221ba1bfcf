//! Worker agent — executes individual plan steps against the tool registry.

use async_trait::async_trait;
use clawloop_core::agent::{Agent, AgentDescription};
use clawloop_core::error::{Error, Result};
use clawloop_core::result::CallResult;
use clawloop_core::state::AgentState;
use clawloop_core::task::ExecContext;
use clawloop_core::tool::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::planner::PlannedStep;

/// Render a tool result as step output text.
///
/// Strings are taken as-is; anything else is its JSON encoding.
pub(crate) fn render_output(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct WorkerAgent {
    name: String,
    tools: Arc<ToolRegistry>,
    state: AgentState,
}

impl WorkerAgent {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            name: "worker".into(),
            tools,
            state: AgentState::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_state(mut self, state: AgentState) -> Self {
        self.state = state;
        self
    }

    /// Run step `index` (1-based) of a plan.
    ///
    /// Failures are wrapped with the step index and tool name; cancellation
    /// passes through unchanged.
    pub async fn execute(&self, ctx: &ExecContext, index: usize, step: &PlannedStep) -> Result<Value> {
        debug!(agent = %self.name, index, tool = %step.tool, "Executing step");
        let args = Value::Object(step.args.clone());
        let outcome = ctx
            .run(async {
                self.tools
                    .call_value(&step.tool, args, &self.state)
                    .await
                    .map_err(Error::from)
            })
            .await;

        outcome.map_err(|e| {
            if e.is_cancellation() {
                e
            } else {
                Error::StepExecution {
                    index,
                    tool: step.tool.clone(),
                    source: Box::new(e),
                }
            }
        })
    }
}

#[async_trait]
impl Agent for WorkerAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> AgentDescription {
        AgentDescription {
            name: self.name.clone(),
            capabilities: vec!["tool-execution".into()],
            tools: self.tools.names(),
        }
    }

    fn state(&self) -> &AgentState {
        &self.state
    }

    /// Input is `tool:{json args}`; an empty argument part means no arguments.
    async fn invoke(&self, ctx: &ExecContext, input: &str) -> Result<CallResult> {
        ctx.check()?;
        let (tool, args) = input.split_once(':').unwrap_or((input, ""));
        let tool = tool.trim();
        let args = args.trim();

        let value = ctx
            .run(async {
                self.tools
                    .call(tool, args, &self.state)
                    .await
                    .map_err(Error::from)
            })
            .await?;
        Ok(CallResult::success(render_output(&value)).with_metadata("tool", tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_helpers::builtin_registry;
    use clawloop_core::error::ToolError;
    use serde_json::json;

    fn step(tool: &str, args: Value) -> PlannedStep {
        match args {
            Value::Object(map) => PlannedStep::new(tool, map),
            _ => panic!("step args must be an object"),
        }
    }

    #[tokio::test]
    async fn executes_step_against_registry() {
        let worker = WorkerAgent::new(builtin_registry());
        let out = worker
            .execute(&ExecContext::new(), 1, &step("multiply", json!({"a": 6, "b": 7})))
            .await
            .unwrap();
        assert_eq!(out, json!(42));
    }

    #[tokio::test]
    async fn failure_carries_index_and_tool() {
        let worker = WorkerAgent::new(builtin_registry());
        let err = worker
            .execute(&ExecContext::new(), 2, &step("divide", json!({"a": 1, "b": 0})))
            .await
            .unwrap_err();

        assert_eq!(err.to_string().split(':').next(), Some("Execution of step 2 ('divide') failed"));
        let Error::StepExecution { index, tool, source } = err else {
            panic!("expected StepExecution");
        };
        assert_eq!((index, tool.as_str()), (2, "divide"));
        assert!(matches!(*source, Error::Tool(ToolError::ExecutionFailed { .. })));
    }

    #[tokio::test]
    async fn canceled_step_is_not_wrapped() {
        let worker = WorkerAgent::new(builtin_registry());
        let ctx = ExecContext::new();
        ctx.cancel();
        let err = worker
            .execute(&ctx, 1, &step("add", json!({"a": 1, "b": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Canceled));
    }

    #[tokio::test]
    async fn invoke_parses_tool_and_arguments() {
        let worker = WorkerAgent::new(builtin_registry());
        let ctx = ExecContext::new();

        let result = worker.invoke(&ctx, r#"uppercase:{"text":"shout"}"#).await.unwrap();
        assert_eq!(result.output, "SHOUT");
        assert_eq!(result.metadata["tool"], json!("uppercase"));

        let result = worker.invoke(&ctx, r#"add:{"a":40,"b":2}"#).await.unwrap();
        assert_eq!(result.output, "42");
    }

    #[tokio::test]
    async fn invoke_without_arguments() {
        let worker = WorkerAgent::new(builtin_registry());
        let result = worker.invoke(&ExecContext::new(), "note_list").await.unwrap();
        assert_eq!(result.output, "[]");
    }

    #[tokio::test]
    async fn invoke_unknown_tool_fails() {
        let worker = WorkerAgent::new(builtin_registry());
        let err = worker.invoke(&ExecContext::new(), "nope:{}").await.unwrap_err();
        assert!(matches!(err, Error::Tool(ToolError::NotFound(_))));
    }
}
