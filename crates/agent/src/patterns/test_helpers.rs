//! Shared test helpers for pattern tests.

use async_trait::async_trait;
use clawloop_core::agent::Agent;
use clawloop_core::error::{Error, Result};
use clawloop_core::provider::ScriptedProvider;
use clawloop_core::result::CallResult;
use clawloop_core::state::AgentState;
use clawloop_core::task::ExecContext;
use clawloop_core::tool::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// A provider that replies with `replies`, in order.
pub fn scripted<S: AsRef<str>>(replies: &[S]) -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::new(replies.iter().map(|r| r.as_ref().to_string())))
}

/// A model reply requesting `name` with `args`.
pub fn tool_call(name: &str, args: Value) -> String {
    format!(
        "TOOL_CALL: {}",
        serde_json::json!({ "name": name, "arguments": args })
    )
}

/// A registry holding every built-in tool.
pub fn builtin_registry() -> Arc<ToolRegistry> {
    Arc::new(clawloop_tools::default_registry())
}

/// An agent that answers with a fixed transformation of its input.
///
/// Writes `last_input` into its state on every call, optionally sleeps
/// first, and fails when the input contains `fail_on`.
pub struct StubAgent {
    name: String,
    state: AgentState,
    delay: Option<Duration>,
    fail_on: Option<String>,
    suffix: String,
}

impl StubAgent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: AgentState::new(),
            delay: None,
            fail_on: None,
            suffix: format!("+{name}"),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }

    pub fn arc(self) -> Arc<dyn Agent> {
        Arc::new(self)
    }
}

#[async_trait]
impl Agent for StubAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> &AgentState {
        &self.state
    }

    async fn invoke(&self, ctx: &ExecContext, input: &str) -> Result<CallResult> {
        ctx.check()?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.state.set("last_input", input);
        if self.fail_on.as_deref().is_some_and(|m| input.contains(m)) {
            return Err(Error::Internal(format!("{} refused '{input}'", self.name)));
        }
        Ok(CallResult::success(format!("{input}{}", self.suffix)))
    }
}
