//! Agent trait — anything that turns an input into a [`CallResult`].
//!
//! `invoke` is the awaiting form. [`spawn_invoke`] and [`spawn_on_message`]
//! are the spawned forms: they start the work as an independent task and
//! hand back a single-value [`TaskHandle`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::result::CallResult;
use crate::state::AgentState;
use crate::task::{self, ExecContext, TaskHandle};
use crate::trail::StateMessage;

/// What an agent is and what it can do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDescription {
    pub name: String,
    pub capabilities: Vec<String>,
    pub tools: Vec<String>,
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn describe(&self) -> AgentDescription {
        AgentDescription {
            name: self.name().to_string(),
            ..Default::default()
        }
    }

    /// The agent's own key/value state.
    fn state(&self) -> &AgentState;

    /// Run the agent on `input`.
    async fn invoke(&self, ctx: &ExecContext, input: &str) -> Result<CallResult>;

    /// Answer a message from another agent.
    ///
    /// Default implementation invokes the agent on the message text and
    /// replies with its output.
    async fn on_message(&self, ctx: &ExecContext, message: &StateMessage) -> Result<StateMessage> {
        let output = self.invoke(ctx, &message.message).await?.into_result()?;
        Ok(message.reply(self.name(), output))
    }
}

/// Spawned form of [`Agent::invoke`].
pub fn spawn_invoke(
    agent: Arc<dyn Agent>,
    ctx: &ExecContext,
    input: impl Into<String>,
) -> TaskHandle<CallResult> {
    let input = input.into();
    let label = format!("{}:invoke", agent.name());
    let inner = ctx.clone();
    task::spawn(ctx, label, async move { agent.invoke(&inner, &input).await })
}

/// Spawned form of [`Agent::on_message`].
pub fn spawn_on_message(
    agent: Arc<dyn Agent>,
    ctx: &ExecContext,
    message: StateMessage,
) -> TaskHandle<StateMessage> {
    let label = format!("{}:on_message", agent.name());
    let inner = ctx.clone();
    task::spawn(ctx, label, async move { agent.on_message(&inner, &message).await })
}
