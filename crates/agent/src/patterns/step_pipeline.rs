//! Step pipeline — an agent built from async functions run in sequence.
//!
//! Each step receives the previous step's data and the current state, and
//! may hand back a replacement state for the steps after it. The first step
//! sees the input text as a JSON string. When the run succeeds the final
//! state is written back into the agent's own state; a failing step leaves
//! it as it was, apart from writes made directly through the handle.

use async_trait::async_trait;
use clawloop_core::agent::{Agent, AgentDescription};
use clawloop_core::error::{Error, Result};
use clawloop_core::result::CallResult;
use clawloop_core::state::AgentState;
use clawloop_core::task::ExecContext;
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use super::worker::render_output;

/// What a step hands to the next one.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub data: Value,

    /// Replaces the state seen by later steps when set.
    pub state: Option<AgentState>,
}

impl StepOutput {
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            state: None,
        }
    }

    pub fn with_state(mut self, state: AgentState) -> Self {
        self.state = Some(state);
        self
    }
}

type StepFn = Arc<dyn Fn(ExecContext, Value, AgentState) -> BoxFuture<'static, Result<StepOutput>> + Send + Sync>;

struct Step {
    name: String,
    run: StepFn,
}

pub struct PipelineAgent {
    name: String,
    steps: Vec<Step>,
    state: AgentState,
}

impl PipelineAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            state: AgentState::new(),
        }
    }

    /// Append a step.
    pub fn with_step<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ExecContext, Value, AgentState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepOutput>> + Send + 'static,
    {
        let run: StepFn = Arc::new(move |ctx, data, state| Box::pin(f(ctx, data, state)));
        self.steps.push(Step {
            name: name.into(),
            run,
        });
        self
    }

    pub fn with_state(mut self, state: AgentState) -> Self {
        self.state = state;
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    async fn run(&self, ctx: &ExecContext, input: &str) -> Result<CallResult> {
        let mut data = Value::String(input.to_string());
        let mut current = self.state.clone();

        for (i, step) in self.steps.iter().enumerate() {
            let index = i + 1;
            ctx.check()?;
            debug!(agent = %self.name, index, step = %step.name, "Running pipeline step");

            let output = ctx
                .run((step.run)(ctx.clone(), data, current.clone()))
                .await
                .map_err(|e| {
                    if e.is_cancellation() {
                        e
                    } else {
                        Error::StepExecution {
                            index,
                            tool: step.name.clone(),
                            source: Box::new(e),
                        }
                    }
                })?;
            data = output.data;
            if let Some(state) = output.state {
                current = state;
            }
        }

        if !current.ptr_eq(&self.state) {
            self.state.restore(current.serialize());
        }
        info!(agent = %self.name, steps = self.steps.len(), "Pipeline completed");

        Ok(CallResult::success(render_output(&data))
            .with_metadata("agent", self.name.clone())
            .with_metadata("pipeline", true)
            .with_metadata("steps", self.steps.len())
            .with_metadata("state", self.state.serialize()))
    }
}

#[async_trait]
impl Agent for PipelineAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> AgentDescription {
        AgentDescription {
            name: self.name.clone(),
            capabilities: vec!["pipeline".into()],
            tools: self.steps.iter().map(|s| s.name.clone()).collect(),
        }
    }

    fn state(&self) -> &AgentState {
        &self.state
    }

    async fn invoke(&self, ctx: &ExecContext, input: &str) -> Result<CallResult> {
        self.run(ctx, input).await
    }
}
