//! Plan-execute pipeline.
//!
//! Planner → worker (each step in order) → optional synthesis. Any step
//! failure aborts the run and the results gathered so far are dropped.

use async_trait::async_trait;
use chrono::Utc;
use clawloop_config::PipelineSettings;
use clawloop_core::agent::{Agent, AgentDescription};
use clawloop_core::error::{Error, Result};
use clawloop_core::event::{DomainEvent, EventBus};
use clawloop_core::message::Message;
use clawloop_core::provider::Provider;
use clawloop_core::result::CallResult;
use clawloop_core::state::AgentState;
use clawloop_core::task::ExecContext;
use clawloop_core::tool::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::planner::{Plan, PlannedStep, PlannerAgent};
use super::worker::{WorkerAgent, render_output};

/// Output of a run whose plan has no steps.
pub const NO_PLAN_MESSAGE: &str = "No plan was generated to achieve the goal.";

const SYNTHESIS_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers questions based on provided context.";

fn synthesis_prompt(information: &str, goal: &str) -> String {
    format!(
        "Based on the following information, please provide a direct answer to the user's \
         original question.\n\nInformation:\n{information}\n\nOriginal Question: {goal}"
    )
}

pub struct PlanExecutePipeline {
    name: String,
    planner: PlannerAgent,
    worker: WorkerAgent,
    provider: Arc<dyn Provider>,
    synthesize: bool,
    forward_output_key: Option<String>,
    state: AgentState,
    event_bus: Option<EventBus>,
}

impl PlanExecutePipeline {
    /// Build a pipeline whose planner, worker and synthesis step share one
    /// provider, registry and state.
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        let state = AgentState::new();
        Self {
            name: "plan-execute".into(),
            planner: PlannerAgent::new(provider.clone(), tools.clone()).with_state(state.clone()),
            worker: WorkerAgent::new(tools).with_state(state.clone()),
            provider,
            synthesize: true,
            forward_output_key: None,
            state,
            event_bus: None,
        }
    }

    /// Apply the `[pipeline]` section of the engine configuration.
    pub fn with_settings(mut self, settings: &PipelineSettings) -> Self {
        self.synthesize = settings.synthesize;
        self.forward_output_key = settings.forward_output_key.clone();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_synthesis(mut self, enabled: bool) -> Self {
        self.synthesize = enabled;
        self
    }

    /// Write each step's output into argument `key` of the following step.
    ///
    /// Objects and arrays are forwarded as JSON. Scalars are forwarded as
    /// their rendered text, so a numeric result can feed a text tool.
    pub fn with_forward_output_key(mut self, key: impl Into<String>) -> Self {
        self.forward_output_key = Some(key.into());
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.planner = self.planner.with_event_bus(bus.clone());
        self.event_bus = Some(bus);
        self
    }

    pub fn planner(&self) -> &PlannerAgent {
        &self.planner
    }

    pub fn worker(&self) -> &WorkerAgent {
        &self.worker
    }

    /// Plan toward `goal`, execute every step, then answer.
    pub async fn run(&self, ctx: &ExecContext, goal: &str) -> Result<CallResult> {
        let result = self.run_inner(ctx, goal).await;
        if let Err(e) = &result {
            warn!(agent = %self.name, error = %e, "Plan-execute run failed");
            if let Some(bus) = &self.event_bus {
                bus.error(&self.name, e);
            }
        }
        result
    }

    async fn run_inner(&self, ctx: &ExecContext, goal: &str) -> Result<CallResult> {
        let plan = self.planner.plan(ctx, goal).await?;
        if plan.is_empty() {
            info!(agent = %self.name, "Empty plan, nothing to execute");
            return Ok(CallResult::success(NO_PLAN_MESSAGE)
                .with_metadata("agent", self.name.clone())
                .with_metadata("steps", 0));
        }

        let outputs = self.execute_plan(ctx, &plan).await?;
        let rendered: Vec<String> = outputs.iter().map(render_output).collect();

        let answer = if self.synthesize {
            self.synthesize_answer(ctx, goal, &rendered).await?
        } else {
            rendered.last().cloned().unwrap_or_default()
        };

        info!(agent = %self.name, steps = plan.len(), "Plan-execute run completed");
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::AgentCompleted {
                agent: self.name.clone(),
                iterations: u32::try_from(plan.len()).unwrap_or(u32::MAX),
                timestamp: Utc::now(),
            });
        }

        Ok(CallResult::success(answer)
            .with_metadata("agent", self.name.clone())
            .with_metadata("steps", plan.len())
            .with_metadata("plan", serde_json::to_value(&plan)?)
            .with_metadata("step_outputs", rendered))
    }

    async fn execute_plan(&self, ctx: &ExecContext, plan: &Plan) -> Result<Vec<Value>> {
        let mut outputs: Vec<Value> = Vec::with_capacity(plan.len());
        for (i, step) in plan.iter().enumerate() {
            ctx.check()?;
            let step = self.forwarded(step, outputs.last());
            let value = self.worker.execute(ctx, i + 1, &step).await?;
            outputs.push(value);
        }
        Ok(outputs)
    }

    fn forwarded(&self, step: &PlannedStep, previous: Option<&Value>) -> PlannedStep {
        let mut step = step.clone();
        if let (Some(key), Some(prev)) = (&self.forward_output_key, previous) {
            let value = match prev {
                Value::Object(_) | Value::Array(_) => prev.clone(),
                scalar => Value::String(render_output(scalar)),
            };
            step.args.insert(key.clone(), value);
        }
        step
    }

    async fn synthesize_answer(&self, ctx: &ExecContext, goal: &str, outputs: &[String]) -> Result<String> {
        ctx.check()?;
        let history = [
            Message::system(SYNTHESIS_SYSTEM_PROMPT),
            Message::user(synthesis_prompt(&outputs.join("\n"), goal)),
        ];
        let reply = ctx
            .run(async { self.provider.generate(&history).await.map_err(Error::from) })
            .await?;
        Ok(reply.content)
    }
}

#[async_trait]
impl Agent for PlanExecutePipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> AgentDescription {
        let mut desc = self.planner.describe();
        desc.name = self.name.clone();
        desc.capabilities.push("tool-execution".into());
        if self.synthesize {
            desc.capabilities.push("synthesis".into());
        }
        desc
    }

    fn state(&self) -> &AgentState {
        &self.state
    }

    async fn invoke(&self, ctx: &ExecContext, input: &str) -> Result<CallResult> {
        self.run(ctx, input).await
    }
}
