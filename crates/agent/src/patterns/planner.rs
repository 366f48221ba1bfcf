//! Planner agent — turns a goal into an ordered list of tool calls.
//!
//! The model is shown every registered tool and asked for a JSON array of
//! `{"tool": ..., "args": {...}}` objects. Prose around the array is
//! tolerated; the first balanced `[...]` in the reply is decoded.

use async_trait::async_trait;
use chrono::Utc;
use clawloop_core::agent::{Agent, AgentDescription};
use clawloop_core::error::{Error, Result};
use clawloop_core::event::{DomainEvent, EventBus};
use clawloop_core::message::Message;
use clawloop_core::provider::Provider;
use clawloop_core::result::CallResult;
use clawloop_core::state::AgentState;
use clawloop_core::task::ExecContext;
use clawloop_core::tool::ToolRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// State key the most recent plan is stored under.
pub const PLAN_STATE_KEY: &str = "plan";

const PLANNER_SYSTEM_PROMPT: &str =
    "You are a planning agent that creates a sequence of tool calls to achieve a goal.";

/// One tool invocation in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub tool: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl PlannedStep {
    pub fn new(tool: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }
}

pub type Plan = Vec<PlannedStep>;

/// Locate the first balanced JSON array in `text`.
///
/// Brackets inside string literals are skipped. Returns `None` when there
/// is no `[` or the array never closes.
pub fn extract_plan_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode a plan out of a model reply.
pub fn parse_plan(text: &str) -> Result<Plan> {
    let array = extract_plan_array(text).ok_or_else(|| Error::PlanDecode {
        reason: "no JSON array found in model response".into(),
        content: text.to_string(),
    })?;
    serde_json::from_str(array).map_err(|e| Error::PlanDecode {
        reason: e.to_string(),
        content: text.to_string(),
    })
}

fn planning_prompt(tool_descriptions: &str, goal: &str) -> String {
    format!(
        "Based on the user's goal, create a plan consisting of a sequence of tool calls. \
         Here are the available tools:\n\n{tool_descriptions}\n\nGoal: {goal}\n\n\
         Return ONLY the plan as a JSON array of objects, where each object has a 'tool' \
         and 'args' key. For example: \
         [{{\"tool\": \"add\", \"args\": {{\"a\": 1, \"b\": 2}}}}, \
         {{\"tool\": \"uppercase\", \"args\": {{\"text\": \"done\"}}}}]"
    )
}

/// Asks the model for a plan over the tools in its registry.
pub struct PlannerAgent {
    name: String,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    state: AgentState,
    event_bus: Option<EventBus>,
}

impl PlannerAgent {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            name: "planner".into(),
            provider,
            tools,
            state: AgentState::new(),
            event_bus: None,
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

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Ask the model for a plan toward `goal` and record it in state.
    ///
    /// An empty array is a valid plan.
    pub async fn plan(&self, ctx: &ExecContext, goal: &str) -> Result<Plan> {
        ctx.check()?;
        let prompt = planning_prompt(&self.tools.describe_all(), goal);
        let history = [Message::system(PLANNER_SYSTEM_PROMPT), Message::user(prompt)];

        let reply = ctx
            .run(async { self.provider.generate(&history).await.map_err(Error::from) })
            .await?;
        debug!(agent = %self.name, response = %reply.content, "Planner response");

        let plan = parse_plan(&reply.content)?;
        self.state.set(PLAN_STATE_KEY, serde_json::to_value(&plan)?);

        info!(agent = %self.name, steps = plan.len(), "Plan created");
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::PlanCreated {
                agent: self.name.clone(),
                steps: plan.len(),
                timestamp: Utc::now(),
            });
        }
        Ok(plan)
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> AgentDescription {
        AgentDescription {
            name: self.name.clone(),
            capabilities: vec!["task-planning".into(), "decomposition".into()],
            tools: self.tools.names(),
        }
    }

    fn state(&self) -> &AgentState {
        &self.state
    }

    async fn invoke(&self, ctx: &ExecContext, input: &str) -> Result<CallResult> {
        let plan = self.plan(ctx, input).await?;
        Ok(CallResult::success(serde_json::to_string(&plan)?).with_metadata("steps", plan.len()))
    }
}
