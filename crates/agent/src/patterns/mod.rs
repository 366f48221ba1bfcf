//! Agent patterns — structured execution strategies.
//!
//! 1. **ReAct** — model/tool loop driven by `TOOL_CALL:` directives
//! 2. **Plan-execute** — a planner emits steps, a worker runs them, the
//!    model optionally synthesizes the answer
//! 3. **Orchestrator** — parallel fan-out or sequential piping of agents
//! 4. **Step pipeline** — async functions threading data and state
//!
//! [`AgentRegistry`] builds any of these by name.

pub mod orchestrator;
pub mod pipeline;
pub mod planner;
pub mod react;
pub mod registry;
pub mod step_pipeline;
pub mod worker;

pub use orchestrator::{Orchestrator, ParallelRun, PipedRun};
pub use pipeline::{NO_PLAN_MESSAGE, PlanExecutePipeline};
pub use planner::{Plan, PlannedStep, PlannerAgent, extract_plan_array, parse_plan};
pub use react::{ReactAgent, ToolCallRequest, parse_tool_call};
pub use registry::{AgentFactory, AgentRegistry};
pub use step_pipeline::{PipelineAgent, StepOutput};
pub use worker::WorkerAgent;

#[cfg(test)]
pub(crate) mod test_helpers;
