//! Agent patterns for ClawLoop.
//!
//! The single-agent loop follows a **Think → Act → Observe** cycle:
//!
//! 1. **Seed** the conversation with the user prompt
//! 2. **Ask the model** with the full history
//! 3. **If the reply is a tool call**: run the tool, append the result, loop back to step 2
//! 4. **Otherwise**: the reply is the answer
//!
//! On top of that loop sit the plan-execute pipeline (planner → worker →
//! synthesis) and the orchestrator, which runs several agents in parallel
//! or as a pipe. A step pipeline chains plain async functions, and an
//! agent registry builds agents by name.

pub mod patterns;

pub use patterns::{
    AgentFactory, AgentRegistry, NO_PLAN_MESSAGE, Orchestrator, ParallelRun, PipedRun,
    PipelineAgent, Plan, PlanExecutePipeline, PlannedStep, PlannerAgent, ReactAgent, StepOutput,
    ToolCallRequest, WorkerAgent, extract_plan_array, parse_plan, parse_tool_call,
};
