//! # ClawLoop Core
//!
//! Domain types, traits, and error definitions for the ClawLoop agent
//! execution engine. Every other crate in the workspace depends inward on
//! this one.
//!
//! ## Design Philosophy
//!
//! The collaborators the engine talks to (model clients, tools, agents) are
//! defined here as traits. Implementations live in their respective crates.
//! This enables:
//! - Swapping model clients without touching agent code
//! - Easy testing with scripted providers and in-memory state
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod result;
pub mod state;
pub mod task;
pub mod tool;
pub mod trail;

// Re-export key types at crate root for ergonomics
pub use agent::{Agent, AgentDescription, spawn_invoke, spawn_on_message};
pub use error::{Error, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationHistory, ConversationId, Message, Role};
pub use provider::{Provider, ScriptedProvider, StreamChunk};
pub use result::CallResult;
pub use state::{AgentState, InMemoryStateStore, StateStore};
pub use task::{ExecContext, TaskHandle, race, spawn};
pub use tool::{
    FnTool, NoArgs, RegistryStats, Tool, ToolDefinition, ToolInput, ToolMetadata, ToolRegistry,
    object_schema,
};
pub use trail::{ExecutionTrail, StateMessage, TrailEntry};
