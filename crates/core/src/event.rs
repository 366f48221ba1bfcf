//! Domain event system — decoupled observation of the engine.
//!
//! Agents publish events when they call a tool, hear back from the model,
//! finish, or fail. Subscribers (the CLI's trace output, tests) react
//! without the agents knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The model answered one turn of an agent loop
    ModelResponded {
        agent: String,
        iteration: u32,
        requested_tool: bool,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        agent: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A planner produced a plan
    PlanCreated {
        agent: String,
        steps: usize,
        timestamp: DateTime<Utc>,
    },

    /// An agent invocation finished successfully
    AgentCompleted {
        agent: String,
        iterations: u32,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Cloning the bus
/// gives another publisher onto the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Report an error with the context it happened in.
    pub fn error(&self, context: impl Into<String>, error: &dyn std::error::Error) {
        self.publish(DomainEvent::ErrorOccurred {
            context: context.into(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::ToolExecuted {
            agent: "react".into(),
            tool_name: "add".into(),
            success: true,
            duration_ms: 3,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ToolExecuted { tool_name, success, .. } => {
                assert_eq!(tool_name, "add");
                assert!(success);
            }
            _ => panic!("Expected ToolExecuted event"),
        }
    }

    #[tokio::test]
    async fn cloned_bus_shares_subscribers() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let publisher = bus.clone();

        publisher.error("planner", &crate::error::Error::Canceled);

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.as_ref(),
            DomainEvent::ErrorOccurred { context, .. } if context == "planner"
        ));
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::PlanCreated {
            agent: "planner".into(),
            steps: 0,
            timestamp: Utc::now(),
        });
    }
}
