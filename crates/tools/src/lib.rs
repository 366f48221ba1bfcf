//! Built-in tool implementations for ClawLoop.
//!
//! Small, deterministic tools for text, integer arithmetic, expression
//! evaluation, and a scratchpad kept in the agent's own state.

pub mod calculator;
pub mod math;
pub mod notes;
pub mod text;

use clawloop_core::tool::{Tool, ToolRegistry};
use std::sync::Arc;

/// Every built-in tool, in registration order.
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(text::uppercase()),
        Arc::new(text::concatenate()),
        Arc::new(text::reverse()),
        Arc::new(text::palindrome()),
        Arc::new(math::add()),
        Arc::new(math::subtract()),
        Arc::new(math::multiply()),
        Arc::new(math::divide()),
        Arc::new(calculator::CalculatorTool),
        Arc::new(notes::note_set()),
        Arc::new(notes::note_get()),
        Arc::new(notes::note_list()),
    ]
}

/// Create a tool registry with all built-in tools.
pub fn default_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    for err in registry.register_batch(builtin_tools()) {
        tracing::warn!(error = %err, "Skipping built-in tool");
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawloop_core::AgentState;
    use serde_json::json;

    #[test]
    fn default_registry_has_every_builtin() {
        let registry = default_registry();
        assert_eq!(registry.len(), builtin_tools().len());

        let stats = registry.stats();
        assert_eq!(stats.categories, vec!["math", "state", "text"]);
        assert_eq!(registry.list_by_category("math").len(), 5);
        assert_eq!(registry.list_by_category("text").len(), 4);
        assert_eq!(registry.list_by_category("state").len(), 3);
    }

    #[tokio::test]
    async fn pipe_through_text_tools() {
        let registry = default_registry();
        let out = registry
            .pipe(&["uppercase"], r#"{"text":"level"}"#, &AgentState::new())
            .await
            .unwrap();
        assert_eq!(out, json!("LEVEL"));
    }

    #[test]
    fn every_builtin_describes_itself() {
        for tool in default_registry().list_tools() {
            let text = tool.describe();
            assert!(text.starts_with(&format!("Tool: {}\n", tool.name())));
            assert!(text.contains("Input Schema:"));
        }
    }
}
