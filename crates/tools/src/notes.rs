//! Scratchpad tools — stateful notes kept in the invoking agent's state.
//!
//! Notes live under `note.<key>` so they never collide with the agent's own
//! entries (such as the planner's `plan`).

use clawloop_core::state::AgentState;
use clawloop_core::tool::{FnTool, NoArgs, ToolInput, ToolMetadata, object_schema};
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;

const NOTE_PREFIX: &str = "note.";

fn note_key(key: &str) -> String {
    format!("{NOTE_PREFIX}{key}")
}

#[derive(Debug, Deserialize)]
pub struct NoteSetArgs {
    pub key: String,
    pub content: String,
}

impl ToolInput for NoteSetArgs {
    fn schema() -> Value {
        object_schema(
            &[
                ("key", "string", "Name of the note"),
                ("content", "string", "Text to store"),
            ],
            &[],
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct NoteGetArgs {
    pub key: String,
}

impl ToolInput for NoteGetArgs {
    fn schema() -> Value {
        object_schema(&[("key", "string", "Name of the note")], &[])
    }
}

pub fn note_set() -> FnTool {
    FnTool::stateful_fn(
        "note_set",
        "Saves content to the agent's scratchpad under a key.",
        |args: NoteSetArgs, state: &AgentState| {
            if args.key.is_empty() {
                return Err("note key must not be empty");
            }
            state.set(note_key(&args.key), args.content);
            Ok(format!("Saved note '{}'", args.key))
        },
    )
    .with_example(r#"{"key":"search_results", "content":"..."}"#)
    .with_metadata(ToolMetadata::category("state"))
}

pub fn note_get() -> FnTool {
    FnTool::stateful_fn(
        "note_get",
        "Reads a note from the agent's scratchpad.",
        |args: NoteGetArgs, state: &AgentState| match state.get(&note_key(&args.key)) {
            Some(Value::String(text)) => Ok(text),
            Some(other) => Ok(other.to_string()),
            None => Err(format!("no note found for key: {}", args.key)),
        },
    )
    .with_example(r#"{"key":"search_results"}"#)
    .with_metadata(ToolMetadata::category("state"))
}

pub fn note_list() -> FnTool {
    FnTool::stateful_fn(
        "note_list",
        "Lists the keys of every note in the agent's scratchpad.",
        |_: NoArgs, state: &AgentState| {
            let keys: Vec<String> = state
                .keys()
                .into_iter()
                .filter_map(|k| k.strip_prefix(NOTE_PREFIX).map(str::to_string))
                .collect();
            Ok::<_, Infallible>(keys)
        },
    )
    .with_metadata(ToolMetadata::category("state"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawloop_core::{Tool, ToolError, ToolRegistry};
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> Arc<ToolRegistry> {
        let registry = ToolRegistry::new();
        registry.register_tool(note_set()).unwrap();
        registry.register_tool(note_get()).unwrap();
        registry.register_tool(note_list()).unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn set_then_get_then_list() {
        let registry = registry();
        let state = AgentState::new();
        state.set("plan", json!([]));

        registry
            .call("note_set", r#"{"key":"a","content":"alpha"}"#, &state)
            .await
            .unwrap();
        let got = registry.call("note_get", r#"{"key":"a"}"#, &state).await.unwrap();
        assert_eq!(got, json!("alpha"));

        let listed = registry.call("note_list", "", &state).await.unwrap();
        assert_eq!(listed, json!(["a"]));
    }

    #[tokio::test]
    async fn missing_note_is_an_error() {
        let err = registry()
            .call("note_get", r#"{"key":"nope"}"#, &AgentState::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[test]
    fn notes_are_stateful() {
        assert!(note_set().is_stateful());
        assert!(note_get().is_stateful());
        assert!(note_list().is_stateful());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_agents_do_not_see_each_others_notes() {
        let registry = registry();
        let states: Vec<AgentState> = (0..8).map(|_| AgentState::new()).collect();

        let calls = states.iter().enumerate().map(|(i, state)| {
            let registry = registry.clone();
            let state = state.clone();
            async move {
                for n in 0..10 {
                    let args = json!({ "key": format!("k{n}"), "content": format!("agent{i}") });
                    registry
                        .call_value("note_set", args, &state)
                        .await
                        .unwrap();
                }
            }
        });
        futures::future::join_all(calls).await;

        for (i, state) in states.iter().enumerate() {
            assert_eq!(state.len(), 10);
            let got = registry
                .call("note_get", r#"{"key":"k9"}"#, state)
                .await
                .unwrap();
            assert_eq!(got, json!(format!("agent{i}")));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_sets_on_one_state_all_land() {
        const WRITERS: usize = 64;
        let registry = registry();
        let state = AgentState::new();

        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                let registry = registry.clone();
                let state = state.clone();
                tokio::spawn(async move {
                    let args = json!({ "key": format!("k{i}"), "content": format!("v{i}") });
                    registry.call_value("note_set", args, &state).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(state.len(), WRITERS);
        assert_eq!(state.get("note.k17"), Some(json!("v17")));
        let listed = registry.call("note_list", "", &state).await.unwrap();
        assert_eq!(listed.as_array().map(Vec::len), Some(WRITERS));
    }
}
