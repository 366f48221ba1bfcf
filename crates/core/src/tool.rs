//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act: do arithmetic,
//! transform text, read and write its own state. Each tool publishes a
//! JSON Schema of its input; the registry dispatches `(name, json)` calls
//! without knowing any tool's concrete input type.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::state::AgentState;

/// Definition of a tool as shown to a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (e.g., "add", "uppercase")
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// JSON Schema for the tool's parameters
    pub parameters: Value,
}

/// Descriptive metadata attached to a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default)]
    pub deprecated: bool,

    /// Anything else a tool wants to advertise
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolMetadata {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.category.as_deref() == Some(category)
    }

    pub fn has_version(&self) -> bool {
        self.version.as_deref().is_some_and(|v| !v.is_empty())
    }

    pub fn has_author(&self) -> bool {
        self.author.as_deref().is_some_and(|a| !a.is_empty())
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    fn is_empty(&self) -> bool {
        self == &ToolMetadata::default()
    }
}

/// The core Tool trait.
///
/// Stateless tools ignore the `state` argument. Stateful tools return
/// `true` from [`Tool::is_stateful`] and read or write the invoking agent's
/// state; the registry hands it over on every call either way.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "add", "note_set").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// A sample input, as JSON text.
    fn example(&self) -> Option<&str> {
        None
    }

    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::default()
    }

    fn is_stateful(&self) -> bool {
        false
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: Value, state: &AgentState) -> Result<Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }

    /// A multi-line summary: name, description, input schema, example and metadata.
    fn describe(&self) -> String {
        let schema = serde_json::to_string_pretty(&self.parameters_schema()).unwrap_or_default();
        let mut out = format!(
            "Tool: {}\nDescription: {}\nInput Schema:\n{}",
            self.name(),
            self.description(),
            schema
        );
        if let Some(example) = self.example() {
            out.push_str("\nExample Input:\n");
            out.push_str(example);
        }
        let metadata = self.metadata();
        if !metadata.is_empty() {
            out.push_str("\nMetadata:\n");
            out.push_str(&serde_json::to_string_pretty(&metadata).unwrap_or_default());
        }
        out.push('\n');
        out
    }
}

// ── Typed tools ──────────────────────────────────────────────────────────

/// A typed tool input: deserializable from the call's JSON arguments and
/// able to describe itself as a JSON Schema.
pub trait ToolInput: DeserializeOwned + Send + 'static {
    fn schema() -> Value;
}

/// Input for tools that take no arguments.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NoArgs {}

impl ToolInput for NoArgs {
    fn schema() -> Value {
        object_schema(&[], &[])
    }
}

/// Build an object schema from `(name, type, description)` triples.
pub fn object_schema(required: &[(&str, &str, &str)], optional: &[(&str, &str, &str)]) -> Value {
    let mut properties = Map::new();
    for (name, ty, description) in required.iter().chain(optional) {
        properties.insert(
            (*name).to_string(),
            json!({ "type": ty, "description": description }),
        );
    }
    let names: Vec<&str> = required.iter().map(|(name, _, _)| *name).collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": names,
    })
}

type Handler =
    Arc<dyn Fn(Value, AgentState) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

/// A tool backed by a closure over a concrete input type.
///
/// The closure is wrapped in a decode-then-invoke handler: arguments are
/// checked against the schema's `required` list, deserialized into the
/// input type, and the output is serialized back to JSON.
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    example: Option<String>,
    metadata: ToolMetadata,
    stateful: bool,
    handler: Handler,
}

impl FnTool {
    /// A stateless tool over an async function.
    pub fn new<I, O, E, Fut, F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        I: ToolInput,
        O: Serialize + Send + 'static,
        E: Display + Send + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
    {
        Self::build(name.into(), description.into(), false, move |input, _state| f(input))
    }

    /// A stateless tool over a synchronous function.
    pub fn from_fn<I, O, E, F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        I: ToolInput,
        O: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: Fn(I) -> Result<O, E> + Send + Sync + 'static,
    {
        Self::build(name.into(), description.into(), false, move |input, _state| {
            std::future::ready(f(input))
        })
    }

    /// A tool that receives the invoking agent's state.
    pub fn stateful<I, O, E, Fut, F>(
        name: impl Into<String>,
        description: impl Into<String>,
        f: F,
    ) -> Self
    where
        I: ToolInput,
        O: Serialize + Send + 'static,
        E: Display + Send + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
        F: Fn(I, AgentState) -> Fut + Send + Sync + 'static,
    {
        Self::build(name.into(), description.into(), true, f)
    }

    /// A synchronous tool that receives the invoking agent's state.
    pub fn stateful_fn<I, O, E, F>(
        name: impl Into<String>,
        description: impl Into<String>,
        f: F,
    ) -> Self
    where
        I: ToolInput,
        O: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: Fn(I, &AgentState) -> Result<O, E> + Send + Sync + 'static,
    {
        Self::build(name.into(), description.into(), true, move |input, state| {
            std::future::ready(f(input, &state))
        })
    }

    fn build<I, O, E, Fut, F>(name: String, description: String, stateful: bool, f: F) -> Self
    where
        I: ToolInput,
        O: Serialize + Send + 'static,
        E: Display + Send + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
        F: Fn(I, AgentState) -> Fut + Send + Sync + 'static,
    {
        let schema = I::schema();
        let required = required_fields(&schema);
        let tool_name = name.clone();

        let handler: Handler = Arc::new(move |args: Value, state: AgentState| {
            let input = match decode::<I>(&tool_name, &required, args) {
                Ok(input) => input,
                Err(e) => return Box::pin(std::future::ready(Err(e))) as BoxFuture<'static, _>,
            };
            let fut = f(input, state);
            let tool_name = tool_name.clone();
            Box::pin(async move {
                let output = fut
                    .await
                    .map_err(|e| ToolError::failed(&tool_name, e.to_string()))?;
                serde_json::to_value(output)
                    .map_err(|e| ToolError::failed(&tool_name, e.to_string()))
            })
        });

        Self {
            name,
            description,
            schema,
            example: None,
            metadata: ToolMetadata::default(),
            stateful,
            handler,
        }
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn with_metadata(mut self, metadata: ToolMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.metadata.category = Some(category.into());
        self
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("stateful", &self.stateful)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    fn example(&self) -> Option<&str> {
        self.example.as_deref()
    }

    fn metadata(&self) -> ToolMetadata {
        self.metadata.clone()
    }

    fn is_stateful(&self) -> bool {
        self.stateful
    }

    async fn execute(&self, arguments: Value, state: &AgentState) -> Result<Value, ToolError> {
        (self.handler)(arguments, state.clone()).await
    }
}

fn required_fields(schema: &Value) -> Vec<String> {
    schema["required"]
        .as_array()
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Decode call arguments into a typed input.
///
/// Accepts an object, a JSON-encoded object string, or null (no arguments).
fn decode<I: ToolInput>(tool_name: &str, required: &[String], args: Value) -> Result<I, ToolError> {
    let bad = |reason: String| ToolError::ArgumentDecode {
        tool_name: tool_name.to_string(),
        reason,
    };

    let args = match args {
        Value::String(text) => {
            serde_json::from_str(&text).map_err(|e| bad(format!("arguments are not valid JSON: {e}")))?
        }
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    let Some(fields) = args.as_object() else {
        return Err(bad("arguments must be a JSON object".into()));
    };
    if let Some(missing) = required.iter().find(|name| !fields.contains_key(name.as_str())) {
        return Err(bad(format!("missing required field '{missing}'")));
    }
    serde_json::from_value(args).map_err(|e| bad(e.to_string()))
}

// ── Registry ─────────────────────────────────────────────────────────────

/// Summary of what a registry holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub count: usize,
    pub tool_names: Vec<String>,
    pub categories: Vec<String>,
    pub has_duplicates: bool,
    pub has_category: BTreeMap<String, bool>,
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Describe the tools to the model
/// 2. Look up and execute tools when the model requests them
///
/// Registration goes through a write lock, so concurrent lookups never see
/// a partially-registered tool.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-empty and free of whitespace.
    pub fn is_valid_tool_name(name: &str) -> bool {
        !name.is_empty() && !name.chars().any(char::is_whitespace)
    }

    fn snapshot(&self) -> Vec<Arc<dyn Tool>> {
        let guard = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        let mut tools: Vec<Arc<dyn Tool>> = guard.values().cloned().collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    /// Register a tool. Fails on an invalid or duplicate name, leaving the
    /// registry unchanged.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if !Self::is_valid_tool_name(&name) {
            return Err(ToolError::InvalidName(name));
        }
        let mut guard = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        if guard.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        if tool.metadata().is_deprecated() {
            warn!(tool = %name, "Registering deprecated tool");
        }
        debug!(tool = %name, stateful = tool.is_stateful(), "Registered tool");
        guard.insert(name, tool);
        Ok(())
    }

    /// Register an owned tool value.
    pub fn register_tool<T: Tool + 'static>(&self, tool: T) -> Result<(), ToolError> {
        self.register(Arc::new(tool))
    }

    /// Register several tools, keeping every one that succeeds.
    ///
    /// Returns one error per rejected entry, in input order. `None` entries
    /// are rejected with [`ToolError::NilTool`].
    pub fn register_batch<I, T>(&self, tools: I) -> Vec<ToolError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<Arc<dyn Tool>>>,
    {
        tools
            .into_iter()
            .filter_map(|tool| match tool.into() {
                Some(tool) => self.register(tool).err(),
                None => Some(ToolError::NilTool),
            })
            .collect()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        if !Self::is_valid_tool_name(name) {
            return None;
        }
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|t| t.name().to_string()).collect()
    }

    /// All registered tools, sorted by name.
    pub fn list_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.snapshot()
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.snapshot().iter().map(|t| t.to_definition()).collect()
    }

    /// Every tool's `describe()` text, joined for a prompt.
    pub fn describe_all(&self) -> String {
        self.snapshot()
            .iter()
            .map(|t| t.describe())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tools whose metadata carries `category`. Empty input matches nothing.
    pub fn list_by_category(&self, category: &str) -> Vec<Arc<dyn Tool>> {
        if category.is_empty() {
            return Vec::new();
        }
        self.snapshot()
            .into_iter()
            .filter(|t| t.metadata().has_category(category))
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let tools = self.snapshot();
        let categories: BTreeSet<String> =
            tools.iter().filter_map(|t| t.metadata().category).collect();
        RegistryStats {
            count: tools.len(),
            tool_names: tools.iter().map(|t| t.name().to_string()).collect(),
            has_category: categories.iter().map(|c| (c.clone(), true)).collect(),
            categories: categories.into_iter().collect(),
            has_duplicates: false,
        }
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call a tool with JSON-encoded arguments. Empty text means no arguments.
    pub async fn call(&self, name: &str, args_json: &str, state: &AgentState) -> Result<Value, ToolError> {
        let args = if args_json.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(args_json).map_err(|e| ToolError::ArgumentDecode {
                tool_name: name.to_string(),
                reason: format!("arguments are not valid JSON: {e}"),
            })?
        };
        self.call_value(name, args, state).await
    }

    /// Call a tool with already-parsed arguments.
    pub async fn call_value(&self, name: &str, args: Value, state: &AgentState) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let start = Instant::now();
        let result = tool.execute(args, state).await;
        debug!(
            tool = %name,
            success = result.is_ok(),
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Tool call finished"
        );
        result
    }

    /// Run tools in sequence, feeding each result into the next as its arguments.
    pub async fn pipe(&self, names: &[&str], initial_json: &str, state: &AgentState) -> Result<Value, ToolError> {
        let Some((first, rest)) = names.split_first() else {
            return Ok(Value::Null);
        };
        let mut value = self.call(first, initial_json, state).await?;
        for name in rest {
            value = self.call_value(name, value, state).await?;
        }
        Ok(value)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
