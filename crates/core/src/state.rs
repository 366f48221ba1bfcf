//! Agent state — the key/value store shared by an agent and its stateful
//! tools.
//!
//! Values are JSON values so a snapshot is always a deep, independent copy.
//! Readers may overlap; writers are exclusive.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;

/// A concurrency-safe, string-keyed map of JSON values.
///
/// Cloning an `AgentState` yields another handle onto the **same** store,
/// which is how stateful tools see the agent's state. Use [`AgentState::fork`]
/// for an independent deep copy.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from a previously serialized snapshot.
    pub fn from_snapshot(snapshot: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot.into_iter().collect())),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Value>> {
        // A panicking writer cannot leave a half-written Value behind, so a
        // poisoned lock still guards consistent data.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// The value under `key`, or `None` when absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Set `key` to `value`, returning the previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.write().insert(key.into(), value.into())
    }

    /// Remove `key`. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    /// Atomically read-modify-write a single key under the write lock.
    pub fn update<F>(&self, key: &str, f: F) -> Value
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let mut guard = self.write();
        let next = f(guard.get(key));
        guard.insert(key.to_string(), next.clone());
        next
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// An independent deep copy of this state.
    pub fn fork(&self) -> AgentState {
        AgentState::from_snapshot(self.serialize())
    }

    /// A deep copy of every entry as a JSON object.
    pub fn serialize(&self) -> Map<String, Value> {
        let guard = self.read();
        let mut keys: Vec<&String> = guard.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|k| (k.clone(), guard[k].clone()))
            .collect()
    }

    /// Replace every entry with the contents of `snapshot`.
    pub fn restore(&self, snapshot: Map<String, Value>) {
        let mut guard = self.write();
        guard.clear();
        guard.extend(snapshot);
    }

    /// Whether two handles point at the same underlying store.
    pub fn ptr_eq(&self, other: &AgentState) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Save/Load persistence for agent state snapshots.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persist a snapshot of `state`.
    async fn save(&self, state: &AgentState) -> Result<()>;

    /// Load the last saved snapshot, if any, as a fresh state.
    async fn load(&self) -> Result<Option<AgentState>>;
}

/// Keeps the most recent snapshot in memory.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    current: tokio::sync::RwLock<Option<Map<String, Value>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save(&self, state: &AgentState) -> Result<()> {
        *self.current.write().await = Some(state.serialize());
        Ok(())
    }

    async fn load(&self) -> Result<Option<AgentState>> {
        Ok(self
            .current
            .read()
            .await
            .clone()
            .map(AgentState::from_snapshot))
    }
}
