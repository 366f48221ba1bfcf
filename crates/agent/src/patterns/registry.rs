//! Agent registry — named factories that build agents on demand.
//!
//! The registry is an explicit value owned by the caller. Each lookup runs
//! the factory again, so every created agent starts with its own state.

use clawloop_core::agent::Agent;
use clawloop_core::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use super::orchestrator::Orchestrator;

/// Builds a fresh agent.
pub type AgentFactory = Arc<dyn Fn() -> Arc<dyn Agent> + Send + Sync>;

#[derive(Default)]
pub struct AgentRegistry {
    factories: RwLock<HashMap<String, AgentFactory>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`. Fails if the name is taken.
    pub fn register<F>(&self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn() -> Arc<dyn Agent> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut guard = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        if guard.contains_key(&name) {
            return Err(Error::DuplicateAgent(name));
        }
        debug!(agent = %name, "Registered agent factory");
        guard.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Build a new agent from the factory registered as `name`.
    pub fn create(&self, name: &str) -> Result<Arc<dyn Agent>> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::AgentNotFound(name.to_string()))?;
        Ok(factory())
    }

    /// Build one agent per name, in order. The first unknown name fails the
    /// whole batch.
    pub fn create_all(&self, names: &[&str]) -> Result<Vec<Arc<dyn Agent>>> {
        names.iter().map(|name| self.create(name)).collect()
    }

    /// An orchestrator over freshly built agents.
    pub fn orchestrator(&self, names: &[&str]) -> Result<Orchestrator> {
        Ok(Orchestrator::new(self.create_all(names)?))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
