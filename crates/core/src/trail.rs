//! Agent-to-agent messages and the execution trail that records them.
//!
//! Each hop of a multi-agent workflow is appended to the trail with a
//! monotonic sequence number and a snapshot of the producing agent's state,
//! so "previous" and "next" are answered by position instead of by links
//! stored inside the messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A message passed from one agent to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMessage {
    pub id: String,

    /// Name of the agent (or "user") that produced this message.
    pub sender: String,

    pub message: String,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl StateMessage {
    pub fn new(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: sender.into(),
            message: message.into(),
            timestamp: Utc::now(),
            meta: Map::new(),
        }
    }

    /// A reply from `sender` to this message.
    pub fn reply(&self, sender: impl Into<String>, message: impl Into<String>) -> Self {
        StateMessage::new(sender, message).with_meta("in_reply_to", self.id.clone())
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// One recorded hop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailEntry {
    pub seq: u64,
    pub agent: String,
    pub message: StateMessage,
    pub state: Map<String, Value>,
}

/// Append-only, sequence-numbered record of agent-to-agent messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionTrail {
    entries: Vec<TrailEntry>,
}

impl ExecutionTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hop and return its sequence number.
    pub fn record(
        &mut self,
        agent: impl Into<String>,
        message: StateMessage,
        state: Map<String, Value>,
    ) -> u64 {
        let seq = self.entries.len() as u64;
        self.entries.push(TrailEntry {
            seq,
            agent: agent.into(),
            message,
            state,
        });
        seq
    }

    pub fn entries(&self) -> &[TrailEntry] {
        &self.entries
    }

    pub fn get(&self, seq: u64) -> Option<&TrailEntry> {
        self.entries.get(usize::try_from(seq).ok()?)
    }

    pub fn last(&self) -> Option<&TrailEntry> {
        self.entries.last()
    }

    /// The hop recorded just before `seq`.
    pub fn previous(&self, seq: u64) -> Option<&TrailEntry> {
        seq.checked_sub(1).and_then(|s| self.get(s))
    }

    /// The hop recorded just after `seq`.
    pub fn next(&self, seq: u64) -> Option<&TrailEntry> {
        self.get(seq.checked_add(1)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
