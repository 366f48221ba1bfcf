//! `CallResult` — the uniform return envelope of agent invocation.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{Error, Result};

/// The outcome of one agent invocation.
///
/// `error` is set when the agent failed but still has something to report
/// (the orchestrator's partial results). `next` links to the following
/// stage's result when results are chained.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CallResult {
    pub output: String,

    #[serde(serialize_with = "error_as_string", skip_serializing_if = "Option::is_none")]
    pub error: Option<Arc<Error>>,

    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Box<CallResult>>,
}

fn error_as_string<S: Serializer>(
    error: &Option<Arc<Error>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_str(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl CallResult {
    /// A successful result carrying `output`.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    /// A failed result with no output.
    pub fn failure(error: impl Into<Arc<Error>>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Append `next` at the end of this result's chain.
    pub fn chain(&mut self, next: CallResult) {
        match self.next.as_deref_mut() {
            Some(link) => link.chain(next),
            None => self.next = Some(Box::new(next)),
        }
    }

    /// This result followed by every chained result.
    pub fn iter(&self) -> impl Iterator<Item = &CallResult> {
        std::iter::successors(Some(self), |r| r.next.as_deref())
    }

    /// Convert into a plain `Result`, surfacing the error if present.
    pub fn into_result(self) -> Result<String> {
        match self.error {
            None => Ok(self.output),
            Some(e) => Err(Error::from_shared(e)),
        }
    }
}
