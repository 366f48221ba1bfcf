//! Multi-agent orchestration.
//!
//! An [`Orchestrator`] composes agents in one of three topologies:
//!
//! ```text
//! parallel:   input ──┬─▶ A ──┐
//!                     ├─▶ B ──┼─▶ [A, B, C]   (aligned by index)
//!                     └─▶ C ──┘
//!
//! piped:      input ─▶ A ─▶ B ─▶ C ─▶ output  (stops at the first failure)
//!
//! broadcast:  message ─▶ A.on_message ─▶ B.on_message ─▶ ...  (recorded in the trail)
//! ```
//!
//! Every result carries the producing agent's name and a snapshot of its
//! state under the `agent` and `state` metadata keys.

use clawloop_config::OrchestratorSettings;
use clawloop_core::agent::{Agent, AgentDescription};
use clawloop_core::error::{Error, Result};
use clawloop_core::result::CallResult;
use clawloop_core::task::{self, ExecContext, TaskHandle};
use clawloop_core::trail::{ExecutionTrail, StateMessage};
use futures::future::join_all;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

fn annotate(result: CallResult, agent: &str, state: Map<String, Value>) -> CallResult {
    result
        .with_metadata("agent", agent)
        .with_metadata("state", Value::Object(state))
}

/// Outcome of [`Orchestrator::run_parallel`].
#[derive(Debug)]
pub struct ParallelRun {
    /// One result per agent, in registration order. Failed agents have
    /// `error` set.
    pub results: Vec<CallResult>,

    /// Set when at least one agent failed.
    pub error: Option<Error>,
}

impl ParallelRun {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn outputs(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.output.as_str()).collect()
    }

    pub fn into_result(self) -> Result<Vec<CallResult>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.results),
        }
    }
}

/// Outcome of [`Orchestrator::run_piped`].
#[derive(Debug)]
pub struct PipedRun {
    /// First stage's result; later stages hang off its `next` chain.
    pub result: CallResult,

    /// The failing stage's error, shared with that stage's result.
    pub error: Option<Arc<Error>>,
}

impl PipedRun {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Results of the stages that ran, in order.
    pub fn stages(&self) -> impl Iterator<Item = &CallResult> {
        self.result.iter()
    }

    /// The last stage that ran.
    pub fn last(&self) -> &CallResult {
        self.result.iter().last().unwrap_or(&self.result)
    }

    pub fn output(&self) -> &str {
        &self.last().output
    }

    /// The final output, or the stage error that stopped the pipe.
    pub fn into_result(self) -> Result<CallResult> {
        match self.error {
            None => Ok(self.result),
            Some(e) => {
                drop(self.result);
                Err(Error::from_shared(e))
            }
        }
    }
}

/// Runs a fixed set of agents in parallel, as a pipe, or as a message
/// workflow.
pub struct Orchestrator {
    agents: Vec<Arc<dyn Agent>>,
    timeout: Option<Duration>,
    current_state: Mutex<Map<String, Value>>,
    trail: Mutex<ExecutionTrail>,
}

impl Orchestrator {
    pub fn new(agents: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            agents,
            timeout: None,
            current_state: Mutex::new(Map::new()),
            trail: Mutex::new(ExecutionTrail::new()),
        }
    }

    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    /// Bound every run to `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Apply the `[orchestrator]` section of the engine configuration.
    pub fn with_settings(mut self, settings: &OrchestratorSettings) -> Self {
        self.timeout = settings.timeout();
        self
    }

    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    pub fn agent(&self, name: &str) -> Option<&Arc<dyn Agent>> {
        self.agents.iter().find(|a| a.name() == name)
    }

    pub fn describe(&self) -> Vec<AgentDescription> {
        self.agents.iter().map(|a| a.describe()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// State snapshot of the most recently finished pipe or workflow stage.
    pub fn current_state(&self) -> Map<String, Value> {
        lock(&self.current_state).clone()
    }

    /// Copy of every hop recorded by [`broadcast`](Self::broadcast) and
    /// [`send_to`](Self::send_to).
    pub fn trail(&self) -> ExecutionTrail {
        lock(&self.trail).clone()
    }

    fn set_current_state(&self, state: Map<String, Value>) {
        *lock(&self.current_state) = state;
    }

    fn record(&self, agent: &str, message: StateMessage, state: Map<String, Value>) -> u64 {
        lock(&self.trail).record(agent, message, state)
    }

    fn scoped(&self, ctx: &ExecContext) -> ExecContext {
        let scoped = ctx.child();
        match self.timeout {
            Some(timeout) => scoped.with_timeout(timeout),
            None => scoped,
        }
    }

    // ── Parallel ──

    /// Run every agent concurrently on `input` and wait for all of them.
    ///
    /// One agent failing does not affect the others; successful results are
    /// returned alongside the aggregate error.
    pub async fn run_parallel(&self, ctx: &ExecContext, input: &str) -> ParallelRun {
        let scoped = self.scoped(ctx);
        info!(agents = self.agents.len(), "Parallel run starting");

        let handles: Vec<TaskHandle<(Result<CallResult>, Map<String, Value>)>> = self
            .agents
            .iter()
            .map(|agent| {
                let agent = Arc::clone(agent);
                let input = input.to_string();
                let inner = scoped.clone();
                task::spawn(&scoped, format!("{}:parallel", agent.name()), async move {
                    let outcome = agent.invoke(&inner, &input).await;
                    Ok((outcome, agent.state().serialize()))
                })
            })
            .collect();
        let joined = join_all(handles.into_iter().map(|h| h.wait(&scoped))).await;

        let mut failed = Vec::new();
        let mut results = Vec::with_capacity(joined.len());
        for (index, (agent, joined)) in self.agents.iter().zip(joined).enumerate() {
            let (outcome, state) = match joined {
                Ok(pair) => pair,
                Err(e) => (Err(e), agent.state().serialize()),
            };
            let result = outcome.unwrap_or_else(|e| {
                warn!(agent = %agent.name(), error = %e, "Parallel agent failed");
                CallResult::failure(e.in_agent(agent.name()))
            });
            if !result.is_success() {
                failed.push(index);
            }
            results.push(annotate(result, agent.name(), state));
        }

        let total = results.len();
        info!(total, failed = failed.len(), "Parallel run finished");
        let error = (!failed.is_empty()).then(|| Error::Parallel { failed, total });
        ParallelRun { results, error }
    }

    /// Spawned form of [`run_parallel`](Self::run_parallel).
    pub fn spawn_parallel(self: Arc<Self>, ctx: &ExecContext, input: impl Into<String>) -> TaskHandle<ParallelRun> {
        let input = input.into();
        let inner = ctx.clone();
        task::spawn(ctx, "orchestrator:parallel", async move {
            Ok(self.run_parallel(&inner, &input).await)
        })
    }

    // ── Piped ──

    /// Feed `input` through the agents in order, each output becoming the
    /// next agent's input.
    ///
    /// Stops at the first stage that errors or returns a result with
    /// `error` set; the stages that ran are still returned. With no agents
    /// the input passes through unchanged.
    pub async fn run_piped(&self, ctx: &ExecContext, input: &str) -> PipedRun {
        let scoped = self.scoped(ctx);
        let mut stages: Vec<CallResult> = Vec::with_capacity(self.agents.len());
        let mut error = None;
        let mut next_input = input.to_string();

        for (stage, agent) in self.agents.iter().enumerate() {
            debug!(stage, agent = %agent.name(), "Pipe stage");
            let outcome = scoped.run(agent.invoke(&scoped, &next_input)).await;

            let state = agent.state().serialize();
            self.set_current_state(state.clone());

            let result = outcome.unwrap_or_else(|e| CallResult::failure(e.in_agent(agent.name())));
            let result = annotate(result, agent.name(), state);
            let stage_error = result.error.clone();
            next_input.clone_from(&result.output);
            stages.push(result);

            if let Some(e) = stage_error {
                warn!(stage, agent = %agent.name(), error = %e, "Pipe stopped");
                error = Some(e);
                break;
            }
        }

        let result = stages
            .into_iter()
            .rev()
            .fold(None, |next: Option<CallResult>, mut stage| {
                stage.next = next.map(Box::new);
                Some(stage)
            })
            .unwrap_or_else(|| CallResult::success(input));
        PipedRun { result, error }
    }

    /// Spawned form of [`run_piped`](Self::run_piped).
    pub fn spawn_piped(self: Arc<Self>, ctx: &ExecContext, input: impl Into<String>) -> TaskHandle<PipedRun> {
        let input = input.into();
        let inner = ctx.clone();
        task::spawn(ctx, "orchestrator:piped", async move {
            Ok(self.run_piped(&inner, &input).await)
        })
    }

    // ── Messaging ──

    /// Pass `message` through every agent's `on_message` in order.
    ///
    /// The seed message and each reply are appended to the trail. Returns
    /// the replies; the first failure aborts the workflow.
    pub async fn broadcast(&self, ctx: &ExecContext, message: StateMessage) -> Result<Vec<StateMessage>> {
        let scoped = self.scoped(ctx);
        self.record(&message.sender, message.clone(), Map::new());

        let mut replies = Vec::with_capacity(self.agents.len());
        let mut current = message;
        for agent in &self.agents {
            let reply = self.deliver(&scoped, agent.as_ref(), &current).await?;
            replies.push(reply.clone());
            current = reply;
        }
        Ok(replies)
    }

    /// Deliver `message` to the agent called `name`.
    pub async fn send_to(&self, ctx: &ExecContext, name: &str, message: &StateMessage) -> Result<StateMessage> {
        let agent = self
            .agent(name)
            .ok_or_else(|| Error::AgentNotFound(name.to_string()))?;
        self.deliver(&self.scoped(ctx), agent.as_ref(), message).await
    }

    async fn deliver(&self, ctx: &ExecContext, agent: &dyn Agent, message: &StateMessage) -> Result<StateMessage> {
        let reply = ctx
            .run(agent.on_message(ctx, message))
            .await
            .map_err(|e| e.in_agent(agent.name()))?;
        let state = agent.state().serialize();
        self.set_current_state(state.clone());
        let seq = self.record(agent.name(), reply.clone(), state);
        debug!(seq, agent = %agent.name(), "Message recorded");
        Ok(reply)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_helpers::StubAgent;
    use serde_json::json;
    use tokio::time::Instant;

    fn stub(name: &str) -> Arc<dyn Agent> {
        StubAgent::new(name).arc()
    }

    #[tokio::test]
    async fn parallel_results_align_with_agents() {
        let orchestrator = Orchestrator::new(vec![stub("a"), stub("b"), stub("c")]);
        let run = orchestrator.run_parallel(&ExecContext::new(), "in").await;

        assert!(run.is_success());
        assert_eq!(run.outputs(), ["in+a", "in+b", "in+c"]);
        assert_eq!(run.results[1].metadata["agent"], json!("b"));
        assert_eq!(run.results[1].metadata["state"], json!({"last_input": "in"}));
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_agents_run_concurrently_and_keep_order() {
        let orchestrator = Orchestrator::new(vec![
            StubAgent::new("slow").with_delay(Duration::from_millis(300)).arc(),
            StubAgent::new("mid").with_delay(Duration::from_millis(200)).arc(),
            StubAgent::new("fast").with_delay(Duration::from_millis(100)).arc(),
        ]);
        let started = Instant::now();
        let run = orchestrator.run_parallel(&ExecContext::new(), "x").await;

        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(run.outputs(), ["x+slow", "x+mid", "x+fast"]);
    }

    #[tokio::test]
    async fn parallel_failure_does_not_affect_peers() {
        let orchestrator = Orchestrator::new(vec![
            stub("a"),
            StubAgent::new("b").failing_on("go").arc(),
            stub("c"),
        ]);
        let run = orchestrator.run_parallel(&ExecContext::new(), "go").await;

        assert_eq!(run.results.len(), 3);
        assert!(run.results[0].is_success());
        assert!(!run.results[1].is_success());
        assert_eq!(run.results[2].output, "go+c");
        assert!(matches!(
            run.error,
            Some(Error::Parallel { ref failed, total: 3 }) if failed == &[1]
        ));
        let err = run.results[1].error.as_deref().unwrap();
        assert!(matches!(err, Error::Agent { agent, .. } if agent == "b"));
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_timeout_unblocks_waiter() {
        let orchestrator = Orchestrator::new(vec![
            stub("quick"),
            StubAgent::new("stuck").with_delay(Duration::from_secs(60)).arc(),
        ])
        .with_timeout(Duration::from_millis(50));

        let run = orchestrator.run_parallel(&ExecContext::new(), "t").await;
        assert!(run.results[0].is_success());
        let Some(Error::Agent { source, .. }) = run.results[1].error.as_deref() else {
            panic!("expected a wrapped agent error");
        };
        assert!(matches!(source.as_ref(), Error::DeadlineExceeded));
    }

    #[tokio::test]
    async fn canceled_context_fails_every_agent() {
        let a = stub("a");
        let orchestrator = Orchestrator::new(vec![a.clone(), stub("b")]);
        let ctx = ExecContext::new();
        ctx.cancel();

        let run = orchestrator.run_parallel(&ctx, "x").await;
        assert!(run.results.iter().all(|r| !r.is_success()));
        assert!(!a.state().contains("last_input"));
    }

    #[tokio::test]
    async fn piped_output_feeds_next_stage() {
        let orchestrator = Orchestrator::new(vec![stub("a"), stub("b"), stub("c")]);
        let run = orchestrator.run_piped(&ExecContext::new(), "in").await;

        assert!(run.is_success());
        assert_eq!(run.output(), "in+a+b+c");
        let outputs: Vec<&str> = run.stages().map(|r| r.output.as_str()).collect();
        assert_eq!(outputs, ["in+a", "in+a+b", "in+a+b+c"]);
        assert_eq!(orchestrator.current_state(), json!({"last_input": "in+a+b"}).as_object().cloned().unwrap());
    }

    #[tokio::test]
    async fn piped_stops_at_first_failure() {
        let c = stub("c");
        let orchestrator = Orchestrator::new(vec![
            stub("a"),
            StubAgent::new("b").failing_on("+a").arc(),
            c.clone(),
        ]);
        let run = orchestrator.run_piped(&ExecContext::new(), "in").await;

        assert!(!run.is_success());
        assert_eq!(run.stages().count(), 2);
        assert_eq!(run.result.output, "in+a");
        assert!(run.last().error.is_some());
        assert!(!c.state().contains("last_input"));

        let err = run.into_result().unwrap_err();
        assert!(matches!(err, Error::Agent { ref agent, .. } if agent == "b"));
    }

    #[tokio::test]
    async fn piped_error_stays_typed_while_stages_are_held() {
        let orchestrator = Orchestrator::new(vec![stub("a"), StubAgent::new("b").failing_on("+a").arc()]);
        let run = orchestrator.run_piped(&ExecContext::new(), "in").await;
        let held = run.result.clone();

        let err = run.into_result().unwrap_err();
        let Error::Agent { agent, source } = err else {
            panic!("expected agent error, got {err:?}");
        };
        assert_eq!(agent, "b");
        assert!(matches!(source.as_ref(), Error::Internal(_)));
        assert_eq!(held.iter().count(), 2);
    }

    #[tokio::test]
    async fn empty_pipe_passes_input_through() {
        let orchestrator = Orchestrator::new(Vec::new());
        let run = orchestrator.run_piped(&ExecContext::new(), "unchanged").await;
        assert!(run.is_success());
        assert_eq!(run.output(), "unchanged");

        let parallel = orchestrator.run_parallel(&ExecContext::new(), "x").await;
        assert!(parallel.is_success());
        assert!(parallel.results.is_empty());
    }

    #[tokio::test]
    async fn spawned_forms_match_awaiting_forms() {
        let orchestrator = Arc::new(Orchestrator::new(vec![stub("a"), stub("b")]));
        let ctx = ExecContext::new();

        let piped = orchestrator.clone().spawn_piped(&ctx, "s").await.unwrap();
        assert_eq!(piped.output(), "s+a+b");

        let parallel = orchestrator.spawn_parallel(&ctx, "s").await.unwrap();
        assert_eq!(parallel.outputs(), ["s+a", "s+b"]);
    }

    #[tokio::test]
    async fn broadcast_records_each_hop() {
        let orchestrator = Orchestrator::new(vec![stub("a"), stub("b")]);
        let seed = StateMessage::new("user", "hi");
        let replies = orchestrator.broadcast(&ExecContext::new(), seed.clone()).await.unwrap();

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1].message, "hi+a+b");
        assert_eq!(replies[1].meta["in_reply_to"], json!(replies[0].id));

        let trail = orchestrator.trail();
        assert_eq!(trail.len(), 3);
        assert_eq!(trail.get(0).unwrap().message.id, seed.id);
        assert_eq!(trail.previous(2).unwrap().agent, "a");
        assert_eq!(trail.next(1).unwrap().agent, "b");
        assert_eq!(trail.last().unwrap().state["last_input"], json!("hi+a"));
    }

    #[tokio::test]
    async fn send_to_unknown_agent_fails() {
        let orchestrator = Orchestrator::new(vec![stub("a")]);
        let msg = StateMessage::new("user", "hello");

        let err = orchestrator.send_to(&ExecContext::new(), "zed", &msg).await.unwrap_err();
        assert!(matches!(err, Error::AgentNotFound(ref n) if n == "zed"));

        let reply = orchestrator.send_to(&ExecContext::new(), "a", &msg).await.unwrap();
        assert_eq!(reply.sender, "a");
        assert_eq!(orchestrator.trail().len(), 1);
    }

    #[test]
    fn settings_set_timeout() {
        let settings = OrchestratorSettings { timeout_secs: 5 };
        let orchestrator = Orchestrator::new(vec![stub("a")]).with_settings(&settings);
        assert_eq!(orchestrator.timeout, Some(Duration::from_secs(5)));
        assert_eq!(orchestrator.describe()[0].name, "a");
    }
}
