//! Task layer — spawned operations, cancellation and deadlines.
//!
//! Every engine operation has an awaiting form (`agent.invoke(..).await`)
//! and a spawned form returning a [`TaskHandle`]. An [`ExecContext`] carries
//! a cancellation token and an optional deadline through every call.
//!
//! Cancellation is cooperative: it stops new work from starting and
//! unblocks whoever is waiting. A task already running in the background is
//! detached, not aborted.

use futures::future::select_all;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// Cancellation and deadline carried through a call tree.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecContext {
    /// A context that never expires on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire `timeout` from now (or earlier if already bounded).
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// A context canceled together with this one, but cancelable on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if this context is already canceled or past its deadline.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Canceled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::DeadlineExceeded);
        }
        Ok(())
    }

    /// Await `fut`, unless this context is canceled or expires first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Error::Canceled),
            _ = sleep_until(self.deadline) => Err(Error::DeadlineExceeded),
            res = fut => res,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

/// A single-value handle to a spawned operation.
///
/// Awaiting the handle yields the task's result. Dropping it detaches the
/// task, which finishes in the background and is discarded.
#[derive(Debug)]
pub struct TaskHandle<T> {
    label: String,
    inner: JoinHandle<Result<T>>,
}

impl<T> TaskHandle<T> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the result, giving up early if `ctx` is canceled or expires.
    pub async fn wait(self, ctx: &ExecContext) -> Result<T> {
        ctx.run(self).await
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) => Err(Error::Task(format!("{}: {e}", this.label))),
        })
    }
}

/// Start `fut` as an independent task.
///
/// The task does not start its work if `ctx` is already canceled or
/// expired at the moment it is scheduled.
pub fn spawn<T, F>(ctx: &ExecContext, label: impl Into<String>, fut: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let label = label.into();
    let ctx = ctx.clone();
    debug!(task = %label, "Spawning task");
    let inner = tokio::spawn(async move {
        ctx.check()?;
        fut.await
    });
    TaskHandle { label, inner }
}

/// Wait for the first of `handles` to finish, or for `ctx` to expire.
///
/// Returns the winner's index and value. The remaining tasks keep running
/// in the background and their results are discarded.
pub async fn race<T>(ctx: &ExecContext, handles: Vec<TaskHandle<T>>) -> Result<(usize, T)>
where
    T: Send + 'static,
{
    if handles.is_empty() {
        return Err(Error::Internal("race needs at least one task".into()));
    }
    ctx.run(async move {
        let (result, index, _rest) = select_all(handles).await;
        debug!(winner = index, "Race settled");
        result.map(|value| (index, value))
    })
    .await
}
