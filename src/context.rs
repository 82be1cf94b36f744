//! Caller-supplied cancellation and deadlines.
//!
//! A [`Context`] is threaded through every network-bound call. It carries zero
//! or more cancellation flags (a `watch` channel per [`CancelHandle`]) and an
//! optional deadline; [`Context::run`] races the wrapped future against both,
//! dropping the in-flight request as soon as either fires.

use crate::error::{MomoError, MomoResult};
use futures::future::select_all;
use std::future::{pending, Future};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: Vec<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Cancels every context derived from the [`Context::with_cancel`] call that created it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a child context plus a handle that cancels it (and only it, and its children).
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let mut child = self.clone();
        child.cancel.push(rx);
        (child, CancelHandle { tx: Arc::new(tx) })
    }

    /// Derive a child context whose deadline is the earlier of the parent's and `now + timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let mut child = self.clone();
        child.deadline = Some(match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        });
        child
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.iter().any(|rx| *rx.borrow())
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail fast if the context is already done.
    pub fn check(&self, operation: &str) -> MomoResult<()> {
        if self.is_cancelled() {
            return Err(MomoError::cancelled(operation));
        }
        if self.is_expired() {
            return Err(MomoError::timeout(operation));
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the context is cancelled or expires first.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> MomoResult<T>
    where
        F: Future<Output = MomoResult<T>>,
    {
        self.check(operation)?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(MomoError::cancelled(operation)),
            _ = self.expired() => Err(MomoError::timeout(operation)),
            result = fut => result,
        }
    }

    /// Sleep for `duration`, waking early with an error if the context ends.
    pub async fn sleep(&self, operation: &str, duration: Duration) -> MomoResult<()> {
        self.run(operation, async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }

    async fn cancelled(&self) {
        if self.cancel.is_empty() {
            return pending().await;
        }
        let waits = self.cancel.iter().cloned().map(|mut rx| {
            Box::pin(async move {
                loop {
                    if *rx.borrow_and_update() {
                        return;
                    }
                    // A dropped handle can never cancel.
                    if rx.changed().await.is_err() {
                        pending::<()>().await;
                    }
                }
            })
        });
        select_all(waits).await;
    }

    async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => pending().await,
        }
    }
}
