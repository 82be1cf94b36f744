use crate::context::Context;
use crate::error::{MomoError, MomoResult};
use crate::types::TransactionStatus;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const OPERATION: &str = "await_terminal";

/// Errors worth another poll. Local misconfiguration, bad input and
/// undecodable bodies fail the same way every time, so they end the loop.
fn is_transient(err: &MomoError) -> bool {
    match err {
        MomoError::Transport { .. } => true,
        // 404: the status resource is not visible yet. 401: the dispatcher has
        // already evicted the rejected token, so the next poll re-authenticates.
        MomoError::Payment { status, .. } => {
            err.is_retryable() || *status == 404 || *status == 401
        }
        MomoError::Auth { .. } => err.is_retryable(),
        _ => false,
    }
}

/// Anything that can report the status of a submitted transaction.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, ctx: &Context, reference_id: Uuid)
        -> MomoResult<TransactionStatus>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            interval: Duration::from_secs(5),
        }
    }
}

impl PollConfig {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

/// Result of a polling run that did not end in an error.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    /// Terminal status, or the last non-terminal status when attempts ran out.
    pub status: TransactionStatus,
    /// Status queries issued, including failed ones.
    pub attempts: u32,
    /// Queries that failed and were skipped.
    pub failed_polls: u32,
    pub last_error: Option<MomoError>,
}

impl PollOutcome {
    pub fn is_terminal(&self) -> bool {
        self.status.status.is_terminal()
    }
}

/// Polls a [`StatusSource`] until the transaction reaches a terminal state.
///
/// Transient query failures are tolerated and counted. The caller's context
/// (cancellation or deadline) and non-transient errors end the loop early.
pub struct StatusPoller<S> {
    source: S,
}

impl<S: StatusSource> StatusPoller<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub async fn await_terminal(
        &self,
        ctx: &Context,
        reference_id: Uuid,
        max_attempts: u32,
        interval: Duration,
    ) -> MomoResult<TransactionStatus> {
        let outcome = self
            .poll(ctx, reference_id, PollConfig::new(max_attempts, interval))
            .await?;
        Ok(outcome.status)
    }

    pub async fn poll(
        &self,
        ctx: &Context,
        reference_id: Uuid,
        config: PollConfig,
    ) -> MomoResult<PollOutcome> {
        if config.max_attempts == 0 {
            return Err(MomoError::validation(
                "max_attempts must be at least 1",
                "max_attempts",
            ));
        }

        let mut last_status: Option<TransactionStatus> = None;
        let mut last_error: Option<MomoError> = None;
        let mut failed_polls = 0;

        for attempt in 1..=config.max_attempts {
            ctx.check(OPERATION)?;

            match self.source.fetch_status(ctx, reference_id).await {
                Ok(status) if status.status.is_terminal() => {
                    info!(
                        reference_id = %reference_id,
                        status = %status.status,
                        attempt,
                        "transaction reached terminal state"
                    );
                    return Ok(PollOutcome {
                        status,
                        attempts: attempt,
                        failed_polls,
                        last_error,
                    });
                }
                Ok(status) => {
                    debug!(
                        reference_id = %reference_id,
                        status = %status.status,
                        attempt,
                        max_attempts = config.max_attempts,
                        "transaction not final yet"
                    );
                    last_status = Some(status);
                }
                Err(err) if err.is_cancellation() => return Err(err),
                Err(err) if !is_transient(&err) => {
                    warn!(
                        reference_id = %reference_id,
                        attempt,
                        error = %err,
                        "status poll failed permanently"
                    );
                    return Err(err);
                }
                Err(err) => {
                    failed_polls += 1;
                    warn!(
                        reference_id = %reference_id,
                        attempt,
                        max_attempts = config.max_attempts,
                        error = %err,
                        "status poll failed, continuing"
                    );
                    last_error = Some(err);
                }
            }

            if attempt < config.max_attempts {
                ctx.sleep(OPERATION, config.interval).await?;
            }
        }

        match last_status {
            Some(status) => {
                info!(
                    reference_id = %reference_id,
                    status = %status.status,
                    attempts = config.max_attempts,
                    failed_polls,
                    "polling attempts exhausted before terminal state"
                );
                Ok(PollOutcome {
                    status,
                    attempts: config.max_attempts,
                    failed_polls,
                    last_error,
                })
            }
            // Never observed a status at all: surface the last failure.
            None => Err(last_error
                .unwrap_or_else(|| MomoError::transport(OPERATION, "no status observed"))),
        }
    }
}
