//! Body of one operator's broadcast loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock};

use super::health::{LoopHealth, PassReport};
use crate::error::{BroadcastError, FailureKind, TransportError};
use crate::operator::OperatorId;
use crate::store::SessionStore;
use crate::transport::{Transport, TransportSession};

/// Supervisor table entry for a running loop.
pub(crate) struct TrackedLoop {
    pub generation: u64,
    pub handle: tokio::task::JoinHandle<()>,
    pub wake: Arc<Notify>,
    pub health: Arc<RwLock<LoopHealth>>,
}

pub(crate) type LoopTable = Arc<Mutex<HashMap<OperatorId, TrackedLoop>>>;

/// Everything a loop task needs, cloned out of the manager at spawn time.
pub(crate) struct LoopContext {
    pub operator: OperatorId,
    pub generation: u64,
    pub store: Arc<SessionStore>,
    pub transport: Arc<dyn Transport>,
    pub loops: LoopTable,
    pub wake: Arc<Notify>,
    pub health: Arc<RwLock<LoopHealth>>,
    pub recovery_backoff: Duration,
}

pub(crate) async fn run_loop(ctx: LoopContext) {
    let operator = ctx.operator;
    tracing::info!(operator = %operator, "Broadcast loop started");

    let mut session: Option<Box<dyn TransportSession>> = None;
    while ctx.should_continue().await {
        let pause = match ctx.run_pass(&mut session).await {
            Ok(interval) => interval,
            Err(e) => {
                tracing::warn!(
                    operator = %operator,
                    error = %e,
                    backoff_secs = ctx.recovery_backoff.as_secs(),
                    "Broadcast pass failed, backing off"
                );
                ctx.health.write().await.record_backoff(&e.to_string());
                ctx.recovery_backoff
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = ctx.wake.notified() => {
                tracing::debug!(operator = %operator, "Broadcast loop woken early");
            }
        }
    }

    if let Some(mut session) = session
        && let Err(e) = session.disconnect().await
    {
        tracing::debug!(operator = %operator, error = %e, "Disconnect after broadcast failed");
    }
    tracing::info!(operator = %operator, "Broadcast loop stopped");
}

impl LoopContext {
    /// Decide whether to run another pass.
    ///
    /// The decision to exit and the removal from the table happen under the
    /// table lock, so `start` never sees a loop that is about to quit.
    async fn should_continue(&self) -> bool {
        let mut loops = self.loops.lock().await;
        if self.is_broadcasting().await {
            return true;
        }
        if loops
            .get(&self.operator)
            .is_some_and(|t| t.generation == self.generation)
        {
            loops.remove(&self.operator);
        }
        false
    }

    async fn is_broadcasting(&self) -> bool {
        self.store
            .get(self.operator)
            .await
            .is_some_and(|p| p.broadcasting)
    }

    /// One pass over the current destinations. Returns the pause before the
    /// next pass.
    async fn run_pass(
        &self,
        session: &mut Option<Box<dyn TransportSession>>,
    ) -> Result<Duration, BroadcastError> {
        let profile =
            self.store
                .get(self.operator)
                .await
                .ok_or_else(|| BroadcastError::PassFailed {
                    operator: self.operator,
                    reason: "profile missing".into(),
                })?;

        if session.is_none() {
            let connected = self.transport.connect(self.operator).await.map_err(|e| {
                BroadcastError::PassFailed {
                    operator: self.operator,
                    reason: e.to_string(),
                }
            })?;
            *session = Some(connected);
        }

        let mut report = PassReport::default();
        for destination in &profile.destinations {
            if !self.is_broadcasting().await {
                tracing::debug!(operator = %self.operator, "Stopped mid-pass");
                break;
            }
            let result = match session.as_deref() {
                Some(s) => s.send_message(destination, &profile.message).await,
                None => Err(TransportError::Unauthorized {
                    operator: self.operator,
                }),
            };
            match result {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    tracing::debug!(
                        operator = %self.operator,
                        destination = %destination,
                        error = %e,
                        "Send failed"
                    );
                    report.record_failure(&e);
                }
            }
        }

        if report.failed > 0 {
            tracing::warn!(
                operator = %self.operator,
                sent = report.sent,
                failed = report.failed,
                kind = ?report.last_failure_kind.unwrap_or(FailureKind::Transient),
                "Broadcast pass had failures"
            );
        } else {
            tracing::debug!(operator = %self.operator, sent = report.sent, "Broadcast pass complete");
        }

        // Reconnect next pass so a fresh login is picked up.
        if report.unauthorized
            && let Some(mut stale) = session.take()
        {
            let _ = stale.disconnect().await;
        }

        self.health.write().await.record_pass(&report);
        Ok(Duration::from_secs(profile.interval_seconds.max(1)))
    }
}
