//! Supervisor for per-operator broadcast loops.
//!
//! At most one loop runs per operator. The `broadcasting` flag in the
//! operator's profile is the source of truth: loops exit on their own once
//! they observe it false, and `stop` only clears the flag and wakes the loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, Notify, RwLock};

use super::health::LoopHealth;
use super::runner::{LoopContext, LoopTable, TrackedLoop, run_loop};
use crate::error::{BroadcastError, StoreError};
use crate::operator::{OperatorId, OperatorProfile};
use crate::store::SessionStore;
use crate::transport::Transport;

/// Default pause after a pass that could not run.
pub const DEFAULT_RECOVERY_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub recovery_backoff: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            recovery_backoff: DEFAULT_RECOVERY_BACKOFF,
        }
    }
}

/// Result of a successful `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Read-only view of an operator's broadcast configuration and loop.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastStatus {
    pub destinations: usize,
    pub interval_seconds: u64,
    pub broadcasting: bool,
    pub message: String,
    pub loop_running: bool,
    pub health: Option<LoopHealth>,
}

pub struct BroadcastManager {
    store: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
    config: BroadcastConfig,
    loops: LoopTable,
    next_generation: AtomicU64,
}

impl BroadcastManager {
    pub fn new(
        store: Arc<SessionStore>,
        transport: Arc<dyn Transport>,
        config: BroadcastConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
            loops: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Set the flag and make sure a loop is running.
    pub async fn start(&self, operator: OperatorId) -> Result<StartOutcome, BroadcastError> {
        let started = self
            .store
            .update(operator, |p| {
                if p.destinations.is_empty() {
                    return false;
                }
                p.broadcasting = true;
                true
            })
            .await?;
        if !started {
            return Err(BroadcastError::NoDestinations { operator });
        }

        let outcome = self.ensure_loop(operator).await;
        tracing::info!(operator = %operator, ?outcome, "Broadcast start requested");
        Ok(outcome)
    }

    /// Clear the flag and wake the loop so it exits promptly.
    ///
    /// Returns whether the operator was broadcasting.
    pub async fn stop(&self, operator: OperatorId) -> Result<bool, BroadcastError> {
        let was_running = self
            .store
            .update(operator, |p| std::mem::replace(&mut p.broadcasting, false))
            .await?;
        if let Some(tracked) = self.loops.lock().await.get(&operator) {
            tracked.wake.notify_one();
        }
        tracing::info!(operator = %operator, was_running, "Broadcast stop requested");
        Ok(was_running)
    }

    /// Pure read; unknown operators report default settings.
    pub async fn status(&self, operator: OperatorId) -> BroadcastStatus {
        let profile = self.store.get(operator).await.unwrap_or_default();
        let health = match self.loops.lock().await.get(&operator) {
            Some(tracked) if !tracked.handle.is_finished() => {
                Some(Arc::clone(&tracked.health))
            }
            _ => None,
        };
        let health = match health {
            Some(h) => Some(h.read().await.clone()),
            None => None,
        };
        status_from(&profile, health)
    }

    /// Restart loops for every operator persisted as broadcasting.
    ///
    /// Profiles flagged as broadcasting with no destinations are corrected.
    pub async fn resume_all(&self) -> Result<usize, StoreError> {
        let mut resumed = 0;
        for operator in self.store.broadcasting_operators().await {
            let has_destinations = self
                .store
                .update(operator, |p| {
                    if p.destinations.is_empty() {
                        p.broadcasting = false;
                    }
                    p.broadcasting
                })
                .await?;
            if !has_destinations {
                tracing::warn!(operator = %operator, "Broadcast flag cleared, no destinations");
                continue;
            }
            if self.ensure_loop(operator).await == StartOutcome::Started {
                resumed += 1;
            }
        }
        if resumed > 0 {
            tracing::info!(count = resumed, "Resumed broadcast loops");
        }
        Ok(resumed)
    }

    /// Abort every loop. Flags are left as persisted so loops resume on
    /// the next startup.
    pub async fn shutdown(&self) {
        let mut loops = self.loops.lock().await;
        for (operator, tracked) in loops.drain() {
            tracked.handle.abort();
            tracing::debug!(operator = %operator, "Broadcast loop aborted");
        }
    }

    pub async fn is_running(&self, operator: OperatorId) -> bool {
        self.loops
            .lock()
            .await
            .get(&operator)
            .is_some_and(|t| !t.handle.is_finished())
    }

    pub async fn running_count(&self) -> usize {
        self.loops
            .lock()
            .await
            .values()
            .filter(|t| !t.handle.is_finished())
            .count()
    }

    async fn ensure_loop(&self, operator: OperatorId) -> StartOutcome {
        let mut loops = self.loops.lock().await;
        if loops
            .get(&operator)
            .is_some_and(|t| !t.handle.is_finished())
        {
            return StartOutcome::AlreadyRunning;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let wake = Arc::new(Notify::new());
        let health = Arc::new(RwLock::new(LoopHealth::new()));
        let ctx = LoopContext {
            operator,
            generation,
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
            loops: Arc::clone(&self.loops),
            wake: Arc::clone(&wake),
            health: Arc::clone(&health),
            recovery_backoff: self.config.recovery_backoff,
        };
        // The task cannot take the table lock until we release it below.
        let handle = tokio::spawn(run_loop(ctx));
        loops.insert(
            operator,
            TrackedLoop {
                generation,
                handle,
                wake,
                health,
            },
        );
        StartOutcome::Started
    }
}

fn status_from(profile: &OperatorProfile, health: Option<LoopHealth>) -> BroadcastStatus {
    BroadcastStatus {
        destinations: profile.destinations.len(),
        interval_seconds: profile.interval_seconds,
        broadcasting: profile.broadcasting,
        message: profile.message.clone(),
        loop_running: health.is_some(),
        health,
    }
}
