//! Keyed async locks: one exclusive region per operator id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::operator::OperatorId;

/// Lazily created per-operator mutexes.
///
/// Holding the guard for one operator never blocks another operator.
#[derive(Default)]
pub struct OperatorLocks {
    locks: Mutex<HashMap<OperatorId, Arc<Mutex<()>>>>,
}

impl OperatorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `operator`.
    pub async fn lock(&self, operator: OperatorId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(operator).or_default())
        };
        lock.lock_owned().await
    }
}
