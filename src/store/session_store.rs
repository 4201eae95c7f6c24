//! SessionStore: the single source of truth for operator profiles.
//!
//! Profiles live in memory and are written back in full through the
//! injected `ProfileBackend` after every mutation. Read-modify-write for one
//! operator is serialized by a per-operator lock; whole-store saves are
//! serialized by a separate lock and always write the newest snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::locks::OperatorLocks;
use super::traits::{ProfileBackend, ProfileMap};
use crate::error::StoreError;
use crate::operator::{OperatorId, OperatorProfile};

/// Persistent mapping from operator id to profile.
pub struct SessionStore {
    backend: Arc<dyn ProfileBackend>,
    profiles: RwLock<HashMap<OperatorId, OperatorProfile>>,
    write_locks: OperatorLocks,
    save_lock: Mutex<()>,
}

impl SessionStore {
    /// Load every profile from `backend`.
    pub async fn open(backend: Arc<dyn ProfileBackend>) -> Result<Self, StoreError> {
        let stored = backend.load_all().await?;
        let mut profiles = HashMap::with_capacity(stored.len());
        for (key, profile) in stored {
            let id = key
                .parse::<OperatorId>()
                .map_err(|_| StoreError::InvalidKey(key.clone()))?;
            profiles.insert(id, profile);
        }

        tracing::info!(profiles = profiles.len(), "Loaded operator profiles");

        Ok(Self {
            backend,
            profiles: RwLock::new(profiles),
            write_locks: OperatorLocks::new(),
            save_lock: Mutex::new(()),
        })
    }

    /// Current profile of `operator`, if one exists. Pure read.
    pub async fn get(&self, operator: OperatorId) -> Option<OperatorProfile> {
        self.profiles.read().await.get(&operator).cloned()
    }

    /// Current profile of `operator`, creating and persisting the default
    /// profile on first contact.
    pub async fn get_or_create(&self, operator: OperatorId) -> Result<OperatorProfile, StoreError> {
        if let Some(profile) = self.get(operator).await {
            return Ok(profile);
        }
        self.update(operator, |profile| profile.clone()).await
    }

    /// Apply `f` to the operator's profile (created with defaults if absent)
    /// and persist the store if anything changed.
    ///
    /// On a persistence failure the operator's profile is rolled back to
    /// what it was before `f` ran and the error is returned, so a failed
    /// update never takes effect.
    pub async fn update<F, R>(&self, operator: OperatorId, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut OperatorProfile) -> R,
    {
        let _guard = self.write_locks.lock(operator).await;

        let existing = self.get(operator).await;
        let created = existing.is_none();
        let before = existing.unwrap_or_default();
        let mut profile = before.clone();
        let result = f(&mut profile);

        if created || profile != before {
            self.profiles.write().await.insert(operator, profile);
            if let Err(e) = self.persist().await {
                let mut profiles = self.profiles.write().await;
                if created {
                    profiles.remove(&operator);
                } else {
                    profiles.insert(operator, before);
                }
                tracing::warn!(operator = %operator, "Rolled back unsaved profile change");
                return Err(e);
            }
            if created {
                tracing::info!(operator = %operator, "Created operator profile");
            }
        }

        Ok(result)
    }

    /// Every profile, keyed by operator id.
    pub async fn snapshot(&self) -> HashMap<OperatorId, OperatorProfile> {
        self.profiles.read().await.clone()
    }

    /// Operators whose profile says a broadcast should be running.
    pub async fn broadcasting_operators(&self) -> Vec<OperatorId> {
        let mut ids: Vec<OperatorId> = self
            .profiles
            .read()
            .await
            .iter()
            .filter(|(_, p)| p.broadcasting)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let _save = self.save_lock.lock().await;
        let map: ProfileMap = self
            .profiles
            .read()
            .await
            .iter()
            .map(|(id, p)| (id.to_string(), p.clone()))
            .collect();
        if let Err(e) = self.backend.save_all(&map).await {
            tracing::error!(error = %e, "Failed to persist operator profiles");
            return Err(e);
        }
        Ok(())
    }
}
