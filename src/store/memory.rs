//! In-memory backend for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::traits::{ProfileBackend, ProfileMap};
use crate::error::StoreError;

/// Keeps the "persisted" map in memory and counts saves.
#[derive(Default)]
pub struct MemoryBackend {
    profiles: Mutex<ProfileMap>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `profiles` already stored.
    pub fn with_profiles(profiles: ProfileMap) -> Self {
        Self {
            profiles: Mutex::new(profiles),
            ..Self::default()
        }
    }

    /// What a fresh load would return right now.
    pub fn stored(&self) -> ProfileMap {
        self.profiles
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Number of successful `save_all` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every following `save_all` fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileBackend for MemoryBackend {
    async fn load_all(&self) -> Result<ProfileMap, StoreError> {
        Ok(self.stored())
    }

    async fn save_all(&self, profiles: &ProfileMap) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Write {
                path: "memory".into(),
                reason: "disk full".into(),
            });
        }
        let mut stored = self
            .profiles
            .lock()
            .map_err(|e| StoreError::Write {
                path: "memory".into(),
                reason: e.to_string(),
            })?;
        // Round-trip through JSON so in-memory-only fields are dropped the
        // same way the file backend drops them.
        let json =
            serde_json::to_string(profiles).map_err(|e| StoreError::Serialization(e.to_string()))?;
        *stored =
            serde_json::from_str(&json).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
