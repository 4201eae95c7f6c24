//! `ProfileBackend` trait: whole-store persistence for operator profiles.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::operator::OperatorProfile;

/// Profiles keyed by the string form of the operator id.
pub type ProfileMap = BTreeMap<String, OperatorProfile>;

/// Backend-agnostic profile persistence.
///
/// The whole map is loaded once at startup and written back in full after
/// every mutation; the last write wins.
#[async_trait]
pub trait ProfileBackend: Send + Sync {
    /// Load every stored profile. A missing store is an empty map.
    async fn load_all(&self) -> Result<ProfileMap, StoreError>;

    /// Replace the stored profiles with `profiles`.
    async fn save_all(&self, profiles: &ProfileMap) -> Result<(), StoreError>;
}
