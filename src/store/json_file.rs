//! JSON file backend: the whole profile map as one pretty-printed object.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::traits::{ProfileBackend, ProfileMap};
use crate::error::StoreError;

/// Stores all profiles in a single JSON file.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "data.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ProfileBackend for JsonFileBackend {
    async fn load_all(&self) -> Result<ProfileMap, StoreError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ProfileMap::new()),
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        if raw.trim().is_empty() {
            return Ok(ProfileMap::new());
        }

        serde_json::from_str(&raw).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn save_all(&self, profiles: &ProfileMap) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(profiles)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let write_err = |e: std::io::Error| StoreError::Write {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        // Write-then-rename so a crash never leaves a truncated file.
        let tmp = self.temp_path();
        fs::write(&tmp, json).await.map_err(write_err)?;
        fs::rename(&tmp, &self.path).await.map_err(write_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{ConversationState, OperatorProfile};

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("data.json"));
        assert!(backend.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "  \n").unwrap();
        let backend = JsonFileBackend::new(path);
        assert!(backend.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{not json").unwrap();
        let backend = JsonFileBackend::new(path);
        assert!(matches!(
            backend.load_all().await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("nested").join("data.json"));

        let mut profiles = ProfileMap::new();
        profiles.insert(
            "123".into(),
            OperatorProfile {
                destinations: vec!["@a".into(), "-100200".into(), "@a".into()],
                interval_seconds: 1,
                message: "Привет 👋\nline two".into(),
                broadcasting: true,
                conversation_state: ConversationState::AwaitingInterval,
                ..Default::default()
            },
        );
        profiles.insert(
            "456".into(),
            OperatorProfile {
                message: String::new(),
                ..Default::default()
            },
        );

        backend.save_all(&profiles).await.unwrap();
        let loaded = backend.load_all().await.unwrap();
        assert_eq!(loaded, profiles);
        assert!(!backend.temp_path().exists());
    }

    #[tokio::test]
    async fn file_uses_readable_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let backend = JsonFileBackend::new(&path);

        let mut profiles = ProfileMap::new();
        profiles.insert("7".into(), OperatorProfile::default());
        backend.save_all(&profiles).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["7"]["interval_seconds"], 60);
        assert_eq!(raw["7"]["conversation_state"], "none");
        assert!(raw["7"].get("auth_challenge").is_none());
    }
}
