//! Configuration, read from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::broadcast::{BroadcastConfig, DEFAULT_RECOVERY_BACKOFF};
use crate::error::ConfigError;
use crate::transport::HttpTransportConfig;

pub const DEFAULT_TRANSPORT_URL: &str = "http://127.0.0.1:8090";
pub const DEFAULT_DATA_FILE: &str = "data.json";
pub const DEFAULT_SESSIONS_DIR: &str = "sessions";

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: SecretString,
    pub api_id: i32,
    pub api_hash: SecretString,
    /// Base URL of the account gateway.
    pub transport_url: String,
    pub data_file: PathBuf,
    pub sessions_dir: PathBuf,
    /// Pause after a broadcast pass that could not run.
    pub recovery_backoff: Duration,
    /// Also read operator input from stdin.
    pub cli_enabled: bool,
    /// When set, logs are also written to a daily file in this directory.
    pub log_dir: Option<PathBuf>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require =
            |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let bot_token = SecretString::from(require("BOT_TOKEN")?);
        let api_id_raw = require("API_ID")?;
        let api_id: i32 = api_id_raw
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                key: "API_ID".into(),
                message: e.to_string(),
            })?;
        let api_hash = SecretString::from(require("API_HASH")?);

        let transport_url = get("ADBOT_TRANSPORT_URL")
            .unwrap_or_else(|| DEFAULT_TRANSPORT_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let data_file = get("ADBOT_DATA_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE));
        let sessions_dir = get("ADBOT_SESSIONS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSIONS_DIR));

        let recovery_backoff = match get("ADBOT_RECOVERY_BACKOFF_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs >= 1 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "ADBOT_RECOVERY_BACKOFF_SECS".into(),
                        message: format!("expected a positive integer, got {raw:?}"),
                    });
                }
            },
            None => DEFAULT_RECOVERY_BACKOFF,
        };

        let cli_enabled = get("ADBOT_CLI").is_some_and(|v| v.trim() == "1");
        let log_dir = get("ADBOT_LOG_DIR").map(PathBuf::from);

        Ok(Self {
            bot_token,
            api_id,
            api_hash,
            transport_url,
            data_file,
            sessions_dir,
            recovery_backoff,
            cli_enabled,
            log_dir,
        })
    }

    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            base_url: self.transport_url.clone(),
            api_id: self.api_id,
            api_hash: self.api_hash.clone(),
            sessions_dir: self.sessions_dir.clone(),
        }
    }

    pub fn broadcast_config(&self) -> BroadcastConfig {
        BroadcastConfig {
            recovery_backoff: self.recovery_backoff,
        }
    }
}
