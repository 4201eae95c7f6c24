//! HTTP transport: talks JSON to an account gateway that owns the actual
//! messaging-platform connection.
//!
//! Authorized session strings are stored as opaque files
//! `<sessions_dir>/<operator id>.session`, so a login survives restarts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{ChallengeToken, SignInOutcome, Transport, TransportSession};
use crate::error::TransportError;
use crate::operator::OperatorId;

/// Per-request timeout applied by the HTTP client.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway error codes that mean the destination itself is unusable.
const DESTINATION_ERRORS: &[&str] = &[
    "PEER_ID_INVALID",
    "USERNAME_INVALID",
    "USERNAME_NOT_OCCUPIED",
    "CHAT_WRITE_FORBIDDEN",
    "CHANNEL_PRIVATE",
    "USER_BANNED_IN_CHANNEL",
];

/// Gateway error codes that mean the phone number was not accepted.
const PHONE_ERRORS: &[&str] = &["PHONE_NUMBER_INVALID", "PHONE_NUMBER_BANNED"];

/// Connection settings for the account gateway.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Gateway base URL, without trailing slash.
    pub base_url: String,
    pub api_id: i32,
    pub api_hash: SecretString,
    /// Directory holding one session artifact per operator.
    pub sessions_dir: PathBuf,
}

/// `Transport` backed by the account gateway.
pub struct HttpTransport {
    config: HttpTransportConfig,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Path of the session artifact for `operator`.
    pub fn session_path(&self, operator: OperatorId) -> PathBuf {
        session_path(&self.config.sessions_dir, operator)
    }
}

fn session_path(dir: &Path, operator: OperatorId) -> PathBuf {
    dir.join(format!("{operator}.session"))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(
        &self,
        operator: OperatorId,
    ) -> Result<Box<dyn TransportSession>, TransportError> {
        let path = self.session_path(operator);
        let session = match tokio::fs::read_to_string(&path).await {
            Ok(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Ok(_) => None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(TransportError::Artifact(format!("{}: {e}", path.display()))),
        };

        tracing::debug!(
            operator = %operator,
            has_artifact = session.is_some(),
            "Connected transport session"
        );

        Ok(Box::new(HttpSession {
            operator,
            base_url: self.config.base_url.trim_end_matches('/').to_string(),
            api_id: self.config.api_id,
            api_hash: self.config.api_hash.clone(),
            artifact_path: path,
            client: self.client.clone(),
            session,
            authorized: false,
        }))
    }

    async fn remove_session(&self, operator: OperatorId) -> Result<bool, TransportError> {
        let path = self.session_path(operator);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(operator = %operator, "Removed session artifact");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(TransportError::Artifact(format!("{}: {e}", path.display()))),
        }
    }
}

/// Failure body returned by the gateway on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct GatewayFailure {
    #[serde(default)]
    error: String,
    #[serde(default)]
    description: Option<String>,
}

impl GatewayFailure {
    fn reason(&self) -> String {
        match &self.description {
            Some(d) if !d.is_empty() => format!("{}: {d}", self.error),
            _ => self.error.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendCodeReply {
    phone_code_hash: String,
    session: String,
}

#[derive(Debug, Deserialize)]
struct SignInReply {
    session: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct SessionReply {
    session: String,
}

#[derive(Debug, Deserialize)]
struct StatusReply {
    authorized: bool,
}

#[derive(Debug, Deserialize)]
struct Empty {}

/// One operator's connection to the gateway.
struct HttpSession {
    operator: OperatorId,
    base_url: String,
    api_id: i32,
    api_hash: SecretString,
    artifact_path: PathBuf,
    client: reqwest::Client,
    /// Opaque gateway session string, if any.
    session: Option<String>,
    /// Set once sign-in completes in this process.
    authorized: bool,
}

/// Outcome of a gateway call that did not succeed.
enum CallError {
    Status(reqwest::StatusCode, GatewayFailure),
    Transport(TransportError),
}

impl HttpSession {
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        mut body: serde_json::Value,
    ) -> Result<T, CallError> {
        body["api_id"] = serde_json::json!(self.api_id);
        body["api_hash"] = serde_json::json!(self.api_hash.expose_secret());
        if let Some(ref session) = self.session {
            body["session"] = serde_json::json!(session);
        }

        let resp = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError::Transport(TransportError::Network(e.to_string())))?;

        let status = resp.status();
        if !status.is_success() {
            let failure = resp.json::<GatewayFailure>().await.unwrap_or_default();
            return Err(CallError::Status(status, failure));
        }

        resp.json::<T>()
            .await
            .map_err(|e| CallError::Transport(TransportError::Network(e.to_string())))
    }

    /// Default mapping for failures that have no step-specific meaning.
    fn map_failure(&self, err: CallError) -> TransportError {
        match err {
            CallError::Transport(e) => e,
            CallError::Status(status, _) if status == reqwest::StatusCode::UNAUTHORIZED => {
                TransportError::Unauthorized {
                    operator: self.operator,
                }
            }
            CallError::Status(status, failure) if status.is_server_error() => {
                TransportError::Network(format!("{status}: {}", failure.reason()))
            }
            CallError::Status(_, failure) => TransportError::Rejected(failure.reason()),
        }
    }

    async fn persist_artifact(&self) -> Result<(), TransportError> {
        let Some(ref session) = self.session else {
            return Ok(());
        };
        if let Some(parent) = self.artifact_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransportError::Artifact(e.to_string()))?;
        }
        tokio::fs::write(&self.artifact_path, session)
            .await
            .map_err(|e| TransportError::Artifact(e.to_string()))?;
        tracing::info!(operator = %self.operator, "Saved session artifact");
        Ok(())
    }
}

#[async_trait]
impl TransportSession for HttpSession {
    async fn request_code(&mut self, phone: &str) -> Result<ChallengeToken, TransportError> {
        let reply: SendCodeReply = self
            .call("auth/sendCode", serde_json::json!({ "phone": phone }))
            .await
            .map_err(|e| match e {
                CallError::Status(_, ref failure) if PHONE_ERRORS.contains(&failure.error.as_str()) => {
                    TransportError::InvalidPhone(failure.reason())
                }
                other => self.map_failure(other),
            })?;

        self.session = Some(reply.session);
        Ok(ChallengeToken::new(reply.phone_code_hash))
    }

    async fn sign_in(
        &mut self,
        phone: &str,
        code: &str,
        challenge: &ChallengeToken,
    ) -> Result<SignInOutcome, TransportError> {
        let reply: SignInReply = self
            .call(
                "auth/signIn",
                serde_json::json!({
                    "phone": phone,
                    "code": code,
                    "phone_code_hash": challenge.as_str(),
                }),
            )
            .await
            .map_err(|e| self.map_failure(e))?;

        self.session = Some(reply.session);
        if reply.status == "password_required" {
            return Ok(SignInOutcome::PasswordRequired);
        }

        self.authorized = true;
        self.persist_artifact().await?;
        Ok(SignInOutcome::SignedIn)
    }

    async fn sign_in_with_password(&mut self, password: &str) -> Result<(), TransportError> {
        let reply: SessionReply = self
            .call(
                "auth/checkPassword",
                serde_json::json!({ "password": password }),
            )
            .await
            .map_err(|e| self.map_failure(e))?;

        self.session = Some(reply.session);
        self.authorized = true;
        self.persist_artifact().await
    }

    async fn is_authorized(&self) -> Result<bool, TransportError> {
        if self.authorized {
            return Ok(true);
        }
        if self.session.is_none() {
            return Ok(false);
        }
        let reply: StatusReply = self
            .call("auth/status", serde_json::json!({}))
            .await
            .map_err(|e| self.map_failure(e))?;
        Ok(reply.authorized)
    }

    async fn send_message(&self, destination: &str, text: &str) -> Result<(), TransportError> {
        // Logout removes the artifact; live sessions stop sending with it.
        let has_artifact = tokio::fs::try_exists(&self.artifact_path)
            .await
            .map_err(|e| {
                TransportError::Artifact(format!("{}: {e}", self.artifact_path.display()))
            })?;
        if self.session.is_none() || !has_artifact {
            return Err(TransportError::Unauthorized {
                operator: self.operator,
            });
        }

        self.call::<Empty>(
            "messages/send",
            serde_json::json!({ "peer": destination, "text": text }),
        )
        .await
        .map_err(|e| match e {
            CallError::Status(_, ref failure)
                if DESTINATION_ERRORS.contains(&failure.error.as_str()) =>
            {
                TransportError::InvalidDestination {
                    destination: destination.to_string(),
                    reason: failure.reason(),
                }
            }
            other => self.map_failure(other),
        })?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.authorized = false;
        tracing::debug!(operator = %self.operator, "Disconnected transport session");
        Ok(())
    }
}
