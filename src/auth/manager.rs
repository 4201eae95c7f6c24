//! AuthManager: the per-operator login state machine.
//!
//! ```text
//! none ──login──▶ awaiting_phone ──phone──▶ awaiting_otp ──code──▶ none
//!                                                  │
//!                                                  └──password needed──▶ awaiting_password ──password──▶ none
//! ```
//!
//! Failures reset to `none` except a malformed code (stays at
//! `awaiting_otp`) and a rejected password (stays at `awaiting_password`).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::code::parse_login_code;
use crate::error::{AuthError, TransportError};
use crate::operator::{ConversationState, OperatorId};
use crate::store::SessionStore;
use crate::transport::{SignInOutcome, Transport, TransportSession};

/// Successful outcome of a login step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    /// Waiting for the phone number.
    PhoneRequested,
    /// A code was sent to the phone; waiting for `code<digits>`.
    CodeSent,
    /// The account has a second-factor password; waiting for it.
    SecondFactorRequired,
    /// The session is authorized.
    LoggedIn,
}

/// Drives operators through login and owns their mid-login sessions.
pub struct AuthManager {
    store: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
    /// Connected sessions between login steps, one per operator.
    pending: Mutex<HashMap<OperatorId, Box<dyn TransportSession>>>,
}

impl AuthManager {
    pub fn new(store: Arc<SessionStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            transport,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Start a fresh login, abandoning any flow in progress.
    pub async fn begin_login(&self, operator: OperatorId) -> Result<AuthStep, AuthError> {
        self.release_pending(operator).await;
        self.store
            .update(operator, |p| {
                p.reset_flow();
                p.conversation_state = ConversationState::AwaitingPhone;
            })
            .await?;
        tracing::info!(operator = %operator, "Login started");
        Ok(AuthStep::PhoneRequested)
    }

    /// Submit the phone number and request a login code.
    pub async fn submit_phone(
        &self,
        operator: OperatorId,
        phone: &str,
    ) -> Result<AuthStep, AuthError> {
        self.expect_state(operator, ConversationState::AwaitingPhone)
            .await?;
        let phone = phone.trim().to_string();

        let mut session = match self.transport.connect(operator).await {
            Ok(s) => s,
            Err(e) => {
                self.fail_login(operator).await?;
                return Err(e.into());
            }
        };

        let challenge = match session.request_code(&phone).await {
            Ok(c) => c,
            Err(e) => {
                let _ = session.disconnect().await;
                self.fail_login(operator).await?;
                tracing::warn!(operator = %operator, error = %e, "Code request failed");
                return Err(match e {
                    TransportError::InvalidPhone(reason) => AuthError::InvalidPhone(reason),
                    other => AuthError::Transport(other),
                });
            }
        };

        self.store
            .update(operator, |p| {
                p.phone = Some(phone);
                p.auth_challenge = Some(challenge);
                p.transition_to(ConversationState::AwaitingOtp)
            })
            .await?
            .map_err(|_| AuthError::NotInProgress)?;

        self.pending.lock().await.insert(operator, session);
        tracing::info!(operator = %operator, "Login code requested");
        Ok(AuthStep::CodeSent)
    }

    /// Submit `code<digits>`.
    ///
    /// A malformed input leaves the operator at `awaiting_otp` with the
    /// challenge intact. Any other failure ends the login attempt.
    pub async fn submit_code(
        &self,
        operator: OperatorId,
        input: &str,
    ) -> Result<AuthStep, AuthError> {
        self.expect_state(operator, ConversationState::AwaitingOtp)
            .await?;
        let code = parse_login_code(input).ok_or(AuthError::InvalidCodeFormat)?;

        // The challenge is single-use: take it before talking to the transport.
        let (phone, challenge) = self
            .store
            .update(operator, |p| (p.phone.clone(), p.auth_challenge.take()))
            .await?;

        let (Some(phone), Some(challenge)) = (phone, challenge) else {
            self.release_pending(operator).await;
            self.fail_login(operator).await?;
            tracing::warn!(operator = %operator, "Code submitted without a live challenge");
            return Err(AuthError::SignInRejected(
                "login expired, please start again".into(),
            ));
        };

        let mut session = match self.take_or_connect(operator).await {
            Ok(s) => s,
            Err(e) => {
                self.fail_login(operator).await?;
                return Err(AuthError::SignInRejected(e.to_string()));
            }
        };

        match session.sign_in(&phone, code, &challenge).await {
            Ok(SignInOutcome::SignedIn) => {
                let _ = session.disconnect().await;
                self.finish_login(operator).await
            }
            Ok(SignInOutcome::PasswordRequired) | Err(TransportError::PasswordRequired) => {
                self.store
                    .update(operator, |p| {
                        p.transition_to(ConversationState::AwaitingPassword)
                    })
                    .await?
                    .map_err(|_| AuthError::NotInProgress)?;
                self.pending.lock().await.insert(operator, session);
                tracing::info!(operator = %operator, "Second-factor password required");
                Ok(AuthStep::SecondFactorRequired)
            }
            Err(e) => {
                let _ = session.disconnect().await;
                self.fail_login(operator).await?;
                tracing::warn!(operator = %operator, error = %e, "Sign-in rejected");
                Err(AuthError::SignInRejected(e.to_string()))
            }
        }
    }

    /// Submit the second-factor password. A rejection keeps the operator at
    /// `awaiting_password` so they can try again.
    ///
    /// The password only completes the sign-in started on the mid-login
    /// session; without it the login has expired and resets to `none`.
    pub async fn submit_password(
        &self,
        operator: OperatorId,
        password: &str,
    ) -> Result<AuthStep, AuthError> {
        self.expect_state(operator, ConversationState::AwaitingPassword)
            .await?;

        let pending = self.pending.lock().await.remove(&operator);
        let Some(mut session) = pending else {
            self.fail_login(operator).await?;
            tracing::warn!(operator = %operator, "Password submitted without a live sign-in");
            return Err(AuthError::SignInRejected(
                "login expired, please start again".into(),
            ));
        };

        match session.sign_in_with_password(password.trim()).await {
            Ok(()) => {
                let _ = session.disconnect().await;
                self.finish_login(operator).await
            }
            Err(e) => {
                self.pending.lock().await.insert(operator, session);
                tracing::warn!(operator = %operator, error = %e, "Password rejected");
                Err(AuthError::PasswordRejected(e.to_string()))
            }
        }
    }

    /// Discard the operator's authenticated session.
    ///
    /// Succeeds whether or not a session existed; returns whether one did.
    /// The profile itself, including `broadcasting`, is left alone apart from
    /// abandoning an in-progress login.
    pub async fn logout(&self, operator: OperatorId) -> Result<bool, AuthError> {
        self.release_pending(operator).await;
        let existed = self.transport.remove_session(operator).await?;
        self.store
            .update(operator, |p| {
                if p.conversation_state.is_auth() {
                    p.reset_flow();
                } else {
                    p.clear_login();
                }
            })
            .await?;
        tracing::info!(operator = %operator, existed, "Logged out");
        Ok(existed)
    }

    /// Drop any mid-login session for `operator` without touching the profile.
    pub async fn abandon(&self, operator: OperatorId) {
        self.release_pending(operator).await;
    }

    /// Whether the operator's stored session is authorized.
    pub async fn is_logged_in(&self, operator: OperatorId) -> bool {
        match self.transport.connect(operator).await {
            Ok(mut session) => {
                let authorized = session.is_authorized().await.unwrap_or(false);
                let _ = session.disconnect().await;
                authorized
            }
            Err(_) => false,
        }
    }

    async fn expect_state(
        &self,
        operator: OperatorId,
        expected: ConversationState,
    ) -> Result<(), AuthError> {
        let profile = self.store.get_or_create(operator).await?;
        if profile.conversation_state != expected {
            return Err(AuthError::NotInProgress);
        }
        Ok(())
    }

    async fn take_or_connect(
        &self,
        operator: OperatorId,
    ) -> Result<Box<dyn TransportSession>, TransportError> {
        let pending = self.pending.lock().await.remove(&operator);
        match pending {
            Some(session) => Ok(session),
            None => self.transport.connect(operator).await,
        }
    }

    async fn release_pending(&self, operator: OperatorId) {
        let pending = self.pending.lock().await.remove(&operator);
        if let Some(mut session) = pending {
            let _ = session.disconnect().await;
        }
    }

    async fn finish_login(&self, operator: OperatorId) -> Result<AuthStep, AuthError> {
        self.store.update(operator, |p| p.reset_flow()).await?;
        tracing::info!(operator = %operator, "Login successful");
        Ok(AuthStep::LoggedIn)
    }

    async fn fail_login(&self, operator: OperatorId) -> Result<(), AuthError> {
        self.store.update(operator, |p| p.reset_flow()).await?;
        Ok(())
    }
}
