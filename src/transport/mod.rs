//! Messaging-account transport abstraction.
//!
//! A `Transport` hands out one `TransportSession` per operator. Authenticated
//! session material is addressed by operator id and survives restarts as an
//! opaque artifact owned by the transport.

pub mod http;
#[cfg(test)]
pub mod mock;

pub use http::{HttpTransport, HttpTransportConfig};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::operator::OperatorId;

/// Opaque value returned by a code request, required to complete sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct ChallengeToken(String);

impl ChallengeToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keep challenge values out of logs.
impl std::fmt::Debug for ChallengeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChallengeToken(..)")
    }
}

/// Result of submitting a one-time code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInOutcome {
    /// The session is now authorized.
    SignedIn,
    /// The account has a second-factor password that must be checked next.
    PasswordRequired,
}

/// Factory for per-operator transport sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session for `operator`, reusing its stored artifact if any.
    async fn connect(&self, operator: OperatorId)
    -> Result<Box<dyn TransportSession>, TransportError>;

    /// Discard the operator's stored session artifact.
    ///
    /// Returns whether an artifact existed.
    async fn remove_session(&self, operator: OperatorId) -> Result<bool, TransportError>;
}

/// A connected messaging-account session for one operator.
#[async_trait]
pub trait TransportSession: Send + Sync {
    /// Ask the platform to send a login code to `phone`.
    async fn request_code(&mut self, phone: &str) -> Result<ChallengeToken, TransportError>;

    /// Complete sign-in with the code the operator received.
    async fn sign_in(
        &mut self,
        phone: &str,
        code: &str,
        challenge: &ChallengeToken,
    ) -> Result<SignInOutcome, TransportError>;

    /// Check the second-factor password after `SignInOutcome::PasswordRequired`.
    async fn sign_in_with_password(&mut self, password: &str) -> Result<(), TransportError>;

    /// Whether this session can send messages.
    async fn is_authorized(&self) -> Result<bool, TransportError>;

    /// Send `text` to `destination` (a chat id or @handle).
    async fn send_message(&self, destination: &str, text: &str) -> Result<(), TransportError>;

    /// Release the connection. The stored artifact is kept.
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}
