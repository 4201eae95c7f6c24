//! Error types for adbot.

use crate::operator::OperatorId;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Profile persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to write {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid operator key in store: {0}")]
    InvalidKey(String),
}

/// Errors reported by the messaging-account transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Phone number rejected: {0}")]
    InvalidPhone(String),

    #[error("Session for operator {operator} is not authorized")]
    Unauthorized { operator: OperatorId },

    #[error("Password required to complete sign-in")]
    PasswordRequired,

    #[error("Transport rejected the request: {0}")]
    Rejected(String),

    #[error("Destination {destination} is invalid: {reason}")]
    InvalidDestination { destination: String, reason: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Session artifact error: {0}")]
    Artifact(String),
}

/// Failure category used by the broadcast loop to decide how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The session is not (or no longer) authorized; reconnect next pass.
    Unauthorized,
    /// This destination will keep failing until the operator removes it.
    InvalidDestination,
    /// Anything else; retried on the next pass.
    Transient,
}

impl TransportError {
    /// Classify the error for broadcast-loop bookkeeping.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unauthorized { .. } | Self::PasswordRequired => FailureKind::Unauthorized,
            Self::InvalidDestination { .. } => FailureKind::InvalidDestination,
            Self::InvalidPhone(_) | Self::Rejected(_) | Self::Network(_) | Self::Artifact(_) => {
                FailureKind::Transient
            }
        }
    }
}

/// Auth state machine failures. Every variant is reported to the operator as
/// a reply; none of them is fatal.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Code must look like code12345")]
    InvalidCodeFormat,

    #[error("Sign-in rejected: {0}")]
    SignInRejected(String),

    #[error("Password rejected: {0}")]
    PasswordRejected(String),

    #[error("Unexpected input for the current login step")]
    NotInProgress,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Broadcast manager errors.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("Operator {operator} has no destinations")]
    NoDestinations { operator: OperatorId },

    #[error("Broadcast pass for operator {operator} failed: {reason}")]
    PassFailed {
        operator: OperatorId,
        reason: String,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Command dispatcher input errors.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Interval must be a whole number of seconds ≥ 1, got {0:?}")]
    InvalidInterval(String),

    #[error("{0}")]
    Transition(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel {name} not registered")]
    UnknownChannel { name: String },
}

/// Result type alias for adbot.
pub type Result<T> = std::result::Result<T, Error>;
