//! Routes operator text to the auth machine, config mutators and broadcast
//! manager.
//!
//! Menu commands are matched first in every state; a command issued while a
//! flow is pending abandons that flow. Anything else is answered by the
//! handler for the operator's current `ConversationState`.

use std::sync::Arc;

use super::command::Command;
use crate::auth::{AuthManager, AuthStep};
use crate::broadcast::{BroadcastManager, BroadcastStatus, StartOutcome};
use crate::error::{AuthError, BroadcastError, CommandError, Error, Result};
use crate::operator::{ConversationState, OperatorId};
use crate::store::{OperatorLocks, SessionStore};

pub const READY_BANNER: &str = "🚀 AdBot is Ready!";

const HELP_TEXT: &str = "Use the menu below to manage your ads.";

/// Text sent back to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Attach the menu keyboard.
    pub show_menu: bool,
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            show_menu: false,
        }
    }

    pub fn with_menu(mut self) -> Self {
        self.show_menu = true;
        self
    }
}

pub struct Dispatcher {
    store: Arc<SessionStore>,
    auth: Arc<AuthManager>,
    broadcast: Arc<BroadcastManager>,
    /// Serializes event handling per operator.
    event_locks: OperatorLocks,
}

impl Dispatcher {
    pub fn new(
        store: Arc<SessionStore>,
        auth: Arc<AuthManager>,
        broadcast: Arc<BroadcastManager>,
    ) -> Self {
        Self {
            store,
            auth,
            broadcast,
            event_locks: OperatorLocks::new(),
        }
    }

    /// Session start: make sure the profile exists and show the menu.
    pub async fn on_start(&self, operator: OperatorId) -> Reply {
        let _guard = self.event_locks.lock(operator).await;
        match self.store.get_or_create(operator).await {
            Ok(_) => Reply::new(READY_BANNER).with_menu(),
            Err(e) => error_reply(operator, &e.into()),
        }
    }

    /// Handle one text event and produce the reply. Never fails: errors are
    /// turned into reply text.
    pub async fn on_event(&self, operator: OperatorId, text: &str) -> Reply {
        let _guard = self.event_locks.lock(operator).await;
        let result = match Command::parse(text) {
            Some(command) => self.run_command(operator, command).await,
            None => self.continue_flow(operator, text).await,
        };
        result.unwrap_or_else(|e| error_reply(operator, &e))
    }

    async fn run_command(&self, operator: OperatorId, command: Command) -> Result<Reply> {
        tracing::debug!(operator = %operator, ?command, "Command");
        let abandoned = self.abandon_flow(operator).await?;

        let reply = match command {
            Command::Start => Reply::new(READY_BANNER).with_menu(),
            Command::Menu => Reply::new(HELP_TEXT).with_menu(),
            Command::Cancel => match abandoned {
                Some(state) => Reply::new(format!("Cancelled ({state})")),
                None => Reply::new("Nothing to cancel"),
            },
            Command::Login => {
                self.auth.begin_login(operator).await?;
                Reply::new("Send your phone number (+91xxxx)")
            }
            Command::Logout => {
                if self.auth.logout(operator).await? {
                    Reply::new("Logged out")
                } else {
                    Reply::new("Logged out (no saved session)")
                }
            }
            Command::AddChat => {
                self.enter(operator, ConversationState::AwaitingAddChat).await?;
                Reply::new("Send chat id or username")
            }
            Command::RemoveChat => {
                self.enter(operator, ConversationState::AwaitingRemoveChat)
                    .await?;
                Reply::new("Send chat id to remove")
            }
            Command::SetMessage => {
                self.enter(operator, ConversationState::AwaitingMessage).await?;
                Reply::new("Send your ad message text")
            }
            Command::Interval => {
                self.enter(operator, ConversationState::AwaitingInterval)
                    .await?;
                Reply::new("Send seconds")
            }
            Command::ListChats => {
                let profile = self.store.get_or_create(operator).await?;
                Reply::new(format_destinations(&profile.destinations))
            }
            Command::StartAds => match self.broadcast.start(operator).await? {
                StartOutcome::Started => Reply::new("✅ Ads started"),
                StartOutcome::AlreadyRunning => Reply::new("Ads are already running"),
            },
            Command::StopAds => {
                if self.broadcast.stop(operator).await? {
                    Reply::new("✅ Ads stopped")
                } else {
                    Reply::new("Ads are not running")
                }
            }
            Command::Status => {
                Reply::new(format_status(&self.broadcast.status(operator).await))
            }
        };
        Ok(reply)
    }

    /// Free text: answered by the current state's handler.
    async fn continue_flow(&self, operator: OperatorId, text: &str) -> Result<Reply> {
        let profile = self.store.get_or_create(operator).await?;
        let text = text.trim();

        let reply = match profile.conversation_state {
            ConversationState::None => Reply::new(HELP_TEXT).with_menu(),
            ConversationState::AwaitingPhone => {
                step_reply(self.auth.submit_phone(operator, text).await?)
            }
            ConversationState::AwaitingOtp => {
                step_reply(self.auth.submit_code(operator, text).await?)
            }
            ConversationState::AwaitingPassword => {
                step_reply(self.auth.submit_password(operator, text).await?)
            }
            ConversationState::AwaitingMessage => {
                if text.is_empty() {
                    return Ok(Reply::new("Message cannot be empty, send the text again"));
                }
                let message = text.to_string();
                self.store
                    .update(operator, |p| {
                        p.message = message;
                        p.reset_flow();
                    })
                    .await?;
                Reply::new("✅ Message updated")
            }
            ConversationState::AwaitingAddChat => {
                if text.is_empty() {
                    return Ok(Reply::new("Chat cannot be empty, send the chat id or username"));
                }
                let destination = text.to_string();
                self.store
                    .update(operator, |p| {
                        p.destinations.push(destination);
                        p.reset_flow();
                    })
                    .await?;
                tracing::info!(operator = %operator, destination = %text, "Destination added");
                Reply::new("✅ Chat added")
            }
            ConversationState::AwaitingRemoveChat => {
                let removed = self
                    .store
                    .update(operator, |p| {
                        let removed = p.remove_destination(text);
                        p.reset_flow();
                        removed
                    })
                    .await?;
                if removed {
                    tracing::info!(operator = %operator, destination = %text, "Destination removed");
                    Reply::new("✅ Chat removed")
                } else {
                    Reply::new("That chat is not in your list")
                }
            }
            ConversationState::AwaitingInterval => {
                let seconds = parse_interval(text)?;
                self.store
                    .update(operator, |p| {
                        p.interval_seconds = seconds;
                        p.reset_flow();
                    })
                    .await?;
                Reply::new(format!("✅ Interval updated to {seconds}s"))
            }
        };
        Ok(reply)
    }

    /// Drop any pending flow. Returns the state that was abandoned.
    async fn abandon_flow(&self, operator: OperatorId) -> Result<Option<ConversationState>> {
        let previous = self
            .store
            .update(operator, |p| {
                let previous = p.conversation_state;
                if previous.is_pending() {
                    p.reset_flow();
                }
                previous
            })
            .await?;
        if !previous.is_pending() {
            return Ok(None);
        }
        if previous.is_auth() {
            self.auth.abandon(operator).await;
        }
        tracing::debug!(operator = %operator, state = %previous, "Flow abandoned");
        Ok(Some(previous))
    }

    async fn enter(&self, operator: OperatorId, state: ConversationState) -> Result<()> {
        self.store
            .update(operator, |p| p.transition_to(state))
            .await?
            .map_err(CommandError::Transition)?;
        Ok(())
    }
}

/// Parse an interval in whole seconds, at least one.
pub fn parse_interval(text: &str) -> std::result::Result<u64, CommandError> {
    match text.trim().parse::<u64>() {
        Ok(seconds) if seconds >= 1 => Ok(seconds),
        _ => Err(CommandError::InvalidInterval(text.trim().to_string())),
    }
}

fn step_reply(step: AuthStep) -> Reply {
    match step {
        AuthStep::PhoneRequested => Reply::new("Send your phone number (+91xxxx)"),
        AuthStep::CodeSent => Reply::new("Send OTP like: code12345"),
        AuthStep::SecondFactorRequired => {
            Reply::new("🔐 Two-step verification is enabled. Send your password")
        }
        AuthStep::LoggedIn => Reply::new("✅ Login successful"),
    }
}

fn format_destinations(destinations: &[String]) -> String {
    if destinations.is_empty() {
        return "No chats added yet".into();
    }
    destinations
        .iter()
        .enumerate()
        .map(|(i, d)| format!("{}. {d}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_status(status: &BroadcastStatus) -> String {
    let mut text = format!(
        "Chats: {}\nInterval: {}s\nRunning: {}\nMessage:\n{}",
        status.destinations, status.interval_seconds, status.broadcasting, status.message
    );
    if let Some(health) = &status.health {
        let label = if health.is_degraded() {
            "⚠️ failing"
        } else {
            "ok"
        };
        text.push_str(&format!(
            "\n\nLoop: {label}\nPasses: {}\nSent: {}\nFailed: {}",
            health.passes, health.sent, health.failed
        ));
        if let Some(err) = &health.last_error {
            text.push_str(&format!("\nLast error: {err}"));
        }
    }
    text
}

fn error_reply(operator: OperatorId, err: &Error) -> Reply {
    let text = match err {
        Error::Auth(AuthError::InvalidCodeFormat) => "OTP format must be: code12345".to_string(),
        Error::Auth(AuthError::InvalidPhone(_)) => {
            "❌ Invalid phone number. Tap 📱 Login to try again".to_string()
        }
        Error::Auth(AuthError::SignInRejected(reason)) => {
            format!("❌ Login failed: {reason}. Tap 📱 Login to try again")
        }
        Error::Auth(AuthError::PasswordRejected(_)) => {
            "❌ Wrong password, send it again".to_string()
        }
        Error::Auth(AuthError::NotInProgress) => {
            "No login in progress. Tap 📱 Login to start".to_string()
        }
        Error::Auth(AuthError::Transport(_)) => {
            "❌ Could not reach the messaging service. Tap 📱 Login to try again".to_string()
        }
        Error::Broadcast(BroadcastError::NoDestinations { .. }) => "Add chats first".to_string(),
        Error::Command(CommandError::InvalidInterval(_)) => {
            "Interval must be a whole number of seconds, at least 1".to_string()
        }
        other => {
            tracing::error!(operator = %operator, error = %other, "Event handling failed");
            return Reply::new("⚠️ Something went wrong, please try again");
        }
    };
    tracing::debug!(operator = %operator, error = %err, "Event rejected");
    Reply::new(text)
}
