//! Conversation state machine: tracks which multi-step flow an operator is in.

use serde::{Deserialize, Serialize};

/// The single pending input an operator's next free-text message answers.
///
/// Exactly one of these is active per operator. `None` means the next free
/// text is not part of any flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    None,
    AwaitingPhone,
    AwaitingOtp,
    AwaitingPassword,
    AwaitingMessage,
    AwaitingAddChat,
    AwaitingRemoveChat,
    AwaitingInterval,
}

impl ConversationState {
    /// Every state, in declaration order.
    pub const ALL: [ConversationState; 8] = [
        Self::None,
        Self::AwaitingPhone,
        Self::AwaitingOtp,
        Self::AwaitingPassword,
        Self::AwaitingMessage,
        Self::AwaitingAddChat,
        Self::AwaitingRemoveChat,
        Self::AwaitingInterval,
    ];

    /// Whether this state belongs to the login flow.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::AwaitingPhone | Self::AwaitingOtp | Self::AwaitingPassword
        )
    }

    /// Whether a multi-step flow is pending.
    pub fn is_pending(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Any state may be abandoned back to `None`, and a fresh flow may only be
    /// entered from `None`. Within the login flow the steps are linear, except
    /// that a password rejection keeps the operator at `AwaitingPassword`.
    pub fn can_transition_to(&self, target: ConversationState) -> bool {
        use ConversationState::*;
        match (self, target) {
            (_, None) => true,
            (None, AwaitingPhone)
            | (None, AwaitingMessage)
            | (None, AwaitingAddChat)
            | (None, AwaitingRemoveChat)
            | (None, AwaitingInterval) => true,
            (AwaitingPhone, AwaitingOtp) => true,
            (AwaitingOtp, AwaitingPassword) => true,
            (AwaitingPassword, AwaitingPassword) => true,
            _ => false,
        }
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::AwaitingPhone => "awaiting_phone",
            Self::AwaitingOtp => "awaiting_otp",
            Self::AwaitingPassword => "awaiting_password",
            Self::AwaitingMessage => "awaiting_message",
            Self::AwaitingAddChat => "awaiting_add_chat",
            Self::AwaitingRemoveChat => "awaiting_remove_chat",
            Self::AwaitingInterval => "awaiting_interval",
        };
        write!(f, "{s}")
    }
}
