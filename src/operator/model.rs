//! Operator profile: the per-operator configuration record.

use serde::{Deserialize, Serialize};

use super::state::ConversationState;
use crate::transport::ChallengeToken;

/// Default broadcast cadence for a new operator.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Default broadcast text for a new operator.
pub const DEFAULT_MESSAGE: &str = "🔥 Default Ad Message 🔥";

/// Unique numeric identity of an operator (their Telegram user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(pub i64);

impl std::fmt::Display for OperatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OperatorId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(OperatorId)
    }
}

impl From<i64> for OperatorId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Persisted configuration and conversation state of one operator.
///
/// Stored in the profile file under the operator id's string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorProfile {
    /// Target chats, in send order. Duplicates are allowed.
    #[serde(default)]
    pub destinations: Vec<String>,
    /// Seconds to sleep after each full pass. Always ≥ 1.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// Text sent verbatim to every destination.
    #[serde(default = "default_message")]
    pub message: String,
    /// Desired run state of the broadcast loop.
    #[serde(default)]
    pub broadcasting: bool,
    /// Pending multi-step flow.
    #[serde(default)]
    pub conversation_state: ConversationState,
    /// Phone number of an in-progress login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Challenge from the last code request. Lives only in memory.
    #[serde(skip)]
    pub auth_challenge: Option<ChallengeToken>,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_message() -> String {
    DEFAULT_MESSAGE.to_string()
}

impl Default for OperatorProfile {
    fn default() -> Self {
        Self {
            destinations: Vec::new(),
            interval_seconds: DEFAULT_INTERVAL_SECS,
            message: DEFAULT_MESSAGE.to_string(),
            broadcasting: false,
            conversation_state: ConversationState::None,
            phone: None,
            auth_challenge: None,
        }
    }
}

impl OperatorProfile {
    /// Move to `target`, rejecting transitions the state machine forbids.
    pub fn transition_to(&mut self, target: ConversationState) -> Result<(), String> {
        if !self.conversation_state.can_transition_to(target) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.conversation_state, target
            ));
        }
        self.conversation_state = target;
        Ok(())
    }

    /// Abandon any pending flow and drop transient login data.
    pub fn reset_flow(&mut self) {
        self.conversation_state = ConversationState::None;
        self.clear_login();
    }

    /// Drop the phone number and challenge of an in-progress login.
    pub fn clear_login(&mut self) {
        self.phone = None;
        self.auth_challenge = None;
    }

    /// Remove the first occurrence of `destination`. Returns whether one was found.
    pub fn remove_destination(&mut self, destination: &str) -> bool {
        match self.destinations.iter().position(|d| d == destination) {
            Some(idx) => {
                self.destinations.remove(idx);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile() {
        let profile = OperatorProfile::default();
        assert!(profile.destinations.is_empty());
        assert_eq!(profile.interval_seconds, 60);
        assert!(!profile.broadcasting);
        assert_eq!(profile.conversation_state, ConversationState::None);
        assert!(profile.phone.is_none());
    }

    #[test]
    fn challenge_is_never_serialized() {
        let profile = OperatorProfile {
            phone: Some("+10000000000".into()),
            auth_challenge: Some(ChallengeToken::new("hash-abc")),
            conversation_state: ConversationState::AwaitingOtp,
            ..Default::default()
        };

        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("hash-abc"));

        let parsed: OperatorProfile = serde_json::from_str(&json).unwrap();
        assert!(parsed.auth_challenge.is_none());
        assert_eq!(parsed.phone.as_deref(), Some("+10000000000"));
        assert_eq!(parsed.conversation_state, ConversationState::AwaitingOtp);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let parsed: OperatorProfile = serde_json::from_str(r#"{"destinations": ["@a"]}"#).unwrap();
        assert_eq!(parsed.destinations, vec!["@a"]);
        assert_eq!(parsed.interval_seconds, DEFAULT_INTERVAL_SECS);
        assert_eq!(parsed.message, DEFAULT_MESSAGE);
    }

    #[test]
    fn remove_destination_removes_first_only() {
        let mut profile = OperatorProfile {
            destinations: vec!["@a".into(), "@b".into(), "@a".into()],
            ..Default::default()
        };
        assert!(profile.remove_destination("@a"));
        assert_eq!(profile.destinations, vec!["@b", "@a"]);
        assert!(!profile.remove_destination("@zzz"));
    }

    #[test]
    fn transition_rejects_parallel_flows() {
        let mut profile = OperatorProfile::default();
        profile
            .transition_to(ConversationState::AwaitingMessage)
            .unwrap();
        assert!(profile
            .transition_to(ConversationState::AwaitingInterval)
            .is_err());
        assert_eq!(profile.conversation_state, ConversationState::AwaitingMessage);
    }

    #[test]
    fn reset_flow_clears_login() {
        let mut profile = OperatorProfile {
            conversation_state: ConversationState::AwaitingOtp,
            phone: Some("+1".into()),
            auth_challenge: Some(ChallengeToken::new("x")),
            ..Default::default()
        };
        profile.reset_flow();
        assert_eq!(profile.conversation_state, ConversationState::None);
        assert!(profile.phone.is_none());
        assert!(profile.auth_challenge.is_none());
    }

    #[test]
    fn operator_id_parses() {
        assert_eq!(" 42 ".parse::<OperatorId>().unwrap(), OperatorId(42));
        assert!("abc".parse::<OperatorId>().is_err());
        assert_eq!(OperatorId(-100).to_string(), "-100");
    }
}
