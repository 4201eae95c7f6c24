//! Login flow: phone, one-time code, optional second-factor password.
//!
//! The auth manager drives an operator's `ConversationState` through the
//! login steps and owns the transport sessions that are mid-login.

pub mod code;
pub mod manager;

pub use code::parse_login_code;
pub use manager::{AuthManager, AuthStep};
