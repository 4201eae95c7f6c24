//! Operator profiles and their conversation state.

pub mod model;
pub mod state;

pub use model::{DEFAULT_INTERVAL_SECS, DEFAULT_MESSAGE, OperatorId, OperatorProfile};
pub use state::ConversationState;
