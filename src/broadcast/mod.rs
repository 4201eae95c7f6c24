//! Broadcast loops: one background task per broadcasting operator.

pub mod health;
pub mod manager;
mod runner;

pub use health::{DEGRADED_AFTER_PASSES, LoopHealth, PassReport};
pub use manager::{
    BroadcastConfig, BroadcastManager, BroadcastStatus, DEFAULT_RECOVERY_BACKOFF, StartOutcome,
};
