//! adbot: per-operator login and interval ad broadcasting over a
//! conversational bot front-end.

pub mod auth;
pub mod bot;
pub mod broadcast;
pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod operator;
pub mod store;
pub mod transport;
