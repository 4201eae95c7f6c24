//! Conversational command handling.

pub mod command;
pub mod dispatcher;

pub use command::{Command, MENU_ROWS, menu_labels};
pub use dispatcher::{Dispatcher, READY_BANNER, Reply, parse_interval};
