//! Persistence layer: operator profiles behind an injected backend.

pub mod json_file;
pub mod locks;
#[cfg(test)]
pub mod memory;
pub mod session_store;
pub mod traits;

pub use json_file::JsonFileBackend;
pub use locks::OperatorLocks;
#[cfg(test)]
pub use memory::MemoryBackend;
pub use session_store::SessionStore;
pub use traits::{ProfileBackend, ProfileMap};
