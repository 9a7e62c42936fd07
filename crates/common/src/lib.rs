//! Shared types, config, and error definitions for the ride tracker.

pub mod config;
pub mod error;
pub mod session;
pub mod types;

pub use config::RideConfig;
pub use error::Error;
pub use session::{ActorRole, Session};
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
