//! Unified error type for the ride tracker.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No actor identity available")]
    MissingIdentity,

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("SeniorGo API error (status={status}): {}", message.as_deref().unwrap_or("no message"))]
    Api { status: u16, message: Option<String> },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid transition for ride {ride_id}: {from} -> {to}")]
    InvalidTransition {
        ride_id: String,
        from: String,
        to: String,
    },

    #[error("Ride not found: {0}")]
    RideNotFound(String),
}

impl Error {
    /// True for failures where the request never got a server answer.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Timeout(_))
    }

    /// Server-provided rejection message, if the backend sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Error::Api {
                message: Some(m), ..
            } if !m.trim().is_empty() => Some(m.as_str()),
            _ => None,
        }
    }
}
