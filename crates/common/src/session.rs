//! Actor identity passed explicitly into every projector operation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    #[default]
    Senior,
    Volunteer,
    Admin,
}

impl ActorRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "senior" | "rider" | "requester" => Some(ActorRole::Senior),
            "volunteer" | "driver" => Some(ActorRole::Volunteer),
            "admin" => Some(ActorRole::Admin),
            _ => None,
        }
    }
}

/// The current actor: who is looking at the rides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Session {
    pub contact: String,
    pub role: ActorRole,
}

impl Session {
    pub fn new(contact: impl Into<String>, role: ActorRole) -> Self {
        Self {
            contact: contact.into(),
            role,
        }
    }

    /// Contact email, trimmed; `None` when the actor is unidentified.
    pub fn contact(&self) -> Option<&str> {
        let trimmed = self.contact.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}
