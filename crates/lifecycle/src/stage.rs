//! The four-stage ride lifecycle.
//!
//! Stages are strictly ordered and only ever advance by one:
//! `accepted → volunteerStarted → rideStarted → rideEnded`.

use common::{RideScope, StatusToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Accepted,
    VolunteerStarted,
    RideStarted,
    RideEnded,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Accepted,
        Stage::VolunteerStarted,
        Stage::RideStarted,
        Stage::RideEnded,
    ];

    /// Parse a case-normalised token. `ended` is accepted as an alias of
    /// `rideended`.
    pub fn from_token(token: &StatusToken) -> Option<Stage> {
        match token.as_str() {
            "accepted" => Some(Stage::Accepted),
            "volunteerstarted" => Some(Stage::VolunteerStarted),
            "ridestarted" => Some(Stage::RideStarted),
            "rideended" | "ended" => Some(Stage::RideEnded),
            _ => None,
        }
    }

    /// Progress-bar position, 0 through 3.
    pub fn index(self) -> u8 {
        match self {
            Stage::Accepted => 0,
            Stage::VolunteerStarted => 1,
            Stage::RideStarted => 2,
            Stage::RideEnded => 3,
        }
    }

    /// Spelling the backend uses on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Stage::Accepted => "accepted",
            Stage::VolunteerStarted => "volunteerStarted",
            Stage::RideStarted => "rideStarted",
            Stage::RideEnded => "rideEnded",
        }
    }

    pub fn token(self) -> StatusToken {
        StatusToken::new(self.wire_name())
    }

    /// Short label for the progress bar segment.
    pub fn progress_label(self) -> &'static str {
        match self {
            Stage::Accepted => "Accepted",
            Stage::VolunteerStarted => "Started",
            Stage::RideStarted => "Driving",
            Stage::RideEnded => "Ended",
        }
    }

    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Accepted => Some(Stage::VolunteerStarted),
            Stage::VolunteerStarted => Some(Stage::RideStarted),
            Stage::RideStarted => Some(Stage::RideEnded),
            Stage::RideEnded => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Stage::RideEnded
    }

    /// Label of the single action control shown at this stage.
    pub fn action_label(self, scope: RideScope) -> &'static str {
        match (self, scope) {
            (Stage::Accepted, _) => "Volunteer Started",
            (Stage::VolunteerStarted, _) => "Ride Started",
            (Stage::RideStarted, _) => "Ride Ended",
            (Stage::RideEnded, RideScope::Requester) => "Remove Ride",
            (Stage::RideEnded, RideScope::Volunteer) => "Ride Ended",
        }
    }

    /// Whether the action control is usable. The terminal stage is only
    /// actionable where its action is a local removal.
    pub fn action_enabled(self, scope: RideScope) -> bool {
        !self.is_terminal() || scope == RideScope::Requester
    }
}

/// Raw progress index for a token, `-1` when the token is unrecognised.
pub fn stage_index(token: &StatusToken) -> i8 {
    Stage::from_token(token).map_or(-1, |s| s.index() as i8)
}
