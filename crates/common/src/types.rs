//! Domain and wire types shared across the ride tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ── Status tokens ─────────────────────────────────────────────────────

/// A ride status as the backend spells it, case-normalised.
///
/// Tokens are trimmed and lower-cased on construction so `"rideEnded"` and
/// `"rideended"` compare equal everywhere downstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StatusToken(String);

impl StatusToken {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StatusToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StatusToken {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl<'de> Deserialize<'de> for StatusToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}

/// Drop blank status strings so they fall through to the next source.
fn deserialize_optional_status<'de, D>(deserializer: D) -> Result<Option<StatusToken>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(StatusToken::new).filter(|t| !t.is_empty()))
}

/// Ride ids arrive as either JSON strings or numbers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "ride id must be a string or number, got {other}"
        ))),
    }
}

// ── Rides ─────────────────────────────────────────────────────────────

/// A single transportation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, alias = "userEmailAddress", alias = "emailaddress")]
    pub requester_contact: String,
    #[serde(default, alias = "currentlocation")]
    pub pickup_location: String,
    #[serde(default, alias = "dropofflocation")]
    pub dropoff_location: String,
    /// UTC timestamp string; treated as opaque by the lifecycle logic.
    #[serde(default)]
    pub pickup_date_time: Option<String>,
    #[serde(default, alias = "acceptedby")]
    pub accepted_by: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_status")]
    pub status: Option<StatusToken>,
}

impl Ride {
    /// Parsed pickup time, for presentation only.
    pub fn pickup_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.pickup_date_time.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Which list of rides a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideScope {
    /// Rides belonging to a requester (the "current rides" view).
    Requester,
    /// Rides accepted by a volunteer (the "approved rides" view).
    Volunteer,
}

impl RideScope {
    pub fn label(self) -> &'static str {
        match self {
            RideScope::Requester => "requester",
            RideScope::Volunteer => "volunteer",
        }
    }
}

// ── Request bodies ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRidesRequest<'a> {
    pub filter_contact: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatusRequest<'a> {
    pub ride_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest<'a> {
    pub ride_id: &'a str,
    pub current_status: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRideRequest<'a> {
    pub ride_id: &'a str,
    pub emailaddress: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenRequestsRequest<'a> {
    pub emailaddress: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptRequest<'a> {
    pub emailaddress: &'a str,
    pub id: &'a str,
}

// ── Response bodies ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RidesResponse {
    #[serde(default, alias = "currentRides", alias = "acceptedRequests")]
    pub rides: Vec<Ride>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    #[serde(default, deserialize_with = "deserialize_optional_status")]
    pub status: Option<StatusToken>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    #[serde(default, alias = "status", deserialize_with = "deserialize_optional_status")]
    pub new_status: Option<StatusToken>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequestsResponse {
    #[serde(default)]
    pub active_requests: Vec<Ride>,
}

/// Body of an acknowledgement or a non-2xx failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}
