//! Ride tracker configuration types.

use serde::{Deserialize, Serialize};

use crate::session::ActorRole;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideConfig {
    /// Backend base URL, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Current actor's contact email.
    #[serde(default)]
    pub actor_email: String,

    /// Current actor's role.
    #[serde(default)]
    pub actor_role: ActorRole,

    /// Endpoint paths relative to `base_url`.
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Timing parameters (seconds).
    #[serde(default)]
    pub timing: TimingConfig,

    /// Request shaping for the backend.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Backend endpoint paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_current_rides")]
    pub current_rides: String,
    #[serde(default = "default_accepted_requests")]
    pub accepted_requests: String,
    #[serde(default = "default_status_refresh")]
    pub status_refresh: String,
    #[serde(default = "default_update_status")]
    pub update_status: String,
    #[serde(default = "default_cancel_ride")]
    pub cancel_ride: String,
    #[serde(default = "default_active_requests")]
    pub active_requests: String,
    #[serde(default = "default_accept_requests")]
    pub accept_requests: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Client-side timeout for every backend request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Interval between refresh cycles in watch mode.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Max in-flight status refreshes per fan-out.
    #[serde(default = "default_refresh_concurrency")]
    pub refresh_concurrency: usize,

    /// Read requests per second (list, status refresh).
    #[serde(default = "default_reads_per_sec")]
    pub reads_per_sec: u32,

    /// Write requests per second (transition, cancel, accept).
    #[serde(default = "default_writes_per_sec")]
    pub writes_per_sec: u32,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "http://localhost:5000".into()
}

fn default_current_rides() -> String {
    "/currentRides".into()
}
fn default_accepted_requests() -> String {
    "/acceptedRequests".into()
}
fn default_status_refresh() -> String {
    "/updateStatusBar".into()
}
fn default_update_status() -> String {
    "/updateStatus".into()
}
fn default_cancel_ride() -> String {
    "/cancelRide".into()
}
fn default_active_requests() -> String {
    "/activeRequests".into()
}
fn default_accept_requests() -> String {
    "/acceptRequests".into()
}

fn default_request_timeout() -> u64 {
    15
}
fn default_poll_interval() -> u64 {
    30
}

fn default_refresh_concurrency() -> usize {
    8
}
fn default_reads_per_sec() -> u32 {
    20
}
fn default_writes_per_sec() -> u32 {
    5
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            current_rides: default_current_rides(),
            accepted_requests: default_accepted_requests(),
            status_refresh: default_status_refresh(),
            update_status: default_update_status(),
            cancel_ride: default_cancel_ride(),
            active_requests: default_active_requests(),
            accept_requests: default_accept_requests(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            refresh_concurrency: default_refresh_concurrency(),
            reads_per_sec: default_reads_per_sec(),
            writes_per_sec: default_writes_per_sec(),
        }
    }
}

impl Default for RideConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            actor_email: String::new(),
            actor_role: ActorRole::default(),
            endpoints: EndpointConfig::default(),
            timing: TimingConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_like_json_fills_defaults() {
        let cfg: RideConfig = serde_json::from_str(
            r#"{"base_url": "https://rides.example.org", "timing": {"poll_interval_secs": 5}}"#,
        )
        .expect("partial config should deserialize");

        assert_eq!(cfg.base_url, "https://rides.example.org");
        assert_eq!(cfg.timing.poll_interval_secs, 5);
        assert_eq!(cfg.timing.request_timeout_secs, 15);
        assert_eq!(cfg.endpoints.status_refresh, "/updateStatusBar");
        assert_eq!(cfg.limits.refresh_concurrency, 8);
        assert_eq!(cfg.actor_role, ActorRole::Senior);
    }
}
