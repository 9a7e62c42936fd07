//! REST client for the SeniorGo backend.
//!
//! Every endpoint is a JSON `POST`. Reads and writes go through separate
//! rate-limit buckets and every request carries the configured timeout.

use async_trait::async_trait;
use common::config::{EndpointConfig, RideConfig};
use common::{
    AcceptRequest, CancelRideRequest, Error, ListRidesRequest, MessageResponse,
    OpenRequestsRequest, OpenRequestsResponse, RefreshStatusRequest, Result, Ride, RideScope,
    RidesResponse, StatusResponse, StatusToken, TransitionRequest, TransitionResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error as StdError;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::api::RideApi;
use crate::rate_limit::RateLimiter;

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn format_reqwest_error(err: &reqwest::Error) -> String {
    // Keep chained causes so DNS/TLS/socket failures are visible.
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

fn transport_error(err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(format_reqwest_error(err))
    } else {
        Error::Http(format_reqwest_error(err))
    }
}

fn summarize_response_body(raw: &str) -> String {
    const MAX_CHARS: usize = 500;
    let compact = raw.replace(['\n', '\r'], " ");
    match compact.char_indices().nth(MAX_CHARS) {
        Some((cut, _)) => format!("{}…", &compact[..cut]),
        None => compact,
    }
}

/// Pull the backend's `{ "message": ... }` out of a failure body.
fn rejection_message(raw: &str) -> Option<String> {
    serde_json::from_str::<MessageResponse>(raw)
        .ok()
        .and_then(|m| m.message)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

#[derive(Debug, Clone, Copy)]
enum Bucket {
    Read,
    Write,
}

/// Async REST client for the SeniorGo backend.
#[derive(Debug, Clone)]
pub struct RideRestClient {
    client: reqwest::Client,
    base_url: String,
    endpoints: EndpointConfig,
    limiter: RateLimiter,
}

impl RideRestClient {
    pub fn new(config: &RideConfig) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url);
        let parsed = url::Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("invalid base_url {base_url:?}: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::Config(format!(
                "base_url must be http or https, got {}",
                parsed.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent("ride-tracker/0.1")
            .pool_max_idle_per_host(4)
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(config.timing.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        info!("SeniorGo backend: {}", base_url);

        Ok(Self {
            client,
            base_url,
            endpoints: config.endpoints.clone(),
            limiter: RateLimiter::with_limits(
                config.limits.reads_per_sec,
                config.limits.writes_per_sec,
            ),
        })
    }

    /// URL helper.
    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn list_path(&self, scope: RideScope) -> &str {
        match scope {
            RideScope::Requester => &self.endpoints.current_rides,
            RideScope::Volunteer => &self.endpoints.accepted_requests,
        }
    }

    async fn post_json<B, R>(&self, path: &str, body: &B, bucket: Bucket) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        match bucket {
            Bucket::Read => self.limiter.wait_read().await,
            Bucket::Write => self.limiter.wait_write().await,
        }

        let url = self.url(path);
        debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = resp.status();
        let raw_body = resp.text().await.map_err(|e| transport_error(&e))?;

        if !status.is_success() {
            warn!(
                "{} returned {}: {}",
                path,
                status.as_u16(),
                summarize_response_body(&raw_body)
            );
            return Err(Error::Api {
                status: status.as_u16(),
                message: rejection_message(&raw_body),
            });
        }

        // Some acknowledgement endpoints answer 200 with an empty body.
        let raw_body = if raw_body.trim().is_empty() {
            "{}"
        } else {
            raw_body.as_str()
        };

        serde_json::from_str(raw_body).map_err(|e| {
            warn!(
                "Error decoding {} response: {}; body={}",
                path,
                e,
                summarize_response_body(raw_body)
            );
            Error::Json(e)
        })
    }
}

#[async_trait]
impl RideApi for RideRestClient {
    #[instrument(skip(self, contact))]
    async fn list_rides(&self, scope: RideScope, contact: &str) -> Result<Vec<Ride>> {
        let body = ListRidesRequest {
            filter_contact: contact,
        };
        let resp: RidesResponse = self
            .post_json(self.list_path(scope), &body, Bucket::Read)
            .await?;

        debug!("Fetched {} rides", resp.rides.len());
        Ok(resp.rides)
    }

    async fn fetch_status(&self, ride_id: &str) -> Result<Option<StatusToken>> {
        let body = RefreshStatusRequest { ride_id };
        let resp: StatusResponse = self
            .post_json(&self.endpoints.status_refresh, &body, Bucket::Read)
            .await?;

        debug!("Status for ride {}: {:?}", ride_id, resp.status);
        Ok(resp.status)
    }

    #[instrument(skip(self))]
    async fn update_status(&self, ride_id: &str, current_status: &str) -> Result<StatusToken> {
        let body = TransitionRequest {
            ride_id,
            current_status,
        };
        let resp: TransitionResponse = self
            .post_json(&self.endpoints.update_status, &body, Bucket::Write)
            .await?;

        resp.new_status.ok_or_else(|| Error::Api {
            status: 200,
            message: Some("Server did not return a new status.".into()),
        })
    }

    async fn cancel_ride(&self, ride_id: &str, contact: &str) -> Result<Option<String>> {
        let body = CancelRideRequest {
            ride_id,
            emailaddress: contact,
        };
        let resp: MessageResponse = self
            .post_json(&self.endpoints.cancel_ride, &body, Bucket::Write)
            .await?;
        Ok(resp.message)
    }

    async fn open_requests(&self, contact: &str) -> Result<Vec<Ride>> {
        let body = OpenRequestsRequest {
            emailaddress: contact,
        };
        let resp: OpenRequestsResponse = self
            .post_json(&self.endpoints.active_requests, &body, Bucket::Read)
            .await?;

        debug!("Fetched {} open requests", resp.active_requests.len());
        Ok(resp.active_requests)
    }

    async fn accept_request(&self, ride_id: &str, contact: &str) -> Result<Option<String>> {
        let body = AcceptRequest {
            emailaddress: contact,
            id: ride_id,
        };
        let resp: MessageResponse = self
            .post_json(&self.endpoints.accept_requests, &body, Bucket::Write)
            .await?;
        Ok(resp.message)
    }
}
