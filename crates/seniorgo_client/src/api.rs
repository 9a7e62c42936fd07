//! The backend surface the lifecycle projector consumes.

use async_trait::async_trait;
use common::{Result, Ride, RideScope, StatusToken};

/// Request/response boundary to the SeniorGo backend.
///
/// `RideRestClient` is the production implementation; tests substitute an
/// in-memory fake.
#[async_trait]
pub trait RideApi: Send + Sync {
    /// Rides visible to `contact` in the given scope, in server order.
    async fn list_rides(&self, scope: RideScope, contact: &str) -> Result<Vec<Ride>>;

    /// Current authoritative status of one ride. `None` when the backend
    /// answered without a status.
    async fn fetch_status(&self, ride_id: &str) -> Result<Option<StatusToken>>;

    /// Ask the backend to advance a ride from `current_status` and return
    /// what it decided the new status is.
    async fn update_status(&self, ride_id: &str, current_status: &str) -> Result<StatusToken>;

    async fn cancel_ride(&self, ride_id: &str, contact: &str) -> Result<Option<String>>;

    async fn open_requests(&self, contact: &str) -> Result<Vec<Ride>>;

    async fn accept_request(&self, ride_id: &str, contact: &str) -> Result<Option<String>>;
}
