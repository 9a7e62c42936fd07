//! SeniorGo backend client library.
//!
//! Provides the `RideApi` seam and its REST implementation.

pub mod api;
pub mod rate_limit;
pub mod rest;

pub use api::RideApi;
pub use rate_limit::RateLimiter;
pub use rest::RideRestClient;
