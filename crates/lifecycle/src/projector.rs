//! Ride lifecycle projector.
//!
//! Owns the session's status cache, fetches rides and per-ride statuses from
//! the backend, and issues transitions on user action. Transitions are only
//! reflected locally once the backend confirms them.

use common::{Error, Ride, RideScope, Session, StatusToken};
use dashmap::DashSet;
use futures_util::stream::{self, StreamExt};
use seniorgo_client::RideApi;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::StatusCache;
use crate::display::{derive_display_state, is_current, DisplayState};
use crate::notice::{Notice, NoticeContext};
use crate::stage::Stage;

pub const DEFAULT_REFRESH_CONCURRENCY: usize = 8;

/// Result of a list fetch. Failures yield an empty list plus a notice.
#[derive(Debug, Clone, Default)]
pub struct RideListing {
    pub rides: Vec<Ride>,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The backend confirmed the ride moved to `stage`.
    Advanced { stage: Stage, notice: Notice },
    /// The ride was dropped from the local display.
    Removed,
    Cancelled { notice: Notice },
    Accepted { notice: Notice },
    /// The control is disabled for this ride; nothing was sent.
    Unavailable,
    /// Nothing changed locally. `notice` is `None` for silent
    /// precondition failures.
    Failed { notice: Option<Notice> },
}

fn advanced_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Accepted => "Ride accepted.",
        Stage::VolunteerStarted => "Volunteer started status updated.",
        Stage::RideStarted => "Ride started status updated.",
        Stage::RideEnded => "Ride ended status updated.",
    }
}

pub struct RideProjector {
    api: Arc<dyn RideApi>,
    cache: StatusCache,
    dismissed: DashSet<String>,
    refresh_concurrency: usize,
}

impl RideProjector {
    pub fn new(api: Arc<dyn RideApi>) -> Self {
        Self::with_concurrency(api, DEFAULT_REFRESH_CONCURRENCY)
    }

    pub fn with_concurrency(api: Arc<dyn RideApi>, refresh_concurrency: usize) -> Self {
        Self {
            api,
            cache: StatusCache::new(),
            dismissed: DashSet::new(),
            refresh_concurrency: refresh_concurrency.max(1),
        }
    }

    pub fn cache(&self) -> &StatusCache {
        &self.cache
    }

    // ── Fetching ──────────────────────────────────────────────────────

    /// Fetch the rides visible to the session's actor.
    ///
    /// Without an actor contact no request is made. Each ride's embedded
    /// status seeds the cache.
    pub async fn fetch_ride_list(&self, session: &Session, scope: RideScope) -> RideListing {
        let Some(contact) = session.contact() else {
            debug!("No actor contact; skipping {} ride fetch", scope.label());
            return RideListing::default();
        };

        let ticket = self.cache.issue_ticket();
        match self.api.list_rides(scope, contact).await {
            Ok(rides) => {
                for ride in &rides {
                    if let Some(status) = &ride.status {
                        self.cache.record(&ride.id, status.clone(), ticket);
                    }
                }
                info!("Loaded {} {} rides", rides.len(), scope.label());
                RideListing {
                    rides,
                    notice: None,
                }
            }
            Err(e) => {
                warn!("Failed to load {} rides: {}", scope.label(), e);
                RideListing {
                    rides: Vec::new(),
                    notice: Notice::for_error(&e, NoticeContext::LoadRides),
                }
            }
        }
    }

    /// Ask the backend for one ride's current status and record it.
    pub async fn refresh_status(&self, ride_id: &str) -> Result<Option<StatusToken>, Error> {
        let ticket = self.cache.issue_ticket();
        let status = self.api.fetch_status(ride_id).await?;

        if let Some(token) = &status {
            let outcome = self.cache.record(ride_id, token.clone(), ticket);
            if outcome.applied() {
                debug!("Refreshed ride {} -> {}", ride_id, token);
            } else {
                debug!("Refresh of ride {} not applied ({:?})", ride_id, outcome);
            }
        }
        Ok(status)
    }

    /// Refresh every ride concurrently, bounded by the configured limit.
    ///
    /// Waits for all refreshes to settle. A failed refresh leaves that ride's
    /// previous status in place.
    pub async fn refresh_all(&self, rides: &[Ride]) -> RefreshSummary {
        let results: Vec<(&str, Result<Option<StatusToken>, Error>)> = stream::iter(rides)
            .map(|ride| async move { (ride.id.as_str(), self.refresh_status(&ride.id).await) })
            .buffer_unordered(self.refresh_concurrency)
            .collect()
            .await;

        let mut summary = RefreshSummary::default();
        for (ride_id, result) in results {
            match result {
                Ok(_) => summary.refreshed += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!("Status refresh failed for ride {}: {}", ride_id, e);
                }
            }
        }

        debug!(
            "Status refresh settled: {} ok, {} failed",
            summary.refreshed, summary.failed
        );
        summary
    }

    /// List fetch followed by a per-ride status refresh.
    pub async fn load(&self, session: &Session, scope: RideScope) -> RideListing {
        let listing = self.fetch_ride_list(session, scope).await;
        if !listing.rides.is_empty() {
            self.refresh_all(&listing.rides).await;
        }
        listing
    }

    // ── Projection ────────────────────────────────────────────────────

    pub fn display_state(&self, ride: &Ride, scope: RideScope) -> DisplayState {
        let cached = self.cache.get(&ride.id);
        let state = derive_display_state(ride, cached.as_ref(), scope);
        if !state.recognized {
            warn!(
                "Unrecognised status {:?} for ride {}; treating as {}",
                state.status.as_str(),
                ride.id,
                Stage::Accepted.wire_name()
            );
        }
        state
    }

    /// Rides to render, in server order.
    ///
    /// The requester view hides ended rides. Dismissed rides are hidden in
    /// every view.
    pub fn visible_rides<'a>(&self, rides: &'a [Ride], scope: RideScope) -> Vec<&'a Ride> {
        rides
            .iter()
            .filter(|ride| !self.dismissed.contains(&ride.id))
            .filter(|ride| match scope {
                RideScope::Requester => is_current(ride, self.cache.get(&ride.id).as_ref()),
                RideScope::Volunteer => true,
            })
            .collect()
    }

    pub fn dismiss(&self, ride_id: &str) {
        if self.dismissed.insert(ride_id.to_string()) {
            info!("Dismissed ride {}", ride_id);
        }
    }

    pub fn is_dismissed(&self, ride_id: &str) -> bool {
        self.dismissed.contains(ride_id)
    }

    // ── Actions ───────────────────────────────────────────────────────

    /// Send the cached status (default `accepted`) to the backend and record
    /// the status it answers with.
    ///
    /// The answer must be exactly the next stage after the one sent (unknown
    /// tokens count as `accepted`); anything else leaves the cache as is.
    pub async fn apply_transition(&self, ride_id: &str) -> Result<StatusToken, Error> {
        let current = self
            .cache
            .get(ride_id)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| Stage::Accepted.token());
        self.transition_from(ride_id, &current).await
    }

    async fn transition_from(
        &self,
        ride_id: &str,
        current: &StatusToken,
    ) -> Result<StatusToken, Error> {
        let known = Stage::from_token(current);
        let from = known.unwrap_or(Stage::Accepted);
        let Some(expected) = from.next() else {
            return Err(Error::InvalidTransition {
                ride_id: ride_id.to_string(),
                from: current.to_string(),
                to: "none".into(),
            });
        };

        // Recognised stages go out in the backend's own spelling.
        let sent = known.map_or(current.as_str(), |stage| stage.wire_name());
        debug!("Requesting transition for ride {} from {}", ride_id, sent);

        let ticket = self.cache.issue_ticket();
        let answered = self.api.update_status(ride_id, sent).await?;

        if Stage::from_token(&answered) != Some(expected) {
            warn!(
                "Backend answered {} for ride {} at {}; expected {}",
                answered,
                ride_id,
                from.wire_name(),
                expected.wire_name()
            );
            return Err(Error::InvalidTransition {
                ride_id: ride_id.to_string(),
                from: from.wire_name().into(),
                to: answered.to_string(),
            });
        }

        let outcome = self.cache.record(ride_id, answered.clone(), ticket);
        info!(
            "Ride {} advanced to {} ({:?})",
            ride_id,
            expected.wire_name(),
            outcome
        );
        Ok(answered)
    }

    /// Run whatever the ride's action control currently offers.
    pub async fn perform_action(&self, ride: &Ride, scope: RideScope) -> ActionOutcome {
        let state = self.display_state(ride, scope);
        if !state.enabled {
            return ActionOutcome::Unavailable;
        }

        if state.stage.is_terminal() {
            self.dismiss(&ride.id);
            return ActionOutcome::Removed;
        }

        // Same status the control was rendered from.
        match self.transition_from(&ride.id, &state.status).await {
            Ok(status) => {
                let stage = Stage::from_token(&status).unwrap_or(state.stage);
                ActionOutcome::Advanced {
                    stage,
                    notice: Notice::success(advanced_message(stage)),
                }
            }
            Err(e) => {
                warn!("Action on ride {} did not take effect: {}", ride.id, e);
                ActionOutcome::Failed {
                    notice: Notice::for_error(&e, NoticeContext::UpdateStatus),
                }
            }
        }
    }

    /// Cancel a ride. Independent of the stage chain; allowed from any
    /// stage before the ride has ended.
    pub async fn cancel_ride(&self, session: &Session, ride: &Ride) -> ActionOutcome {
        let Some(contact) = session.contact() else {
            return ActionOutcome::Failed { notice: None };
        };
        let state = self.display_state(ride, RideScope::Requester);
        if state.recognized && state.stage.is_terminal() {
            return ActionOutcome::Unavailable;
        }

        match self.api.cancel_ride(&ride.id, contact).await {
            Ok(message) => {
                self.dismiss(&ride.id);
                ActionOutcome::Cancelled {
                    notice: Notice::success(
                        message.unwrap_or_else(|| "Ride cancelled successfully.".into()),
                    ),
                }
            }
            Err(e) => {
                warn!("Cancel failed for ride {}: {}", ride.id, e);
                ActionOutcome::Failed {
                    notice: Notice::for_error(&e, NoticeContext::CancelRide),
                }
            }
        }
    }

    /// Unaccepted ride requests a volunteer can pick up.
    pub async fn open_requests(&self, session: &Session) -> RideListing {
        let Some(contact) = session.contact() else {
            return RideListing::default();
        };

        match self.api.open_requests(contact).await {
            Ok(rides) => RideListing {
                rides,
                notice: None,
            },
            Err(e) => {
                warn!("Failed to load open requests: {}", e);
                RideListing {
                    rides: Vec::new(),
                    notice: Notice::for_error(&e, NoticeContext::LoadRequests),
                }
            }
        }
    }

    pub async fn accept_request(&self, session: &Session, ride_id: &str) -> ActionOutcome {
        let Some(contact) = session.contact() else {
            return ActionOutcome::Failed { notice: None };
        };

        let ticket = self.cache.issue_ticket();
        match self.api.accept_request(ride_id, contact).await {
            Ok(message) => {
                self.cache.record(ride_id, Stage::Accepted.token(), ticket);
                info!("Accepted ride {} as {}", ride_id, contact);
                ActionOutcome::Accepted {
                    notice: Notice::success(message.unwrap_or_else(|| "Ride Accepted".into())),
                }
            }
            Err(e) => {
                warn!("Accept failed for ride {}: {}", ride_id, e);
                ActionOutcome::Failed {
                    notice: Notice::for_error(&e, NoticeContext::AcceptRide),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::ActorRole;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    enum Reply {
        Status(&'static str),
        Reject(Option<&'static str>),
        Offline,
    }

    fn reply_err(reply: &Reply) -> Error {
        match reply {
            Reply::Offline => Error::Http("connection refused".into()),
            Reply::Reject(message) => Error::Api {
                status: 400,
                message: message.map(String::from),
            },
            Reply::Status(_) => unreachable!("status replies are not errors"),
        }
    }

    #[derive(Default)]
    struct FakeApi {
        rides: Vec<Ride>,
        list_offline: bool,
        /// Missing ride ids fail their refresh.
        statuses: Mutex<HashMap<String, &'static str>>,
        delays_ms: HashMap<String, u64>,
        transition: Mutex<Option<Reply>>,
        cancel: Option<Reply>,
        sent: Mutex<Vec<(String, String)>>,
        list_calls: AtomicUsize,
        write_calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeApi {
        fn with_rides(rides: Vec<Ride>) -> Self {
            Self {
                rides,
                ..Self::default()
            }
        }

        fn status(mut self, ride_id: &str, status: &'static str) -> Self {
            self.statuses
                .get_mut()
                .unwrap()
                .insert(ride_id.into(), status);
            self
        }

        fn set_status(&self, ride_id: &str, status: &'static str) {
            self.statuses
                .lock()
                .unwrap()
                .insert(ride_id.into(), status);
        }

        fn delay(mut self, ride_id: &str, ms: u64) -> Self {
            self.delays_ms.insert(ride_id.into(), ms);
            self
        }

        fn transition(self, reply: Reply) -> Self {
            *self.transition.lock().unwrap() = Some(reply);
            self
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RideApi for FakeApi {
        async fn list_rides(&self, _scope: RideScope, _contact: &str) -> common::Result<Vec<Ride>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.list_offline {
                return Err(Error::Http("connection refused".into()));
            }
            Ok(self.rides.clone())
        }

        async fn fetch_status(&self, ride_id: &str) -> common::Result<Option<StatusToken>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays_ms.get(ride_id).copied().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let status = self.statuses.lock().unwrap().get(ride_id).copied();
            match status {
                Some(s) => Ok(Some(StatusToken::new(s))),
                None => Err(Error::Timeout(format!("no answer for {ride_id}"))),
            }
        }

        async fn update_status(
            &self,
            ride_id: &str,
            current_status: &str,
        ) -> common::Result<StatusToken> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            self.sent
                .lock()
                .unwrap()
                .push((ride_id.to_string(), current_status.to_string()));
            match self.transition.lock().unwrap().clone() {
                Some(Reply::Status(s)) => Ok(StatusToken::new(s)),
                Some(other) => Err(reply_err(&other)),
                None => Err(Error::Http("no transition configured".into())),
            }
        }

        async fn cancel_ride(&self, _ride_id: &str, _contact: &str) -> common::Result<Option<String>> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            match &self.cancel {
                Some(Reply::Status(msg)) => Ok(Some(msg.to_string())),
                Some(other) => Err(reply_err(other)),
                None => Ok(None),
            }
        }

        async fn open_requests(&self, _contact: &str) -> common::Result<Vec<Ride>> {
            Ok(self.rides.clone())
        }

        async fn accept_request(&self, _ride_id: &str, _contact: &str) -> common::Result<Option<String>> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn ride(id: &str, status: Option<&str>) -> Ride {
        Ride {
            id: id.into(),
            requester_contact: "rose@example.com".into(),
            pickup_location: "12 Elm St".into(),
            dropoff_location: "Riverside Clinic".into(),
            pickup_date_time: Some("2026-03-01T15:30:00Z".into()),
            accepted_by: Some("val@example.com".into()),
            status: status.map(StatusToken::new),
        }
    }

    fn volunteer() -> Session {
        Session::new("val@example.com", ActorRole::Volunteer)
    }

    fn requester() -> Session {
        Session::new("rose@example.com", ActorRole::Senior)
    }

    fn projector(api: FakeApi) -> (Arc<FakeApi>, RideProjector) {
        let api = Arc::new(api);
        let projector = RideProjector::new(api.clone());
        (api, projector)
    }

    #[tokio::test]
    async fn test_missing_contact_skips_network() {
        let (api, projector) = projector(FakeApi::with_rides(vec![ride("r1", None)]));

        let listing = projector
            .fetch_ride_list(&Session::new("", ActorRole::Volunteer), RideScope::Volunteer)
            .await;

        assert!(listing.rides.is_empty());
        assert!(listing.notice.is_none());
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_list_failure_yields_empty_list_and_notice() {
        let api = FakeApi {
            list_offline: true,
            ..FakeApi::default()
        };
        let (_, projector) = projector(api);

        let listing = projector.load(&requester(), RideScope::Requester).await;

        assert!(listing.rides.is_empty());
        let notice = listing.notice.expect("connectivity failure should surface");
        assert_eq!(notice.message, "Could not connect to server.");
    }

    #[tokio::test]
    async fn test_accepted_ride_shows_volunteer_started() {
        let api = FakeApi::with_rides(vec![ride("r1", Some("accepted"))]).status("r1", "accepted");
        let (_, projector) = projector(api);

        let listing = projector.load(&volunteer(), RideScope::Volunteer).await;
        let state = projector.display_state(&listing.rides[0], RideScope::Volunteer);

        assert_eq!(state.stage_index, 0);
        assert_eq!(state.label, "Volunteer Started");
        assert!(state.enabled);
    }

    #[tokio::test]
    async fn test_confirmed_transition_advances_one_stage() {
        let api = FakeApi::with_rides(vec![ride("r1", Some("accepted"))])
            .status("r1", "accepted")
            .transition(Reply::Status("volunteerStarted"));
        let (api, projector) = projector(api);

        let listing = projector.load(&volunteer(), RideScope::Volunteer).await;
        let outcome = projector
            .perform_action(&listing.rides[0], RideScope::Volunteer)
            .await;

        assert!(matches!(
            outcome,
            ActionOutcome::Advanced {
                stage: Stage::VolunteerStarted,
                ..
            }
        ));
        assert_eq!(api.sent(), vec![("r1".to_string(), "accepted".to_string())]);

        let state = projector.display_state(&listing.rides[0], RideScope::Volunteer);
        assert_eq!(state.stage_index, 1);
        assert_eq!(state.label, "Ride Started");
    }

    #[tokio::test]
    async fn test_offline_transition_leaves_cache_untouched() {
        let api = FakeApi::with_rides(vec![ride("r1", Some("accepted"))])
            .status("r1", "accepted")
            .transition(Reply::Offline);
        let (_, projector) = projector(api);

        let listing = projector.load(&volunteer(), RideScope::Volunteer).await;
        let before = projector.display_state(&listing.rides[0], RideScope::Volunteer);

        let outcome = projector
            .perform_action(&listing.rides[0], RideScope::Volunteer)
            .await;

        let ActionOutcome::Failed { notice: Some(notice) } = outcome else {
            panic!("expected a failed outcome with a notice, got {outcome:?}");
        };
        assert_eq!(notice.message, "Could not connect to server.");
        assert_eq!(
            projector.display_state(&listing.rides[0], RideScope::Volunteer),
            before
        );
        assert_eq!(projector.cache().get("r1"), Some(StatusToken::new("accepted")));
    }

    #[tokio::test]
    async fn test_current_view_hides_ended_rides() {
        let rides = vec![
            ride("a", Some("accepted")),
            ride("b", Some("rideStarted")),
            ride("c", Some("rideEnded")),
        ];
        let api = FakeApi::with_rides(rides)
            .status("a", "accepted")
            .status("b", "rideStarted")
            .status("c", "rideEnded");
        let (_, projector) = projector(api);

        let listing = projector.load(&requester(), RideScope::Requester).await;
        let visible: Vec<&str> = projector
            .visible_rides(&listing.rides, RideScope::Requester)
            .iter()
            .map(|r| r.id.as_str())
            .collect();

        assert_eq!(visible, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_filter_ignores_list_order() {
        let stages = ["rideEnded", "accepted", "ended", "volunteerStarted", "rideStarted"];
        let rides: Vec<Ride> = stages
            .iter()
            .enumerate()
            .map(|(i, s)| ride(&format!("r{i}"), Some(s)))
            .collect();

        let (_, forward) = projector(FakeApi::with_rides(rides.clone()));
        let listing = forward.fetch_ride_list(&requester(), RideScope::Requester).await;
        let ids: Vec<&str> = forward
            .visible_rides(&listing.rides, RideScope::Requester)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["r1", "r3", "r4"]);

        let mut reversed = rides;
        reversed.reverse();
        let (_, backward) = projector(FakeApi::with_rides(reversed));
        let listing = backward.fetch_ride_list(&requester(), RideScope::Requester).await;
        let ids: Vec<&str> = backward
            .visible_rides(&listing.rides, RideScope::Requester)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["r4", "r3", "r1"]);
    }

    #[tokio::test]
    async fn test_reverse_completion_keeps_each_ride_slot() {
        let statuses = ["accepted", "volunteerStarted", "rideStarted", "rideEnded"];
        let mut api = FakeApi::with_rides(
            (0..4).map(|i| ride(&format!("r{i}"), None)).collect(),
        );
        for (i, status) in statuses.iter().enumerate() {
            // First issued finishes last.
            api = api
                .status(&format!("r{i}"), status)
                .delay(&format!("r{i}"), 40 - 10 * i as u64);
        }
        let (_, projector) = projector(api);

        let listing = projector.load(&volunteer(), RideScope::Volunteer).await;
        assert_eq!(listing.rides.len(), 4);

        let snapshot = projector.cache().snapshot();
        for (i, status) in statuses.iter().enumerate() {
            assert_eq!(
                snapshot.get(&format!("r{i}")),
                Some(&StatusToken::new(status)),
                "ride r{i}"
            );
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_list_status() {
        let api = FakeApi::with_rides(vec![
            ride("ok", Some("accepted")),
            ride("lost", Some("volunteerStarted")),
        ])
        .status("ok", "rideStarted");
        let (_, projector) = projector(api);

        let listing = projector
            .fetch_ride_list(&volunteer(), RideScope::Volunteer)
            .await;
        let summary = projector.refresh_all(&listing.rides).await;

        assert_eq!(summary, RefreshSummary { refreshed: 1, failed: 1 });
        assert_eq!(projector.cache().get("ok"), Some(StatusToken::new("ridestarted")));
        assert_eq!(
            projector.cache().get("lost"),
            Some(StatusToken::new("volunteerstarted"))
        );
    }

    #[tokio::test]
    async fn test_fan_out_respects_concurrency_limit() {
        let mut api = FakeApi::with_rides((0..6).map(|i| ride(&format!("r{i}"), None)).collect());
        for i in 0..6 {
            api = api.status(&format!("r{i}"), "accepted").delay(&format!("r{i}"), 10);
        }
        let api = Arc::new(api);
        let projector = RideProjector::with_concurrency(api.clone(), 2);

        let summary = projector.refresh_all(&api.rides).await;

        assert_eq!(summary.refreshed, 6);
        assert!(api.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_server_rejection_echoes_message() {
        let api = FakeApi::with_rides(vec![ride("r1", Some("volunteerStarted"))])
            .transition(Reply::Reject(Some("Ride was cancelled")));
        let (_, projector) = projector(api);

        let listing = projector.load(&volunteer(), RideScope::Volunteer).await;
        let outcome = projector
            .perform_action(&listing.rides[0], RideScope::Volunteer)
            .await;

        let ActionOutcome::Failed { notice: Some(notice) } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(notice.message, "Ride was cancelled");
        assert_eq!(
            projector.cache().get("r1"),
            Some(StatusToken::new("volunteerstarted"))
        );
    }

    #[tokio::test]
    async fn test_rejection_without_message_uses_fallback() {
        let api = FakeApi::with_rides(vec![ride("r1", Some("accepted"))])
            .transition(Reply::Reject(None));
        let (_, projector) = projector(api);

        let listing = projector.load(&volunteer(), RideScope::Volunteer).await;
        let outcome = projector
            .perform_action(&listing.rides[0], RideScope::Volunteer)
            .await;

        let ActionOutcome::Failed { notice: Some(notice) } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(notice.message, "Failed to update status.");
    }

    #[tokio::test]
    async fn test_non_adjacent_answer_is_not_applied() {
        let api = FakeApi::with_rides(vec![ride("r1", Some("accepted"))])
            .transition(Reply::Status("rideEnded"));
        let (_, projector) = projector(api);

        projector.load(&volunteer(), RideScope::Volunteer).await;
        let err = projector
            .apply_transition("r1")
            .await
            .expect_err("skipping a stage must be refused");

        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(projector.cache().get("r1"), Some(StatusToken::new("accepted")));
    }

    #[tokio::test]
    async fn test_transitions_never_regress_cached_stage() {
        for from in Stage::ALL {
            let Some(next) = from.next() else { continue };
            let api = FakeApi::with_rides(vec![ride("r1", Some(from.wire_name()))])
                .transition(Reply::Status(next.wire_name()));
            let (api, projector) = projector(api);
            projector.load(&volunteer(), RideScope::Volunteer).await;

            let answered = projector
                .apply_transition("r1")
                .await
                .expect("adjacent transition should apply");
            assert_eq!(Stage::from_token(&answered), Some(next));
            assert_eq!(api.sent()[0].1, from.wire_name());

            // An answer naming the previous stage must not pull the ride back.
            *api.transition.lock().unwrap() = Some(Reply::Status(from.wire_name()));
            let _ = projector.apply_transition("r1").await;

            let cached = projector.cache().get("r1").expect("ride is cached");
            assert_eq!(Stage::from_token(&cached), Some(next), "from {from:?}");
        }
    }

    #[tokio::test]
    async fn test_unknown_status_sends_raw_token_and_advances() {
        let api = FakeApi::with_rides(vec![ride("r1", Some("pending"))])
            .transition(Reply::Status("volunteerStarted"));
        let (api, projector) = projector(api);

        let listing = projector.load(&volunteer(), RideScope::Volunteer).await;
        let state = projector.display_state(&listing.rides[0], RideScope::Volunteer);
        assert!(!state.recognized);
        assert_eq!(state.label, "Volunteer Started");

        let outcome = projector
            .perform_action(&listing.rides[0], RideScope::Volunteer)
            .await;
        assert!(matches!(outcome, ActionOutcome::Advanced { .. }));
        assert_eq!(api.sent()[0].1, "pending");
    }

    #[tokio::test]
    async fn test_terminal_action_depends_on_scope() {
        let api = FakeApi::with_rides(vec![ride("r1", Some("rideEnded"))]);
        let (api, projector) = projector(api);
        let listing = projector
            .fetch_ride_list(&volunteer(), RideScope::Volunteer)
            .await;

        let outcome = projector
            .perform_action(&listing.rides[0], RideScope::Volunteer)
            .await;
        assert_eq!(outcome, ActionOutcome::Unavailable);
        assert!(!projector.is_dismissed("r1"));

        let outcome = projector
            .perform_action(&listing.rides[0], RideScope::Requester)
            .await;
        assert_eq!(outcome, ActionOutcome::Removed);
        assert!(projector.is_dismissed("r1"));
        assert!(projector
            .visible_rides(&listing.rides, RideScope::Volunteer)
            .is_empty());
        assert_eq!(api.write_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_hides_ride() {
        let api = FakeApi {
            cancel: Some(Reply::Status("Ride cancelled successfully.")),
            ..FakeApi::with_rides(vec![ride("r1", Some("volunteerStarted")), ride("r2", None)])
        };
        let (_, projector) = projector(api);

        let listing = projector.load(&requester(), RideScope::Requester).await;
        let outcome = projector.cancel_ride(&requester(), &listing.rides[0]).await;

        assert!(matches!(outcome, ActionOutcome::Cancelled { .. }));
        let visible: Vec<&str> = projector
            .visible_rides(&listing.rides, RideScope::Requester)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(visible, vec!["r2"]);
        assert_eq!(
            projector.cache().get("r1"),
            Some(StatusToken::new("volunteerstarted"))
        );
    }

    #[tokio::test]
    async fn test_cancel_failure_keeps_ride_visible() {
        let api = FakeApi {
            cancel: Some(Reply::Offline),
            ..FakeApi::with_rides(vec![ride("r1", Some("accepted"))])
        };
        let (_, projector) = projector(api);

        let listing = projector.load(&requester(), RideScope::Requester).await;
        let outcome = projector.cancel_ride(&requester(), &listing.rides[0]).await;

        assert!(matches!(outcome, ActionOutcome::Failed { notice: Some(_) }));
        assert!(!projector.is_dismissed("r1"));
    }

    #[tokio::test]
    async fn test_cancel_requires_identity() {
        let (api, projector) = projector(FakeApi::default());
        let outcome = projector
            .cancel_ride(&Session::default(), &ride("r1", None))
            .await;

        assert_eq!(outcome, ActionOutcome::Failed { notice: None });
        assert_eq!(api.write_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_accept_records_accepted() {
        let (_, projector) = projector(FakeApi::with_rides(vec![ride("open-1", None)]));

        let open = projector.open_requests(&volunteer()).await;
        assert_eq!(open.rides.len(), 1);

        let outcome = projector.accept_request(&volunteer(), "open-1").await;
        assert!(matches!(outcome, ActionOutcome::Accepted { .. }));
        assert_eq!(
            projector.cache().get("open-1"),
            Some(StatusToken::new("accepted"))
        );
    }

    #[tokio::test]
    async fn test_transition_sends_cached_status() {
        let api = FakeApi::with_rides(vec![ride("r1", Some("accepted"))])
            .status("r1", "volunteerStarted")
            .transition(Reply::Status("rideStarted"));
        let (api, projector) = projector(api);

        projector.load(&volunteer(), RideScope::Volunteer).await;
        let answered = projector
            .apply_transition("r1")
            .await
            .expect("refreshed stage should advance");

        assert_eq!(api.sent(), vec![("r1".to_string(), "volunteerStarted".to_string())]);
        assert_eq!(Stage::from_token(&answered), Some(Stage::RideStarted));
    }

    #[tokio::test]
    async fn test_transition_without_cached_status_sends_accepted() {
        let api = FakeApi::default().transition(Reply::Status("volunteerStarted"));
        let (api, projector) = projector(api);

        projector
            .apply_transition("fresh")
            .await
            .expect("default stage should advance");
        assert_eq!(api.sent(), vec![("fresh".to_string(), "accepted".to_string())]);
    }

    #[tokio::test]
    async fn test_unrecognised_refresh_does_not_rewind_advanced_ride() {
        let api = FakeApi::with_rides(vec![ride("r1", Some("accepted"))])
            .status("r1", "rideStarted");
        let (api, projector) = projector(api);

        let listing = projector.load(&volunteer(), RideScope::Volunteer).await;
        assert_eq!(
            projector.display_state(&listing.rides[0], RideScope::Volunteer).stage_index,
            2
        );

        for drifted in ["pending", "accepted"] {
            api.set_status("r1", drifted);
            projector.refresh_all(&listing.rides).await;

            let state = projector.display_state(&listing.rides[0], RideScope::Volunteer);
            assert_eq!(state.stage_index, 2, "after {drifted}");
            assert_eq!(state.label, "Ride Ended");
            assert!(state.recognized);
            let cached = projector.cache().get("r1").expect("ride is cached");
            assert_eq!(Stage::from_token(&cached), Some(Stage::RideStarted));
        }
    }
}
