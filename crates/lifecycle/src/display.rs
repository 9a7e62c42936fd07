//! Pure projection from ride data to what a view renders.

use common::{Ride, RideScope, StatusToken};

use crate::stage::Stage;

/// What the rendering layer needs for one ride card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    /// Effective status the state was derived from.
    pub status: StatusToken,
    pub stage: Stage,
    pub stage_index: u8,
    pub label: &'static str,
    pub enabled: bool,
    /// False when `status` was not a known stage and `stage` is the
    /// stage-0 fallback.
    pub recognized: bool,
}

/// Cached status beats the one embedded in the list, which beats the
/// `accepted` default.
pub fn effective_status(ride: &Ride, cached: Option<&StatusToken>) -> StatusToken {
    cached
        .filter(|t| !t.is_empty())
        .or(ride.status.as_ref())
        .cloned()
        .unwrap_or_else(|| Stage::Accepted.token())
}

pub fn derive_display_state(
    ride: &Ride,
    cached: Option<&StatusToken>,
    scope: RideScope,
) -> DisplayState {
    let status = effective_status(ride, cached);
    let parsed = Stage::from_token(&status);
    let stage = parsed.unwrap_or(Stage::Accepted);

    DisplayState {
        status,
        stage,
        stage_index: stage.index(),
        label: stage.action_label(scope),
        enabled: stage.action_enabled(scope),
        recognized: parsed.is_some(),
    }
}

/// True while the ride still belongs in a "current rides" view.
pub fn is_current(ride: &Ride, cached: Option<&StatusToken>) -> bool {
    Stage::from_token(&effective_status(ride, cached)) != Some(Stage::RideEnded)
}
