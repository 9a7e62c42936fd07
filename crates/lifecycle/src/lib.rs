//! Ride lifecycle crate.
//!
//! Projects backend ride data into display state and drives status
//! transitions.

pub mod cache;
pub mod display;
pub mod notice;
pub mod projector;
pub mod stage;

pub use cache::{CacheEntry, StatusCache, WriteOutcome};
pub use display::{derive_display_state, effective_status, is_current, DisplayState};
pub use notice::{Notice, NoticeContext, NoticeKind};
pub use projector::{ActionOutcome, RefreshSummary, RideListing, RideProjector};
pub use stage::{stage_index, Stage};
