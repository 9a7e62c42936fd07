//! One-shot user-visible notices.

use common::Error;

const CONNECT_FAILED: &str = "Could not connect to server.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// The operation a failure happened in; picks the generic fallback text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeContext {
    LoadRides,
    UpdateStatus,
    CancelRide,
    LoadRequests,
    AcceptRide,
}

impl NoticeContext {
    fn fallback(self) -> &'static str {
        match self {
            NoticeContext::LoadRides => "Failed to load rides.",
            NoticeContext::UpdateStatus => "Failed to update status.",
            NoticeContext::CancelRide => "Failed to cancel ride. Please try again.",
            NoticeContext::LoadRequests => "Failed to load ride requests.",
            NoticeContext::AcceptRide => "Failed to accept ride.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: &'static str,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            title: "Success",
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: "Error",
            message: message.into(),
        }
    }

    /// Notice for a failed operation. Precondition failures stay silent.
    pub fn for_error(err: &Error, context: NoticeContext) -> Option<Self> {
        match err {
            Error::MissingIdentity => None,
            e if e.is_connectivity() => Some(Self::error(CONNECT_FAILED)),
            e => Some(Self::error(
                e.server_message().unwrap_or(context.fallback()),
            )),
        }
    }
}
