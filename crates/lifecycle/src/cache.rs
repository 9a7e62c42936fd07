//! Session-scoped status cache keyed by ride id.
//!
//! Each ride owns one slot. Writers draw a ticket when their request is
//! issued; a slot only accepts writes whose ticket is not older than the
//! one it holds. Once a slot holds a known stage it never moves to an
//! earlier stage or back to an unrecognised token.

use common::StatusToken;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::stage::Stage;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: StatusToken,
    pub ticket: u64,
}

impl CacheEntry {
    pub fn stage(&self) -> Option<Stage> {
        Stage::from_token(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Updated,
    Unchanged,
    /// A later-issued request already wrote this slot.
    StaleTicket,
    /// The write would move the ride to an earlier stage.
    Regression,
    /// The write would replace a known stage with an unrecognised token.
    Unrecognized,
}

impl WriteOutcome {
    pub fn applied(self) -> bool {
        matches!(
            self,
            WriteOutcome::Inserted | WriteOutcome::Updated | WriteOutcome::Unchanged
        )
    }
}

#[derive(Debug, Default)]
pub struct StatusCache {
    entries: DashMap<String, CacheEntry>,
    next_ticket: AtomicU64,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket for a request about to be issued. Strictly increasing.
    pub fn issue_ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record(&self, ride_id: &str, status: StatusToken, ticket: u64) -> WriteOutcome {
        match self.entries.entry(ride_id.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(CacheEntry { status, ticket });
                WriteOutcome::Inserted
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get();
                if ticket < current.ticket {
                    debug!(
                        "Dropping stale status {} for ride {} (ticket {} < {})",
                        status, ride_id, ticket, current.ticket
                    );
                    return WriteOutcome::StaleTicket;
                }

                match (current.stage(), Stage::from_token(&status)) {
                    (Some(old), Some(new)) if new < old => {
                        warn!(
                            "Ignoring regressive status for ride {}: {} -> {}",
                            ride_id, current.status, status
                        );
                        return WriteOutcome::Regression;
                    }
                    (Some(_), None) => {
                        warn!(
                            "Ignoring unrecognised status {:?} for ride {} at {}",
                            status.as_str(),
                            ride_id,
                            current.status
                        );
                        return WriteOutcome::Unrecognized;
                    }
                    _ => {}
                }

                let outcome = if current.status == status {
                    WriteOutcome::Unchanged
                } else {
                    WriteOutcome::Updated
                };

                let entry = slot.get_mut();
                entry.status = status;
                entry.ticket = ticket;
                outcome
            }
        }
    }

    pub fn get(&self, ride_id: &str) -> Option<StatusToken> {
        self.entries.get(ride_id).map(|e| e.status.clone())
    }

    pub fn entry(&self, ride_id: &str) -> Option<CacheEntry> {
        self.entries.get(ride_id).map(|e| e.value().clone())
    }

    pub fn snapshot(&self) -> HashMap<String, StatusToken> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().status.clone()))
            .collect()
    }
}
