use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::RoomError;

/// Result of checking an address against the ban table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Reject { remaining_ms: u64 },
}

impl Admission {
    pub fn into_result(self) -> Result<(), RoomError> {
        match self {
            Admission::Allow => Ok(()),
            Admission::Reject { remaining_ms } => Err(RoomError::Rejected { remaining_ms }),
        }
    }
}

/// Temporary bans keyed by network address.
///
/// Entries expire lazily: an expired entry simply stops rejecting and is
/// dropped the next time the table is written.
#[derive(Debug, Default)]
pub struct BanTable {
    entries: HashMap<String, DateTime<Utc>>,
}

impl BanTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&self, address: &str, now: DateTime<Utc>) -> Admission {
        match self.entries.get(address) {
            Some(&until) if now < until => Admission::Reject {
                remaining_ms: (until - now).num_milliseconds().max(0) as u64,
            },
            _ => Admission::Allow,
        }
    }

    /// Ban `address` until `until`. An existing longer ban is kept.
    pub fn ban(&mut self, address: &str, until: DateTime<Utc>, now: DateTime<Utc>) {
        self.entries.retain(|_, expiry| *expiry > now);
        let entry = self.entries.entry(address.to_string()).or_insert(until);
        if *entry < until {
            *entry = until;
        }
    }

    /// Returns whether a ban entry was present. Unbanning twice is fine.
    pub fn unban(&mut self, address: &str) -> bool {
        self.entries.remove(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
