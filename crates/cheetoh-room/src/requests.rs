use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use cheetoh_types::models::AdminRequestView;

pub const MAX_REASON_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRequest {
    pub username: String,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
}

/// Pending admin requests, at most one per participant.
#[derive(Debug, Default)]
pub struct AdminRequests {
    pending: HashMap<Uuid, AdminRequest>,
}

impl AdminRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a request, replacing any earlier one from the same participant.
    pub fn submit(&mut self, participant_id: Uuid, request: AdminRequest) -> AdminRequestView {
        let view = view(participant_id, &request);
        self.pending.insert(participant_id, request);
        view
    }

    pub fn remove(&mut self, participant_id: Uuid) -> Option<AdminRequest> {
        self.pending.remove(&participant_id)
    }

    pub fn contains(&self, participant_id: Uuid) -> bool {
        self.pending.contains_key(&participant_id)
    }

    /// Oldest first.
    pub fn list(&self) -> Vec<AdminRequestView> {
        let mut list: Vec<AdminRequestView> =
            self.pending.iter().map(|(id, req)| view(*id, req)).collect();
        list.sort_by_key(|r| (r.requested_at, r.participant_id));
        list
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn view(participant_id: Uuid, request: &AdminRequest) -> AdminRequestView {
    AdminRequestView {
        participant_id,
        username: request.username.clone(),
        reason: request.reason.clone(),
        requested_at: request.requested_at,
    }
}
