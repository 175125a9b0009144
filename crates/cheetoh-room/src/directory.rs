use uuid::Uuid;

use cheetoh_types::models::ParticipantView;

use crate::elevation::ElevationStep;
use crate::error::{Result, RoomError};
use crate::filter::ContentFilter;
use crate::identity;

pub const MAX_USERNAME_CHARS: usize = 24;

/// One live connection's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: Uuid,
    pub address: String,
    pub color: String,
    pub username: String,
    pub is_admin: bool,
    pub avatar_url: Option<String>,
    pub camera_on: bool,
    pub elevation: ElevationStep,
}

impl Participant {
    pub fn view(&self) -> ParticipantView {
        ParticipantView {
            id: self.id,
            username: self.username.clone(),
            color: self.color.clone(),
            is_admin: self.is_admin,
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// Connected participants in join order.
#[derive(Debug, Default)]
pub struct Directory {
    participants: Vec<Participant>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a participant for a freshly admitted connection.
    /// Registering an id twice returns the existing record.
    pub fn register(&mut self, id: Uuid, address: &str) -> &Participant {
        if let Some(pos) = self.position(id) {
            return &self.participants[pos];
        }
        self.participants.push(Participant {
            id,
            address: address.to_string(),
            color: identity::color_for_address(address),
            username: identity::guest_name(&id),
            is_admin: false,
            avatar_url: None,
            camera_on: false,
            elevation: ElevationStep::Idle,
        });
        &self.participants[self.participants.len() - 1]
    }

    /// Rename a participant. Returns the previous name.
    pub fn rename(&mut self, id: Uuid, raw: &str, filter: &ContentFilter) -> Result<String> {
        let trimmed: String = raw.trim().chars().take(MAX_USERNAME_CHARS).collect();
        let trimmed = trimmed.trim();
        if trimmed.is_empty() {
            return Err(RoomError::InvalidInput);
        }
        let name = filter.apply(trimmed).into_owned();

        let participant = self.get_mut(id).ok_or(RoomError::NotFound)?;
        Ok(std::mem::replace(&mut participant.username, name))
    }

    /// Remove a participant. A second call for the same id returns `None`.
    pub fn deregister(&mut self, id: Uuid) -> Option<Participant> {
        let pos = self.position(id)?;
        Some(self.participants.remove(pos))
    }

    pub fn get(&self, id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    /// First participant (in join order) whose name matches.
    pub fn find_by_username(&self, name: &str, case_insensitive: bool) -> Option<&Participant> {
        self.participants.iter().find(|p| {
            if case_insensitive {
                p.username.to_lowercase() == name.to_lowercase()
            } else {
                p.username == name
            }
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn admins(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.is_admin)
    }

    pub fn views(&self) -> Vec<ParticipantView> {
        self.participants.iter().map(Participant::view).collect()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.participants.iter().position(|p| p.id == id)
    }
}
