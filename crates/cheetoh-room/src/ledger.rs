use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use cheetoh_types::models::{Attachment, ChatMessage, MessageEdit, MessageKind};

use crate::error::{Result, RoomError};

pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const DEFAULT_SLICE: usize = 200;
pub const MAX_SLICE: usize = 1000;
pub const CENSORED_TEXT: &str = "[message removed by admin]";

/// Identity of whoever asks for an edit, delete, censor or clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub id: Uuid,
    pub is_admin: bool,
}

/// Everything about a message except the fields the ledger assigns.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub author_id: Option<Uuid>,
    pub author_username: String,
    pub author_color: String,
    pub author_is_admin: bool,
    pub text: String,
    pub kind: MessageKind,
    pub attachment: Option<Attachment>,
}

impl MessageDraft {
    /// Message authored by the room itself.
    pub fn system(text: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            author_id: None,
            author_username: "System".to_string(),
            author_color: "#333".to_string(),
            author_is_admin: false,
            text: text.into(),
            kind,
            attachment: None,
        }
    }
}

/// Cut `text` to at most `max` characters.
pub fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Ordered, mutable message history.
///
/// Ids come from a counter that only ever grows, so `BTreeMap` order is
/// creation order. Clearing the ledger keeps the counter.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: BTreeMap<u64, ChatMessage>,
    last_id: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, draft: MessageDraft, now: DateTime<Utc>) -> ChatMessage {
        self.last_id += 1;
        let message = ChatMessage {
            id: self.last_id,
            author_id: draft.author_id,
            author_username: draft.author_username,
            author_color: draft.author_color,
            author_is_admin: draft.author_is_admin,
            text: draft.text,
            kind: draft.kind,
            attachment: draft.attachment,
            created_at: now,
            edited_at: None,
            is_system: draft.author_id.is_none(),
        };
        self.entries.insert(message.id, message.clone());
        message
    }

    pub fn get(&self, id: u64) -> Option<&ChatMessage> {
        self.entries.get(&id)
    }

    /// Replace a message's text. `text` must already be clipped and filtered.
    pub fn edit(
        &mut self,
        id: u64,
        requester: Requester,
        text: String,
        now: DateTime<Utc>,
    ) -> Result<MessageEdit> {
        let message = self.entries.get_mut(&id).ok_or(RoomError::NotFound)?;
        if !may_modify(message, requester) {
            return Err(RoomError::Unauthorized);
        }
        if text.trim().is_empty() {
            return Err(RoomError::InvalidInput);
        }
        message.text = text;
        message.edited_at = Some(now);
        Ok(MessageEdit {
            id,
            text: message.text.clone(),
            edited_at: now,
        })
    }

    pub fn delete(&mut self, id: u64, requester: Requester) -> Result<ChatMessage> {
        let message = self.entries.get(&id).ok_or(RoomError::NotFound)?;
        if !may_modify(message, requester) {
            return Err(RoomError::Unauthorized);
        }
        self.entries.remove(&id).ok_or(RoomError::NotFound)
    }

    /// Admin-only. System messages cannot be censored.
    pub fn censor(&mut self, id: u64, requester: Requester, now: DateTime<Utc>) -> Result<MessageEdit> {
        if !requester.is_admin {
            return Err(RoomError::Unauthorized);
        }
        let message = self.entries.get_mut(&id).ok_or(RoomError::NotFound)?;
        if message.is_system {
            return Err(RoomError::InvalidInput);
        }
        message.text = CENSORED_TEXT.to_string();
        message.edited_at = Some(now);
        Ok(MessageEdit {
            id,
            text: message.text.clone(),
            edited_at: now,
        })
    }

    /// Admin-only. Empties the history without resetting the id counter.
    pub fn clear(&mut self, requester: Requester) -> Result<()> {
        if !requester.is_admin {
            return Err(RoomError::Unauthorized);
        }
        self.entries.clear();
        Ok(())
    }

    /// The most recent messages, oldest first. `None` means the default
    /// page size; anything else is clamped to `1..=MAX_SLICE`.
    pub fn slice(&self, limit: Option<i64>) -> Vec<ChatMessage> {
        let limit = match limit {
            Some(n) => n.clamp(1, MAX_SLICE as i64) as usize,
            None => DEFAULT_SLICE,
        };
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.values().skip(skip).cloned().collect()
    }

    /// Highest id ever issued, including ids of deleted or cleared messages.
    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn may_modify(message: &ChatMessage, requester: Requester) -> bool {
    requester.is_admin || message.author_id == Some(requester.id)
}
