use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use cheetoh_types::events::{ClientEvent, CommandReply, ServerEvent};
use cheetoh_types::models::{Attachment, CameraAction, MessageKind};

use crate::commands::{self, CommandContext, CommandResult, ParsedCommand};
use crate::directory::{Directory, Participant};
use crate::elevation::ElevationOutcome;
use crate::error::{Result, RoomError};
use crate::filter::ContentFilter;
use crate::gate::{Admission, BanTable};
use crate::ledger::{Ledger, MAX_MESSAGE_CHARS, MessageDraft, Requester, clip};
use crate::outbox::Outbox;
use crate::requests::{AdminRequest, AdminRequests};

pub const MAX_URL_CHARS: usize = 2048;

/// The room aggregate: identities, history, bans, admin requests and flags.
///
/// Every mutating method returns the [`Outbox`] describing who must be told
/// about the change. Callers deliver it before the next operation runs.
#[derive(Debug, Default)]
pub struct Room {
    pub(crate) directory: Directory,
    pub(crate) ledger: Ledger,
    pub(crate) bans: BanTable,
    pub(crate) requests: AdminRequests,
    pub(crate) filter: ContentFilter,
    party_until: Option<DateTime<Utc>>,
}

impl Room {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Read access --

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn requests(&self) -> &AdminRequests {
        &self.requests
    }

    pub fn family_friendly(&self) -> bool {
        self.filter.enabled()
    }

    pub fn party_active(&self, now: DateTime<Utc>) -> bool {
        self.party_until.is_some_and(|until| now < until)
    }

    pub fn admit(&self, address: &str, now: DateTime<Utc>) -> Admission {
        self.bans.admit(address, now)
    }

    // -- Connection lifecycle --

    /// Admit and register a new connection. The new participant gets
    /// `init`; everyone gets `presence:join`.
    pub fn connect(&mut self, id: Uuid, address: &str, now: DateTime<Utc>) -> Result<Outbox> {
        self.bans.admit(address, now).into_result()?;

        let me = self.directory.register(id, address).view();
        info!("{} ({}) joined from {}", me.username, id, address);

        let mut outbox = Outbox::new();
        outbox.send_to(
            id,
            ServerEvent::Init {
                me: me.clone(),
                history: self.ledger.slice(None),
                participants: self.directory.views(),
                family_friendly: self.filter.enabled(),
            },
        );
        outbox.broadcast(ServerEvent::PresenceJoin(me));
        Ok(outbox)
    }

    /// Remove a connection's participant. Safe to call more than once.
    pub fn disconnect(&mut self, id: Uuid, now: DateTime<Utc>) -> Outbox {
        let mut outbox = Outbox::new();
        let Some(gone) = self.directory.deregister(id) else {
            return outbox;
        };
        self.requests.remove(id);
        info!("{} ({}) left", gone.username, id);

        self.append_system(format!("{} left the chat", gone.username), now, &mut outbox);
        outbox.broadcast(ServerEvent::PresenceLeave(gone.view()));
        outbox
    }

    // -- Inbound events --

    /// Apply one client event. Rejected operations produce an empty outbox.
    pub fn apply(&mut self, id: Uuid, event: ClientEvent, now: DateTime<Utc>) -> Outbox {
        let result = match event {
            ClientEvent::SetUsername { username } => self.rename(id, &username, now),
            ClientEvent::SetAvatar { url } => self.set_avatar(id, &url),
            ClientEvent::SendMessage { text } => self.send_message(id, &text, now),
            ClientEvent::EditMessage { id: message_id, text } => {
                self.edit_message(id, message_id, &text, now)
            }
            ClientEvent::DeleteMessage { id: message_id } => self.delete_message(id, message_id),
            ClientEvent::SendFile { url, media_kind, name } => {
                self.send_file(id, &url, &media_kind, name.as_deref(), now)
            }
            ClientEvent::SetFamilyFriendly { enabled } => self.set_family_friendly(id, enabled),
            ClientEvent::GetHistory(query) => self.history(id, query.and_then(|q| q.limit)),
            ClientEvent::Censor { id: message_id } => self.censor(id, message_id, now),
            ClientEvent::Kick { target_id, duration_ms, reason } => {
                self.kick(id, target_id, duration_ms.unwrap_or(0), reason.as_deref(), now)
            }
            ClientEvent::Unban { address } => self.unban(id, &address),
            ClientEvent::GrantAdmin { target_id } => self.grant_admin(id, target_id, now),
            ClientEvent::DenyAdmin { target_id } => self.deny_admin(id, target_id),
            ClientEvent::ClearChat => self.clear_chat(id),
            ClientEvent::Announce { text } => self.announce(id, &text, now),
            ClientEvent::GetRequests => self.pending_requests(id),
            ClientEvent::KickAll => self.kick_all(id, now),
        };

        match result {
            Ok(outbox) => outbox,
            Err(e) => {
                debug!("event from {} had no effect: {}", id, e);
                Outbox::new()
            }
        }
    }

    pub fn rename(&mut self, id: Uuid, raw: &str, now: DateTime<Utc>) -> Result<Outbox> {
        let old = self.directory.rename(id, raw, &self.filter)?;
        let me = self.participant(id)?.view();

        let mut outbox = Outbox::new();
        outbox.send_to(id, ServerEvent::SelfUpdate(me.clone()));
        self.append_system(format!("{} is now known as {}", old, me.username), now, &mut outbox);
        outbox.broadcast(ServerEvent::PresenceUpdate(me));
        Ok(outbox)
    }

    pub fn set_avatar(&mut self, id: Uuid, url: &str) -> Result<Outbox> {
        let url = url.trim();
        if url.is_empty() || url.chars().count() > MAX_URL_CHARS {
            return Err(RoomError::InvalidInput);
        }
        let participant = self.directory.get_mut(id).ok_or(RoomError::NotFound)?;
        participant.avatar_url = Some(url.to_string());
        let me = participant.view();

        let mut outbox = Outbox::new();
        outbox.send_to(id, ServerEvent::SelfUpdate(me.clone()));
        outbox.broadcast(ServerEvent::PresenceUpdate(me));
        Ok(outbox)
    }

    /// Chat line: command, elevation token, or plain message.
    pub fn send_message(&mut self, id: Uuid, raw: &str, now: DateTime<Utc>) -> Result<Outbox> {
        let text = clip(raw, MAX_MESSAGE_CHARS);
        if text.trim().is_empty() {
            return Err(RoomError::InvalidInput);
        }

        if let Some(command) = commands::parse(&text) {
            return self.run_command(id, &command, now);
        }

        let participant = self.directory.get_mut(id).ok_or(RoomError::NotFound)?;
        match participant.elevation.advance(&text, now) {
            ElevationOutcome::Suppress => {
                debug!("{} ({}) armed elevation", participant.username, id);
                return Ok(Outbox::new());
            }
            ElevationOutcome::Grant => {
                let mut outbox = Outbox::new();
                self.promote(id, now, &mut outbox)?;
                return Ok(outbox);
            }
            ElevationOutcome::PassThrough => {}
        }

        let participant = self.participant(id)?;
        let draft = MessageDraft {
            text: self.filter.apply(&text).into_owned(),
            kind: MessageKind::Plain,
            attachment: None,
            ..author_of(participant)
        };
        let mut outbox = Outbox::new();
        let message = self.ledger.append(draft, now);
        outbox.broadcast(ServerEvent::MessageCreate(message));
        Ok(outbox)
    }

    pub fn edit_message(
        &mut self,
        id: Uuid,
        message_id: u64,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<Outbox> {
        let requester = self.requester(id)?;
        let text = self.filter.apply(&clip(raw, MAX_MESSAGE_CHARS)).into_owned();
        let edit = self.ledger.edit(message_id, requester, text, now)?;

        let mut outbox = Outbox::new();
        outbox.broadcast(ServerEvent::MessageEdited(edit));
        Ok(outbox)
    }

    pub fn delete_message(&mut self, id: Uuid, message_id: u64) -> Result<Outbox> {
        let requester = self.requester(id)?;
        self.ledger.delete(message_id, requester)?;

        let mut outbox = Outbox::new();
        outbox.broadcast(ServerEvent::MessageDeleted { id: message_id });
        Ok(outbox)
    }

    /// Share a blob the upload service already stored.
    pub fn send_file(
        &mut self,
        id: Uuid,
        url: &str,
        media_kind: &str,
        name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Outbox> {
        let url = url.trim();
        if url.is_empty() || url.chars().count() > MAX_URL_CHARS {
            return Err(RoomError::InvalidInput);
        }
        let kind = if media_kind.starts_with("image/") {
            MessageKind::Picture
        } else {
            MessageKind::File
        };
        let text = name
            .map(|n| clip(n.trim(), MAX_MESSAGE_CHARS))
            .filter(|n| !n.is_empty())
            .unwrap_or_default();

        let participant = self.participant(id)?;
        let draft = MessageDraft {
            text: self.filter.apply(&text).into_owned(),
            kind,
            attachment: Some(Attachment {
                url: url.to_string(),
                media_kind: media_kind.to_string(),
            }),
            ..author_of(participant)
        };
        let mut outbox = Outbox::new();
        let message = self.ledger.append(draft, now);
        outbox.broadcast(ServerEvent::MessageCreate(message));
        Ok(outbox)
    }

    // -- Commands --

    fn run_command(
        &mut self,
        id: Uuid,
        command: &ParsedCommand<'_>,
        now: DateTime<Utc>,
    ) -> Result<Outbox> {
        let participant = self.participant(id)?;
        let ctx = CommandContext {
            directory: &self.directory,
            party_active: self.party_active(now),
        };
        let result = commands::execute(&ctx, participant, command);
        debug!("{} ran {:?}: {:?}", participant.username, command.name, result);

        let mut outbox = Outbox::new();
        match result {
            CommandResult::Help(text) => reply(&mut outbox, id, CommandReply::Help { text }),
            CommandResult::SlashList(commands) => {
                reply(&mut outbox, id, CommandReply::SlashList { commands })
            }
            CommandResult::Error(message) => reply(&mut outbox, id, CommandReply::Error { message }),
            CommandResult::Success(message) => {
                reply(&mut outbox, id, CommandReply::Success { message })
            }
            CommandResult::Picture { url } => {
                let participant = self.participant(id)?;
                let draft = MessageDraft {
                    text: url.clone(),
                    kind: MessageKind::Picture,
                    attachment: Some(Attachment {
                        url,
                        media_kind: "image".to_string(),
                    }),
                    ..author_of(participant)
                };
                let message = self.ledger.append(draft, now);
                outbox.broadcast(ServerEvent::MessageCreate(message));
            }
            CommandResult::Party { duration_ms } => {
                self.party_until = Some(now + Duration::milliseconds(duration_ms as i64));
                outbox.broadcast(ServerEvent::Party { duration: duration_ms });
            }
            CommandResult::RequestAdmin { reason } => {
                let username = self.participant(id)?.username.clone();
                let view = self.requests.submit(
                    id,
                    AdminRequest {
                        username,
                        reason,
                        requested_at: now,
                    },
                );
                for admin in self.directory.admins() {
                    outbox.send_to(admin.id, ServerEvent::AdminRequest(view.clone()));
                }
                reply(
                    &mut outbox,
                    id,
                    CommandReply::Success {
                        message: "Your request has been sent to the admins.".to_string(),
                    },
                );
            }
            CommandResult::Grant { target } => {
                self.requests.remove(target);
                self.promote(target, now, &mut outbox)?;
                let name = self.participant(target)?.username.clone();
                reply(
                    &mut outbox,
                    id,
                    CommandReply::Success {
                        message: format!("{name} is now an admin."),
                    },
                );
            }
            CommandResult::Camera { action } => {
                let participant = self.directory.get_mut(id).ok_or(RoomError::NotFound)?;
                participant.camera_on = action == CameraAction::On;
                outbox.broadcast(ServerEvent::Camera {
                    participant_id: id,
                    username: participant.username.clone(),
                    action,
                });
            }
        }
        Ok(outbox)
    }

    // -- Shared helpers --

    pub(crate) fn participant(&self, id: Uuid) -> Result<&Participant> {
        self.directory.get(id).ok_or(RoomError::NotFound)
    }

    pub(crate) fn requester(&self, id: Uuid) -> Result<Requester> {
        let p = self.participant(id)?;
        Ok(Requester {
            id: p.id,
            is_admin: p.is_admin,
        })
    }

    /// Make `target` an admin and tell the room.
    pub(crate) fn promote(&mut self, target: Uuid, now: DateTime<Utc>, outbox: &mut Outbox) -> Result<()> {
        let participant = self.directory.get_mut(target).ok_or(RoomError::NotFound)?;
        participant.is_admin = true;
        let view = participant.view();
        info!("{} ({}) is now an admin", view.username, target);

        outbox.send_to(target, ServerEvent::SelfUpdate(view.clone()));
        self.append_system(format!("{} has been granted admin powers", view.username), now, outbox);
        outbox.broadcast(ServerEvent::PresenceUpdate(view));
        Ok(())
    }

    pub(crate) fn append_system(&mut self, text: String, now: DateTime<Utc>, outbox: &mut Outbox) {
        let message = self.ledger.append(MessageDraft::system(text, MessageKind::Plain), now);
        outbox.broadcast(ServerEvent::MessageCreate(message));
    }

    /// Remove `target` as part of a kick: notify, close, then announce the departure.
    pub(crate) fn eject(
        &mut self,
        target: Uuid,
        reason: &str,
        duration_ms: u64,
        now: DateTime<Utc>,
        outbox: &mut Outbox,
    ) {
        outbox.send_to(
            target,
            ServerEvent::Kicked {
                reason: reason.to_string(),
                duration_ms,
            },
        );
        outbox.disconnect(target);
        outbox.extend(self.disconnect(target, now));
    }
}

fn author_of(participant: &Participant) -> MessageDraft {
    MessageDraft {
        author_id: Some(participant.id),
        author_username: participant.username.clone(),
        author_color: participant.color.clone(),
        author_is_admin: participant.is_admin,
        text: String::new(),
        kind: MessageKind::Plain,
        attachment: None,
    }
}

fn reply(outbox: &mut Outbox, id: Uuid, body: CommandReply) {
    outbox.send_to(id, ServerEvent::CommandResult(body));
}
