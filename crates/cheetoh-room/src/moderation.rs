//! Admin-only room actions.
//!
//! A non-admin caller gets `Err(RoomError::Unauthorized)`, which the room
//! turns into an empty outbox: moderation attempts by regular users are
//! silently ignored.

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use cheetoh_types::events::{CommandReply, ServerEvent};
use cheetoh_types::models::MessageKind;

use crate::directory::Participant;
use crate::error::{Result, RoomError};
use crate::ledger::{MAX_MESSAGE_CHARS, MessageDraft, clip};
use crate::outbox::Outbox;
use crate::requests::MAX_REASON_CHARS;
use crate::room::Room;

pub const MAX_BAN_MS: i64 = 60_000;
pub const ANNOUNCEMENT_PREFIX: &str = "📢 Announcement: ";
const DEFAULT_KICK_REASON: &str = "You were kicked by an admin.";
const KICK_ALL_REASON: &str = "An admin cleared the room.";

impl Room {
    fn require_admin(&self, id: Uuid) -> Result<&Participant> {
        let participant = self.participant(id)?;
        if !participant.is_admin {
            return Err(RoomError::Unauthorized);
        }
        Ok(participant)
    }

    pub fn set_family_friendly(&mut self, requester: Uuid, enabled: bool) -> Result<Outbox> {
        self.require_admin(requester)?;
        self.filter.set_enabled(enabled);
        info!("family-friendly mode {}", if enabled { "on" } else { "off" });

        let mut outbox = Outbox::new();
        outbox.broadcast(ServerEvent::FamilyFriendly { enabled });
        Ok(outbox)
    }

    /// Unicast the most recent history to the requesting admin.
    pub fn history(&self, requester: Uuid, limit: Option<i64>) -> Result<Outbox> {
        self.require_admin(requester)?;
        let mut outbox = Outbox::new();
        outbox.send_to(
            requester,
            ServerEvent::History {
                messages: self.ledger.slice(limit),
            },
        );
        Ok(outbox)
    }

    pub fn censor(&mut self, requester: Uuid, message_id: u64, now: DateTime<Utc>) -> Result<Outbox> {
        let requester = self.requester(requester)?;
        let edit = self.ledger.censor(message_id, requester, now)?;

        let mut outbox = Outbox::new();
        outbox.broadcast(ServerEvent::MessageEdited(edit));
        Ok(outbox)
    }

    /// Disconnect `target`, optionally banning its address for up to a minute.
    pub fn kick(
        &mut self,
        requester: Uuid,
        target: Uuid,
        duration_ms: i64,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Outbox> {
        let admin = self.require_admin(requester)?.username.clone();
        if target == requester {
            return Err(RoomError::InvalidInput);
        }
        let victim = self.participant(target)?;
        let (victim_name, address) = (victim.username.clone(), victim.address.clone());

        let duration_ms = duration_ms.clamp(0, MAX_BAN_MS);
        if duration_ms > 0 {
            self.bans
                .ban(&address, now + Duration::milliseconds(duration_ms), now);
        }
        info!(
            "{} kicked {} ({}) with a {} ms ban",
            admin, victim_name, address, duration_ms
        );

        let reason = reason
            .map(|r| clip(r.trim(), MAX_REASON_CHARS))
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_KICK_REASON.to_string());
        let mut outbox = Outbox::new();
        self.eject(target, &reason, duration_ms as u64, now, &mut outbox);
        Ok(outbox)
    }

    pub fn unban(&mut self, requester: Uuid, address: &str) -> Result<Outbox> {
        self.require_admin(requester)?;
        if self.bans.unban(address.trim()) {
            info!("unbanned {}", address.trim());
        }
        Ok(Outbox::new())
    }

    /// Promote `target` whether or not it has a pending request.
    pub fn grant_admin(&mut self, requester: Uuid, target: Uuid, now: DateTime<Utc>) -> Result<Outbox> {
        self.require_admin(requester)?;
        let target_is_admin = self.participant(target)?.is_admin;
        self.requests.remove(target);

        let mut outbox = Outbox::new();
        if !target_is_admin {
            self.promote(target, now, &mut outbox)?;
        }
        Ok(outbox)
    }

    pub fn deny_admin(&mut self, requester: Uuid, target: Uuid) -> Result<Outbox> {
        self.require_admin(requester)?;
        self.requests.remove(target).ok_or(RoomError::NotFound)?;

        let mut outbox = Outbox::new();
        if self.directory.get(target).is_some() {
            outbox.send_to(
                target,
                ServerEvent::CommandResult(CommandReply::Error {
                    message: "Your admin request was denied.".to_string(),
                }),
            );
        }
        Ok(outbox)
    }

    pub fn clear_chat(&mut self, requester: Uuid) -> Result<Outbox> {
        let requester = self.requester(requester)?;
        self.ledger.clear(requester)?;
        info!("chat cleared by {}", requester.id);

        let mut outbox = Outbox::new();
        outbox.broadcast(ServerEvent::ChatCleared);
        Ok(outbox)
    }

    pub fn announce(&mut self, requester: Uuid, text: &str, now: DateTime<Utc>) -> Result<Outbox> {
        self.require_admin(requester)?;
        let text = clip(text.trim(), MAX_MESSAGE_CHARS);
        if text.is_empty() {
            return Err(RoomError::InvalidInput);
        }

        let mut outbox = Outbox::new();
        let message = self.ledger.append(
            MessageDraft::system(
                format!("{ANNOUNCEMENT_PREFIX}{text}"),
                MessageKind::Announcement,
            ),
            now,
        );
        outbox.broadcast(ServerEvent::MessageCreate(message));
        Ok(outbox)
    }

    pub fn pending_requests(&self, requester: Uuid) -> Result<Outbox> {
        self.require_admin(requester)?;
        let mut outbox = Outbox::new();
        outbox.send_to(
            requester,
            ServerEvent::AdminRequests {
                requests: self.requests.list(),
            },
        );
        Ok(outbox)
    }

    /// Disconnect everyone except the requester. Nobody is banned.
    pub fn kick_all(&mut self, requester: Uuid, now: DateTime<Utc>) -> Result<Outbox> {
        self.require_admin(requester)?;
        let others: Vec<Uuid> = self
            .directory
            .iter()
            .map(|p| p.id)
            .filter(|id| *id != requester)
            .collect();
        info!("{} kicking {} connections", requester, others.len());

        let mut outbox = Outbox::new();
        for target in others {
            self.eject(target, KICK_ALL_REASON, 0, now, &mut outbox);
        }
        Ok(outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::Admission;
    use crate::outbox::Delivery;
    use crate::room::tests::{created, join, make_admin, say, t0, texts};
    use cheetoh_types::events::ClientEvent;

    fn admin_room() -> (Room, Uuid) {
        let mut room = Room::new();
        let admin = join(&mut room, "10.0.0.1");
        make_admin(&mut room, admin);
        (room, admin)
    }

    fn kick(room: &mut Room, admin: Uuid, target: Uuid, duration_ms: Option<i64>) -> Outbox {
        room.apply(
            admin,
            ClientEvent::Kick {
                target_id: target,
                duration_ms,
                reason: None,
            },
            t0(),
        )
    }

    #[test]
    fn kick_bans_address_for_duration() {
        let (mut room, admin) = admin_room();
        let bob = join(&mut room, "10.0.0.2");

        let outbox = kick(&mut room, admin, bob, Some(5_000));
        let deliveries: Vec<&Delivery> = outbox.iter().collect();
        assert!(matches!(
            deliveries[0],
            Delivery::To(id, ServerEvent::Kicked { duration_ms: 5_000, .. }) if *id == bob
        ));
        assert_eq!(deliveries[1], &Delivery::Disconnect(bob));
        assert!(room.directory().get(bob).is_none());

        assert_eq!(
            room.admit("10.0.0.2", t0()),
            Admission::Reject { remaining_ms: 5_000 }
        );
        assert_eq!(
            room.admit("10.0.0.2", t0() + Duration::milliseconds(4_000)),
            Admission::Reject { remaining_ms: 1_000 }
        );
        assert_eq!(
            room.admit("10.0.0.2", t0() + Duration::milliseconds(5_000)),
            Admission::Allow
        );
        assert!(room.connect(Uuid::new_v4(), "10.0.0.2", t0()).is_err());
    }

    fn kick_frame(target: Uuid, duration: &str, reason: &str) -> ClientEvent {
        let raw = format!(
            r#"{{"type":"admin:kick","data":{{"targetId":"{target}","durationMs":{duration},"reason":"{reason}"}}}}"#
        );
        serde_json::from_str(&raw).unwrap()
    }

    fn kicked_with(outbox: &Outbox, target: Uuid) -> (String, u64) {
        outbox
            .iter()
            .find_map(|d| match d {
                Delivery::To(id, ServerEvent::Kicked { reason, duration_ms }) if *id == target => {
                    Some((reason.clone(), *duration_ms))
                }
                _ => None,
            })
            .expect("sys:kicked for target")
    }

    #[test]
    fn browser_numbers_are_clamped_not_dropped() {
        for (duration, expected) in [("1e12", 60_000), ("99999999999999999999", 60_000), ("5000.5", 5_000), ("-3", 0)] {
            let (mut room, admin) = admin_room();
            let bob = join(&mut room, "10.0.0.2");

            let outbox = room.apply(admin, kick_frame(bob, duration, "spam"), t0());
            assert_eq!(kicked_with(&outbox, bob), ("spam".to_string(), expected), "{duration}");
            assert!(room.directory().get(bob).is_none());

            let admission = room.admit("10.0.0.2", t0());
            if expected == 0 {
                assert_eq!(admission, Admission::Allow);
            } else {
                assert_eq!(admission, Admission::Reject { remaining_ms: expected });
            }
        }
    }

    #[test]
    fn kick_reason_is_bounded() {
        let (mut room, admin) = admin_room();
        let bob = join(&mut room, "10.0.0.2");
        let outbox = room.apply(admin, kick_frame(bob, "0", &"x".repeat(1_000)), t0());
        let (reason, _) = kicked_with(&outbox, bob);
        assert_eq!(reason.chars().count(), MAX_REASON_CHARS);
    }

    #[test]
    fn blank_kick_reason_uses_default() {
        let (mut room, admin) = admin_room();
        let bob = join(&mut room, "10.0.0.2");
        let outbox = room.apply(admin, kick_frame(bob, "0", "   "), t0());
        assert_eq!(kicked_with(&outbox, bob).0, DEFAULT_KICK_REASON);
    }

    #[test]
    fn kick_duration_is_capped_at_a_minute() {
        let (mut room, admin) = admin_room();
        let bob = join(&mut room, "10.0.0.2");
        kick(&mut room, admin, bob, Some(3_600_000));
        assert_eq!(
            room.admit("10.0.0.2", t0()),
            Admission::Reject { remaining_ms: MAX_BAN_MS as u64 }
        );
    }

    #[test]
    fn zero_duration_kick_does_not_ban() {
        let (mut room, admin) = admin_room();
        let bob = join(&mut room, "10.0.0.2");
        kick(&mut room, admin, bob, None);
        assert_eq!(room.admit("10.0.0.2", t0()), Admission::Allow);
        assert!(room.bans.is_empty());
    }

    #[test]
    fn kicked_participant_leaves_once() {
        let (mut room, admin) = admin_room();
        let bob = join(&mut room, "10.0.0.2");
        kick(&mut room, admin, bob, None);
        assert!(room.disconnect(bob, t0()).is_empty());
        assert_eq!(room.ledger().len(), 1);
    }

    #[test]
    fn admins_cannot_kick_themselves() {
        let (mut room, admin) = admin_room();
        assert!(kick(&mut room, admin, admin, Some(1_000)).is_empty());
        assert!(room.directory().get(admin).is_some());
    }

    #[test]
    fn unban_lifts_ban_and_is_idempotent() {
        let (mut room, admin) = admin_room();
        let bob = join(&mut room, "10.0.0.2");
        kick(&mut room, admin, bob, Some(30_000));

        let unban = ClientEvent::Unban { address: "10.0.0.2".into() };
        room.apply(admin, unban.clone(), t0());
        assert_eq!(room.admit("10.0.0.2", t0()), Admission::Allow);
        assert!(room.apply(admin, unban, t0()).is_empty());
    }

    #[test]
    fn regular_users_cannot_moderate() {
        let (mut room, admin) = admin_room();
        let bob = join(&mut room, "10.0.0.2");
        say(&mut room, admin, "hello");

        let attempts = vec![
            ClientEvent::SetFamilyFriendly { enabled: true },
            ClientEvent::history(None),
            ClientEvent::Censor { id: 1 },
            ClientEvent::Kick { target_id: admin, duration_ms: Some(60_000), reason: None },
            ClientEvent::GrantAdmin { target_id: bob },
            ClientEvent::ClearChat,
            ClientEvent::Announce { text: "hi".into() },
            ClientEvent::GetRequests,
            ClientEvent::KickAll,
        ];
        for event in attempts {
            assert!(room.apply(bob, event.clone(), t0()).is_empty(), "{event:?}");
        }
        assert!(!room.family_friendly());
        assert!(!room.directory().get(bob).unwrap().is_admin);
        assert_eq!(texts(&room), vec!["hello"]);
        assert_eq!(room.admit("10.0.0.1", t0()), Admission::Allow);
    }

    #[test]
    fn censor_replaces_text_for_everyone() {
        let (mut room, admin) = admin_room();
        let bob = join(&mut room, "10.0.0.2");
        say(&mut room, bob, "something rude");

        let outbox = room.apply(admin, ClientEvent::Censor { id: 1 }, t0());
        let events = outbox.events_for(bob);
        assert!(matches!(
            events[0],
            ServerEvent::MessageEdited(edit) if edit.id == 1 && edit.text == crate::ledger::CENSORED_TEXT
        ));
        assert_eq!(texts(&room), vec![crate::ledger::CENSORED_TEXT]);
    }

    #[test]
    fn ids_keep_growing_after_clear() {
        let (mut room, admin) = admin_room();
        say(&mut room, admin, "one");
        say(&mut room, admin, "two");

        let outbox = room.apply(admin, ClientEvent::ClearChat, t0());
        assert_eq!(outbox.broadcasts(), vec![&ServerEvent::ChatCleared]);
        assert!(room.ledger().is_empty());

        let next = created(&say(&mut room, admin, "three"));
        assert!(next.id > 2);
    }

    #[test]
    fn history_is_unicast_and_bounded() {
        let (mut room, admin) = admin_room();
        let bob = join(&mut room, "10.0.0.2");
        for i in 0..5 {
            say(&mut room, bob, &format!("msg {i}"));
        }
        let outbox = room.apply(admin, ClientEvent::history(Some(2)), t0());
        assert!(outbox.events_for(bob).is_empty());
        let events = outbox.events_for(admin);
        let [ServerEvent::History { messages }] = events[..] else {
            panic!("expected a single history event");
        };
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["msg 3", "msg 4"]);
    }

    #[test]
    fn bad_history_limits_fall_back_to_default_page() {
        let (mut room, admin) = admin_room();
        for i in 0..250 {
            say(&mut room, admin, &format!("msg {i}"));
        }

        let frames = [
            r#"{"type":"admin:get_history"}"#,
            r#"{"type":"admin:get_history","data":{}}"#,
            r#"{"type":"admin:get_history","data":{"limit":"abc"}}"#,
            r#"{"type":"admin:get_history","data":{"limit":12.5}}"#,
        ];
        for raw in frames {
            let event: ClientEvent = serde_json::from_str(raw).unwrap();
            let outbox = room.apply(admin, event, t0());
            let events = outbox.events_for(admin);
            let [ServerEvent::History { messages }] = events[..] else {
                panic!("expected a single history event for {raw}");
            };
            assert_eq!(messages.len(), crate::ledger::DEFAULT_SLICE, "{raw}");
            assert_eq!(messages.last().unwrap().text, "msg 249");
        }
    }

    #[test]
    fn announce_is_a_system_message() {
        let (mut room, admin) = admin_room();
        let msg = created(&room.apply(admin, ClientEvent::Announce { text: " pizza at 6 ".into() }, t0()));
        assert!(msg.is_system);
        assert_eq!(msg.kind, MessageKind::Announcement);
        assert_eq!(msg.text, format!("{ANNOUNCEMENT_PREFIX}pizza at 6"));
        assert!(room.apply(admin, ClientEvent::Announce { text: "  ".into() }, t0()).is_empty());
    }

    #[test]
    fn grant_and_deny_resolve_requests() {
        let (mut room, admin) = admin_room();
        let bob = join(&mut room, "10.0.0.2");
        let carol = join(&mut room, "10.0.0.3");
        say(&mut room, bob, "/requestadmin please");
        say(&mut room, carol, "/requestadmin me too");

        let outbox = room.apply(admin, ClientEvent::GetRequests, t0());
        let events = outbox.events_for(admin);
        let [ServerEvent::AdminRequests { requests }] = events[..] else {
            panic!("expected pending requests");
        };
        assert_eq!(requests.len(), 2);

        room.apply(admin, ClientEvent::GrantAdmin { target_id: bob }, t0());
        assert!(room.directory().get(bob).unwrap().is_admin);

        let outbox = room.apply(admin, ClientEvent::DenyAdmin { target_id: carol }, t0());
        assert!(matches!(
            outbox.events_for(carol)[0],
            ServerEvent::CommandResult(CommandReply::Error { .. })
        ));
        assert!(!room.directory().get(carol).unwrap().is_admin);
        assert!(room.requests().is_empty());

        // Nothing left to deny.
        assert!(room.apply(admin, ClientEvent::DenyAdmin { target_id: carol }, t0()).is_empty());
    }

    #[test]
    fn kick_all_spares_the_requester() {
        let (mut room, admin) = admin_room();
        let bob = join(&mut room, "10.0.0.2");
        let carol = join(&mut room, "10.0.0.3");

        let outbox = room.apply(admin, ClientEvent::KickAll, t0());
        let closed: Vec<Uuid> = outbox
            .iter()
            .filter_map(|d| match d {
                Delivery::Disconnect(id) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(closed, vec![bob, carol]);
        assert_eq!(room.directory().len(), 1);
        assert!(room.directory().get(admin).is_some());
        assert!(room.bans.is_empty());
    }
}
