use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lenient;
use crate::models::{AdminRequestView, CameraAction, ChatMessage, MessageEdit, ParticipantView};

/// Events sent FROM client TO server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    #[serde(rename = "user:set_username")]
    SetUsername { username: String },

    /// Profile picture, already uploaded through the upload service.
    #[serde(rename = "user:set_avatar")]
    SetAvatar { url: String },

    /// Chat text. Leading-slash lines may be commands.
    #[serde(rename = "chat:send")]
    SendMessage { text: String },

    #[serde(rename = "chat:edit")]
    EditMessage { id: u64, text: String },

    #[serde(rename = "chat:delete")]
    DeleteMessage { id: u64 },

    /// Share a file that the upload service already stored.
    #[serde(rename = "chat:send_file")]
    SendFile {
        url: String,
        media_kind: String,
        #[serde(default)]
        name: Option<String>,
    },

    #[serde(rename = "admin:set_family_friendly")]
    SetFamilyFriendly { enabled: bool },

    /// `data` may be omitted entirely.
    #[serde(rename = "admin:get_history")]
    GetHistory(Option<HistoryQuery>),

    #[serde(rename = "admin:censor")]
    Censor { id: u64 },

    #[serde(rename = "admin:kick")]
    Kick {
        target_id: Uuid,
        #[serde(default, deserialize_with = "lenient::number")]
        duration_ms: Option<i64>,
        #[serde(default)]
        reason: Option<String>,
    },

    #[serde(rename = "admin:unban")]
    Unban { address: String },

    #[serde(rename = "admin:grant")]
    GrantAdmin { target_id: Uuid },

    #[serde(rename = "admin:deny")]
    DenyAdmin { target_id: Uuid },

    #[serde(rename = "admin:clear_chat")]
    ClearChat,

    #[serde(rename = "admin:announce")]
    Announce { text: String },

    #[serde(rename = "admin:get_requests")]
    GetRequests,

    #[serde(rename = "admin:kick_all")]
    KickAll,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Anything but an integer falls back to the default page size.
    #[serde(default, deserialize_with = "lenient::integer")]
    pub limit: Option<i64>,
}

impl ClientEvent {
    /// `admin:get_history` with an optional limit.
    pub fn history(limit: Option<i64>) -> Self {
        ClientEvent::GetHistory(Some(HistoryQuery { limit }))
    }
}

/// Events sent FROM server TO clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// First event on every admitted connection, unicast.
    #[serde(rename = "init")]
    Init {
        #[serde(rename = "self")]
        me: ParticipantView,
        history: Vec<ChatMessage>,
        participants: Vec<ParticipantView>,
        family_friendly: bool,
    },

    #[serde(rename = "chat:new")]
    MessageCreate(ChatMessage),

    #[serde(rename = "chat:edited")]
    MessageEdited(MessageEdit),

    #[serde(rename = "chat:deleted")]
    MessageDeleted { id: u64 },

    #[serde(rename = "chat:cleared")]
    ChatCleared,

    #[serde(rename = "presence:join")]
    PresenceJoin(ParticipantView),

    #[serde(rename = "presence:update")]
    PresenceUpdate(ParticipantView),

    #[serde(rename = "presence:leave")]
    PresenceLeave(ParticipantView),

    #[serde(rename = "user:update_self")]
    SelfUpdate(ParticipantView),

    #[serde(rename = "admin:family_friendly")]
    FamilyFriendly { enabled: bool },

    #[serde(rename = "admin:history")]
    History { messages: Vec<ChatMessage> },

    /// A participant asked for admin powers; sent to every admin.
    #[serde(rename = "admin:request")]
    AdminRequest(AdminRequestView),

    #[serde(rename = "admin:requests")]
    AdminRequests { requests: Vec<AdminRequestView> },

    /// Last event a kicked connection receives before it is closed.
    #[serde(rename = "sys:kicked")]
    Kicked { reason: String, duration_ms: u64 },

    #[serde(rename = "command:result")]
    CommandResult(CommandReply),

    #[serde(rename = "command:cheetohparty")]
    Party { duration: u64 },

    #[serde(rename = "command:camera")]
    Camera {
        participant_id: Uuid,
        username: String,
        action: CameraAction,
    },
}

/// Command outcomes that are only ever shown to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandReply {
    Help { text: String },
    SlashList { commands: Vec<String> },
    Error { message: String },
    Success { message: String },
}
