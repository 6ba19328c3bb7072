use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events published on a thread channel.
///
/// Delivery is at-most-once best effort on every transport; a REST fetch
/// always supplies authoritative state, these only cut perceived latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ThreadEvent {
    /// A message was persisted for this thread.
    NewMessage {
        id: String,
        content: String,
        sender_id: String,
        sender_name: Option<String>,
        sender_avatar: Option<String>,
        created_at: DateTime<Utc>,
    },

    /// A message was soft-deleted by its sender.
    MessageDeleted { message_id: String },

    /// A participant started or stopped typing. Ephemeral, never stored.
    Typing {
        user_id: String,
        user_name: String,
        is_typing: bool,
    },

    /// Live draft preview while a participant is typing. Ephemeral.
    MessageStream {
        user_id: String,
        user_name: String,
        content: String,
    },
}

impl ThreadEvent {
    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage { .. } => "new-message",
            Self::MessageDeleted { .. } => "message-deleted",
            Self::Typing { .. } => "typing",
            Self::MessageStream { .. } => "message-stream",
        }
    }

    /// The user that caused this event, for consumer-side self-filtering.
    /// Deletions carry no originator and are delivered to everyone.
    pub fn origin_user(&self) -> Option<&str> {
        match self {
            Self::NewMessage { sender_id, .. } => Some(sender_id),
            Self::MessageDeleted { .. } => None,
            Self::Typing { user_id, .. } => Some(user_id),
            Self::MessageStream { user_id, .. } => Some(user_id),
        }
    }
}
