use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// Bearer-token claims. Canonical definition lives here so the REST
/// middleware and any future gateway share one type. Token issuance is
/// owned by the identity provider, not this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, e.g. `usr_100`.
    pub sub: String,
    pub name: String,
    pub exp: usize,
}

// -- Participants --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    pub title: String,
    pub image_src: Option<String>,
    pub owner_id: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub content: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub sender_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_own: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadResponse {
    pub thread_id: String,
    pub event: EventSummary,
    pub other_user: UserSummary,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageView>,
}

// -- Inbox --

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub event_id: String,
    pub event_title: String,
    pub event_image: Option<String>,
    pub other_user: UserSummary,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InboxResponse {
    pub threads: Vec<ThreadSummary>,
}

/// UI badge figures. `threads_with_unread` counts counterpart threads,
/// not messages: twenty unread messages from one person show as "1".
#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadBadge {
    pub total_messages: i64,
    pub threads_with_unread: i64,
}

// -- Typing --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypingRequest {
    pub thread_id: String,
    pub is_typing: bool,
    /// Draft text for live preview streaming.
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TypingResponse {
    pub ok: bool,
    /// Whether the external push transport carried the signal. `false`
    /// means graceful degradation to polling, never an error.
    pub realtime: bool,
}

// -- Deletion --

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub ok: bool,
}
