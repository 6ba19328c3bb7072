/// Database row types — these map directly to SQLite rows.
/// Distinct from the mingle-types API models to keep the DB layer
/// independent.

pub struct UserRow {
    pub id: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

pub struct EventRow {
    pub id: String,
    pub title: String,
    pub image_src: Option<String>,
    pub owner_id: String,
}

pub struct MessageRow {
    pub id: String,
    pub event_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
    pub deleted_at: Option<String>,
    pub sender_name: Option<String>,
    pub sender_avatar: Option<String>,
}

/// One message joined with event and counterpart metadata, fetched in
/// bulk for inbox aggregation.
pub struct InboxMessageRow {
    pub event_id: String,
    pub event_title: String,
    pub event_image: Option<String>,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub sender_avatar: Option<String>,
    pub receiver_id: String,
    pub receiver_name: Option<String>,
    pub receiver_avatar: Option<String>,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
}
