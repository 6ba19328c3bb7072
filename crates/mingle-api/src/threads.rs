use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use mingle_db::models::{InboxMessageRow, MessageRow};
use mingle_types::api::{
    Claims, DeleteResponse, InboxResponse, MessageView, SendMessageRequest, ThreadResponse,
    ThreadSummary, UnreadBadge,
};
use mingle_types::events::ThreadEvent;
use mingle_types::thread::format_thread_id;

use crate::error::ApiError;
use crate::resolve::{event_summary, resolve_thread, user_summary};
use crate::{AppState, run_blocking};

/// GET /threads — the inbox: one row per (event, counterpart) pair with
/// last message and unread count, newest activity first.
pub async fn get_inbox(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.clone();

    let db = state.clone();
    let viewer_rows = viewer.clone();
    let rows = run_blocking(move || Ok(db.db.list_inbox_messages(&viewer_rows)?)).await?;

    Ok(Json(InboxResponse {
        threads: aggregate_inbox(&viewer, rows),
    }))
}

/// GET /me/unread — aggregate badge figures.
pub async fn get_unread_badge(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let (total_messages, threads_with_unread) =
        run_blocking(move || Ok(db.db.aggregate_unread(&claims.sub)?)).await?;

    Ok(Json(UnreadBadge {
        total_messages,
        threads_with_unread,
    }))
}

/// GET /threads/{thread_id} — resolved participants plus the ordered
/// message list. Fetching marks the viewer's unread messages as read.
pub async fn get_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.clone();

    let db = state.clone();
    let viewer_db = viewer.clone();
    let tid = thread_id.clone();
    let (resolved, rows) = run_blocking(move || {
        let resolved = resolve_thread(&db.db, &tid)?.ok_or(ApiError::InvalidThreadId)?;
        let rows = db
            .db
            .list_messages(&resolved.event.id, &viewer_db, &resolved.other_user.id)?;
        db.db
            .mark_read(&resolved.event.id, &viewer_db, &resolved.other_user.id)?;
        Ok((resolved, rows))
    })
    .await?;

    Ok(Json(ThreadResponse {
        thread_id,
        event: event_summary(&resolved.event),
        other_user: user_summary(&resolved.other_user),
        messages: rows.iter().map(|m| message_view(m, &viewer)).collect(),
    }))
}

/// POST /threads/{thread_id} — create a message. Persist first; the
/// realtime publish and the notification record are both best effort.
pub async fn send_message(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::Validation("Message content required"));
    }

    let viewer = claims.sub.clone();
    let sender_name = claims.name.clone();
    let message_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let created_at = mingle_db::format_timestamp(now);

    let db = state.clone();
    let tid = thread_id.clone();
    let viewer_db = viewer.clone();
    let content_db = content.clone();
    let mid = message_id.clone();
    let stamp = created_at.clone();
    let resolved = run_blocking(move || {
        let resolved = resolve_thread(&db.db, &tid)?.ok_or(ApiError::InvalidThreadId)?;
        if resolved.other_user.id == viewer_db {
            return Err(ApiError::Validation("Cannot message yourself"));
        }

        db.db.insert_message(
            &mid,
            &resolved.event.id,
            &viewer_db,
            &resolved.other_user.id,
            &content_db,
            &stamp,
        )?;

        // Notification record for the recipient; losing it must not fail
        // the send.
        let preview = preview(&content_db);
        if let Err(e) = db.db.insert_notification(
            &Uuid::new_v4().to_string(),
            &resolved.other_user.id,
            "message",
            "New message",
            &format!("{}: {}", sender_name, preview),
            Some(&format!(
                "/dashboard/messages/{}",
                format_thread_id(&resolved.event.id, &viewer_db)
            )),
            Some(&resolved.event.id),
            Some(&viewer_db),
        ) {
            warn!("Notification insert failed: {}", e);
        }

        Ok(resolved)
    })
    .await?;

    // Persisted; now notify. Publish failure is logged inside the
    // dispatcher and never rolls back the write.
    state
        .dispatcher
        .publish(
            &resolved.channel(&viewer),
            ThreadEvent::NewMessage {
                id: message_id.clone(),
                content: content.clone(),
                sender_id: viewer.clone(),
                sender_name: Some(claims.name.clone()),
                sender_avatar: None,
                created_at: now,
            },
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(MessageView {
            id: message_id,
            content,
            sender_id: viewer,
            sender_name: Some(claims.name),
            sender_avatar: None,
            created_at: now,
            is_own: true,
        }),
    ))
}

/// DELETE /threads/{thread_id}/messages/{message_id} — sender-only soft
/// delete. Deleting an already-deleted message again is a no-op success.
pub async fn delete_message(
    State(state): State<AppState>,
    Path((thread_id, message_id)): Path<(String, String)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.clone();

    let db = state.clone();
    let viewer_db = viewer.clone();
    let mid = message_id.clone();
    let resolved = run_blocking(move || {
        let resolved = resolve_thread(&db.db, &thread_id)?.ok_or(ApiError::InvalidThreadId)?;

        let message = db
            .db
            .get_message(&mid)?
            .ok_or(ApiError::NotFound("Message not found"))?;

        let in_thread = message.event_id == resolved.event.id
            && (message.sender_id == viewer_db && message.receiver_id == resolved.other_user.id
                || message.sender_id == resolved.other_user.id
                    && message.receiver_id == viewer_db);
        if !in_thread {
            return Err(ApiError::Validation("Message not in this thread"));
        }

        if message.sender_id != viewer_db {
            return Err(ApiError::Forbidden("Only the sender can delete a message"));
        }

        if message.deleted_at.is_none() {
            db.db
                .soft_delete_message(&mid, &mingle_db::format_timestamp(Utc::now()))?;
        }

        Ok(resolved)
    })
    .await?;

    state
        .dispatcher
        .publish(
            &resolved.channel(&viewer),
            ThreadEvent::MessageDeleted { message_id },
        )
        .await;

    Ok(Json(DeleteResponse { ok: true }))
}

pub(crate) fn message_view(row: &MessageRow, viewer_id: &str) -> MessageView {
    MessageView {
        id: row.id.clone(),
        content: row.content.clone(),
        sender_id: row.sender_id.clone(),
        sender_name: row.sender_name.clone(),
        sender_avatar: row.sender_avatar.clone(),
        created_at: parse_timestamp(&row.created_at, &row.id),
        is_own: row.sender_id == viewer_id,
    }
}

pub(crate) fn parse_timestamp(raw: &str, message_id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows stamped by SQLite defaults carry "YYYY-MM-DD HH:MM:SS"
            // without a timezone; parse as naive UTC.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on message '{}': {}", raw, message_id, e);
            DateTime::default()
        })
}

fn preview(content: &str) -> String {
    let mut out: String = content.chars().take(50).collect();
    if content.chars().count() > 50 {
        out.push_str("...");
    }
    out
}

fn aggregate_inbox(viewer_id: &str, rows: Vec<InboxMessageRow>) -> Vec<ThreadSummary> {
    // Rows arrive newest first, so the first row seen for a thread is its
    // last message and first-seen order is already the sort order.
    let mut threads: Vec<ThreadSummary> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let unread = if row.receiver_id == viewer_id && !row.is_read {
            1
        } else {
            0
        };

        let (other_id, other_name, other_avatar) = if row.sender_id == viewer_id {
            (row.receiver_id, row.receiver_name, row.receiver_avatar)
        } else {
            (row.sender_id.clone(), row.sender_name, row.sender_avatar)
        };

        let thread_id = format_thread_id(&row.event_id, &other_id);
        match index.get(&thread_id) {
            Some(&i) => threads[i].unread_count += unread,
            None => {
                index.insert(thread_id.clone(), threads.len());
                threads.push(ThreadSummary {
                    thread_id,
                    event_id: row.event_id,
                    event_title: row.event_title,
                    event_image: row.event_image,
                    other_user: mingle_types::api::UserSummary {
                        id: other_id,
                        name: other_name,
                        avatar_url: other_avatar,
                    },
                    last_message: row.content.clone(),
                    last_message_at: parse_timestamp(&row.created_at, "inbox"),
                    unread_count: unread,
                });
            }
        }
    }

    threads
}
