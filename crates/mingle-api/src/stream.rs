//! Delivery fallback paths: polling fetch-since and a per-thread SSE
//! stream. Both read the same model as the thread fetch, so which
//! transport a client uses is invisible to the rest of the system.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
    response::sse::{Event, KeepAlive, Sse},
};
use serde::Deserialize;
use tracing::warn;

use mingle_types::api::{Claims, MessagesResponse};

use crate::error::ApiError;
use crate::resolve::resolve_thread;
use crate::threads::message_view;
use crate::{AppState, run_blocking};

/// SSE keep-alive ping cadence.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct SinceQuery {
    /// RFC 3339; only messages created strictly after this are returned.
    pub since: Option<String>,
}

/// GET /threads/{thread_id}/messages?since=... — polling fallback.
/// Returns ascending new messages and marks the viewer's unread as read.
/// Clients dedupe against already-known ids.
pub async fn fetch_messages_since(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Query(query): Query<SinceQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    // Normalize the cursor to the stored timestamp format so the SQL
    // string comparison stays consistent regardless of the precision the
    // client echoed back.
    let since = match query.since.as_deref() {
        Some(raw) => Some(
            raw.parse::<chrono::DateTime<chrono::Utc>>()
                .map(mingle_db::format_timestamp)
                .map_err(|_| ApiError::Validation("since must be an RFC 3339 timestamp"))?,
        ),
        None => None,
    };

    let viewer = claims.sub.clone();

    let db = state.clone();
    let viewer_db = viewer.clone();
    let rows = run_blocking(move || {
        let resolved = resolve_thread(&db.db, &thread_id)?.ok_or(ApiError::InvalidThreadId)?;

        let rows = match since.as_deref() {
            Some(since) => db.db.list_messages_since(
                &resolved.event.id,
                &viewer_db,
                &resolved.other_user.id,
                since,
            )?,
            None => db
                .db
                .list_messages(&resolved.event.id, &viewer_db, &resolved.other_user.id)?,
        };

        db.db
            .mark_read(&resolved.event.id, &viewer_db, &resolved.other_user.id)?;

        Ok(rows)
    })
    .await?;

    Ok(Json(MessagesResponse {
        messages: rows.iter().map(|m| message_view(m, &viewer)).collect(),
    }))
}

/// GET /threads/{thread_id}/stream — server-push connection for one
/// thread. Subscriber registration lives exactly as long as the
/// connection: dropping the stream deregisters it and empty channels are
/// garbage-collected by the relay.
pub async fn stream_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.clone();

    let db = state.clone();
    let viewer_db = viewer.clone();
    let resolved = run_blocking(move || {
        resolve_thread(&db.db, &thread_id)?.ok_or(ApiError::InvalidThreadId)
    })
    .await?;

    let mut subscription = state.dispatcher.subscribe(&resolved.channel(&viewer_db));

    let stream = async_stream::stream! {
        // Connection acknowledgement so clients can distinguish an open
        // stream from a stalled request.
        yield Ok::<_, Infallible>(Event::default().event("connected").data("{}"));

        while let Some(event) = subscription.recv().await {
            // The originator already sees its own action optimistically.
            if event.origin_user() == Some(viewer.as_str()) {
                continue;
            }
            match serde_json::to_string(&event) {
                Ok(json) => yield Ok(Event::default().event(event.kind()).data(json)),
                Err(e) => warn!("SSE event serialization failed: {}", e),
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("ping"),
    ))
}
