use axum::{Extension, Json, extract::State, response::IntoResponse};

use mingle_types::api::{Claims, TypingRequest, TypingResponse};
use mingle_types::events::ThreadEvent;

use crate::error::ApiError;
use crate::resolve::resolve_thread;
use crate::{AppState, run_blocking};

/// POST /typing — relay a typing (and optional draft preview) signal on
/// the thread channel. Signals are ephemeral: never persisted, delivered
/// at most once. An unconfigured push transport is reported through the
/// `realtime` flag, never as an error.
pub async fn post_typing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TypingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.clone();

    let db = state.clone();
    let thread_id = req.thread_id.clone();
    let resolved = run_blocking(move || {
        resolve_thread(&db.db, &thread_id)?.ok_or(ApiError::InvalidThreadId)
    })
    .await?;

    let channel = resolved.channel(&viewer);
    let user_name = claims.name.clone();

    let realtime = state
        .dispatcher
        .publish(
            &channel,
            ThreadEvent::Typing {
                user_id: viewer.clone(),
                user_name: user_name.clone(),
                is_typing: req.is_typing,
            },
        )
        .await;

    // Draft preview rides the same channel while the sender is typing.
    if req.is_typing {
        if let Some(content) = req.content.filter(|c| !c.trim().is_empty()) {
            state
                .dispatcher
                .publish(
                    &channel,
                    ThreadEvent::MessageStream {
                        user_id: viewer,
                        user_name,
                        content,
                    },
                )
                .await;
        }
    }

    Ok(Json(TypingResponse { ok: true, realtime }))
}
