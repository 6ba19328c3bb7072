pub mod error;
pub mod middleware;
pub mod resolve;
pub mod stream;
pub mod threads;
pub mod typing;

use std::sync::Arc;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use tracing::error;

use crate::error::ApiError;
use mingle_db::Database;
use mingle_gateway::dispatcher::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
}

/// Messaging routes. The caller (binary or test) supplies state and any
/// outer layers; every route here requires a resolved viewer identity.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/threads", get(threads::get_inbox))
        .route("/me/unread", get(threads::get_unread_badge))
        .route("/threads/{thread_id}", get(threads::get_thread))
        .route("/threads/{thread_id}", post(threads::send_message))
        .route(
            "/threads/{thread_id}/messages",
            get(stream::fetch_messages_since),
        )
        .route(
            "/threads/{thread_id}/messages/{message_id}",
            delete(threads::delete_message),
        )
        .route("/threads/{thread_id}/stream", get(stream::stream_thread))
        .route("/typing", post(typing::post_typing))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state)
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn run_blocking<T>(
    f: impl FnOnce() -> Result<T, ApiError> + Send + 'static,
) -> Result<T, ApiError>
where
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            Err(ApiError::Internal(anyhow::anyhow!("task join failure")))
        }
    }
}
