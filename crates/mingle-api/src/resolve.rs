//! Candidate validation for decoded thread ids.
//!
//! The identity scheme is deliberately lossy; referential existence is
//! the true disambiguator. Candidates are tried in decoder order and the
//! first whose event and counterpart both exist wins.

use anyhow::Result;

use mingle_db::Database;
use mingle_db::models::{EventRow, UserRow};
use mingle_types::api::{EventSummary, UserSummary};
use mingle_types::thread::{channel_key, thread_id_candidates};

pub struct ResolvedThread {
    pub event: EventRow,
    pub other_user: UserRow,
}

impl ResolvedThread {
    /// Symmetric pub/sub channel for this thread as seen by `viewer_id`.
    pub fn channel(&self, viewer_id: &str) -> String {
        channel_key(&self.event.id, viewer_id, &self.other_user.id)
    }
}

/// Try every decoded candidate against the store, in order. `None` means
/// no candidate referenced an existing event + user pair.
pub fn resolve_thread(db: &Database, thread_id: &str) -> Result<Option<ResolvedThread>> {
    for candidate in thread_id_candidates(thread_id) {
        let Some(event) = db.get_event_by_id(&candidate.event_id)? else {
            continue;
        };
        let Some(other_user) = db.get_user_by_id(&candidate.other_user_id)? else {
            continue;
        };
        return Ok(Some(ResolvedThread { event, other_user }));
    }
    Ok(None)
}

pub fn event_summary(event: &EventRow) -> EventSummary {
    EventSummary {
        id: event.id.clone(),
        title: event.title.clone(),
        image_src: event.image_src.clone(),
        owner_id: event.owner_id.clone(),
    }
}

pub fn user_summary(user: &UserRow) -> UserSummary {
    UserSummary {
        id: user.id.clone(),
        name: user.name.clone(),
        avatar_url: user.avatar_url.clone(),
    }
}
