//! Polling delivery fallback.
//!
//! When no push transport is active, the thread view re-fetches on a
//! short timer. The poller dedups against already-known message ids, so
//! the visible state converges to exactly what the realtime path would
//! have shown, only delayed.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::warn;

use mingle_types::api::MessageView;

pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Read model shared by every delivery path.
pub trait MessageSource {
    fn fetch_since(
        &self,
        thread_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = anyhow::Result<Vec<MessageView>>> + Send;
}

pub struct ThreadPoller<S> {
    source: S,
    thread_id: String,
    seen: HashSet<String>,
    since: Option<DateTime<Utc>>,
    interval: Duration,
}

impl<S: MessageSource> ThreadPoller<S> {
    pub fn new(source: S, thread_id: impl Into<String>) -> Self {
        Self::with_interval(source, thread_id, POLL_INTERVAL)
    }

    pub fn with_interval(source: S, thread_id: impl Into<String>, interval: Duration) -> Self {
        Self {
            source,
            thread_id: thread_id.into(),
            seen: HashSet::new(),
            since: None,
            interval,
        }
    }

    /// One fetch cycle. Returns only messages not seen before, in server
    /// order; fetch errors are logged and produce an empty batch so the
    /// next tick can retry.
    pub async fn poll_once(&mut self) -> Vec<MessageView> {
        let fetched = match self.source.fetch_since(&self.thread_id, self.since).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Poll failed for thread {}: {}", self.thread_id, e);
                return Vec::new();
            }
        };

        let mut fresh = Vec::new();
        for message in fetched {
            if !self.seen.insert(message.id.clone()) {
                continue;
            }
            // Advance the cursor monotonically; the server returns
            // strictly-newer rows, dedup covers the boundary.
            if self.since.is_none_or(|s| message.created_at > s) {
                self.since = Some(message.created_at);
            }
            fresh.push(message);
        }
        fresh
    }

    /// Drive the poll loop, forwarding fresh messages until the consumer
    /// goes away.
    pub async fn run(mut self, out: mpsc::UnboundedSender<MessageView>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            for message in self.poll_once().await {
                if out.send(message).is_err() {
                    return;
                }
            }
        }
    }
}
