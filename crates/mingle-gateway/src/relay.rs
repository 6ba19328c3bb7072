//! In-process per-thread event relay, the streaming fallback when no
//! external push transport is configured.
//!
//! A process-wide registry maps a channel key to a broadcast sender.
//! Subscribers register on SSE connect and deregister on disconnect;
//! the map entry is dropped as soon as its last subscriber leaves so
//! idle threads do not accumulate bookkeeping.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::warn;

use mingle_types::events::ThreadEvent;

/// Per-channel buffer; a slow SSE consumer past this lags and skips.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone, Default)]
pub struct StreamRelay {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<ThreadEvent>>>>,
}

impl StreamRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to current subscribers of the channel, if any.
    /// No subscribers means the event is dropped; REST fetch is the
    /// authoritative path and will supply it later.
    pub fn publish(&self, channel: &str, event: ThreadEvent) {
        let channels = self.channels.read().expect("relay lock poisoned");
        if let Some(tx) = channels.get(channel) {
            let _ = tx.send(event);
        }
    }

    pub fn subscribe(&self, channel: &str) -> ThreadSubscription {
        let mut channels = self.channels.write().expect("relay lock poisoned");
        let tx = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        ThreadSubscription {
            channel: channel.to_string(),
            rx: Some(tx.subscribe()),
            relay: self.clone(),
        }
    }

    /// Number of live subscribers on a channel. Zero once the entry is
    /// garbage-collected.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        let channels = self.channels.read().expect("relay lock poisoned");
        channels.get(channel).map_or(0, |tx| tx.receiver_count())
    }

    fn release(&self, channel: &str) {
        let mut channels = self.channels.write().expect("relay lock poisoned");
        if let Some(tx) = channels.get(channel) {
            if tx.receiver_count() == 0 {
                channels.remove(channel);
            }
        }
    }
}

/// A live subscription to one thread channel. Dropping it deregisters
/// the subscriber and removes the channel entry once empty.
pub struct ThreadSubscription {
    channel: String,
    rx: Option<broadcast::Receiver<ThreadEvent>>,
    relay: StreamRelay,
}

impl ThreadSubscription {
    /// Next event on the channel. Lagged gaps are skipped with a warning;
    /// `None` means the channel closed.
    pub async fn recv(&mut self) -> Option<ThreadEvent> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Relay subscriber on {} lagged by {} events", self.channel, n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for ThreadSubscription {
    fn drop(&mut self) {
        // Drop the receiver first so the count reflects this departure.
        self.rx.take();
        self.relay.release(&self.channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typing(user_id: &str) -> ThreadEvent {
        ThreadEvent::Typing {
            user_id: user_id.into(),
            user_name: "Test".into(),
            is_typing: true,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let relay = StreamRelay::new();
        let mut sub = relay.subscribe("evt--a--b");

        relay.publish("evt--a--b", typing("usr_1"));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.origin_user(), Some("usr_1"));
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let relay = StreamRelay::new();
        let mut sub = relay.subscribe("evt--a--b");

        relay.publish("evt--a--c", typing("usr_1"));
        relay.publish("evt--a--b", typing("usr_2"));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.origin_user(), Some("usr_2"));
    }

    #[tokio::test]
    async fn empty_channels_are_garbage_collected() {
        let relay = StreamRelay::new();
        let first = relay.subscribe("evt--a--b");
        let second = relay.subscribe("evt--a--b");
        assert_eq!(relay.subscriber_count("evt--a--b"), 2);

        drop(first);
        assert_eq!(relay.subscriber_count("evt--a--b"), 1);

        drop(second);
        assert_eq!(relay.subscriber_count("evt--a--b"), 0);
        assert!(relay.channels.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_dropped() {
        let relay = StreamRelay::new();
        relay.publish("evt--a--b", typing("usr_1"));
        assert!(relay.channels.read().unwrap().is_empty());
    }
}
