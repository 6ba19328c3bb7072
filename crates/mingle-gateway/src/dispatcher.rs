//! Publishing facade over the two delivery paths: the optional hosted
//! push transport and the in-process stream relay. Producers publish
//! once; which transports carry the event is invisible to them.

use std::sync::Arc;

use mingle_types::events::ThreadEvent;

use crate::push::{PushClient, PushConfig};
use crate::relay::{StreamRelay, ThreadSubscription};

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    push: Option<PushClient>,
    relay: StreamRelay,
}

impl Dispatcher {
    pub fn new(push: Option<PushClient>) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                push,
                relay: StreamRelay::new(),
            }),
        }
    }

    /// Build from environment; push transport configured only when
    /// credentials are present.
    pub fn from_env() -> Self {
        Self::new(PushConfig::from_env().map(PushClient::new))
    }

    pub fn realtime_configured(&self) -> bool {
        self.inner.push.is_some()
    }

    /// Publish to every transport. Returns whether the hosted push
    /// transport accepted the event; the local relay always receives it.
    /// Failures never propagate — persistence has already succeeded by
    /// the time anything is published.
    pub async fn publish(&self, channel: &str, event: ThreadEvent) -> bool {
        self.inner.relay.publish(channel, event.clone());

        match &self.inner.push {
            Some(push) => push.trigger(channel, &event).await,
            None => false,
        }
    }

    /// Register an in-process subscriber (SSE connection) for a channel.
    pub fn subscribe(&self, channel: &str) -> ThreadSubscription {
        self.inner.relay.subscribe(channel)
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner.relay.subscriber_count(channel)
    }
}
