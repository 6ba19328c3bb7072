//! HTTP bindings for the client-side coordinators.

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::mpsc;
use tracing::warn;

use mingle_types::api::{MessageView, MessagesResponse, TypingResponse};

use crate::poller::MessageSource;
use crate::typing::TypingEmit;

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Relay a typing signal. Returns whether the server reported the
    /// realtime transport as active.
    pub async fn send_typing(
        &self,
        thread_id: &str,
        is_typing: bool,
        content: Option<&str>,
    ) -> anyhow::Result<bool> {
        let response: TypingResponse = self
            .http
            .post(format!("{}/typing", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "thread_id": thread_id,
                "is_typing": is_typing,
                "content": content,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.realtime)
    }
}

impl MessageSource for ApiClient {
    async fn fetch_since(
        &self,
        thread_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<MessageView>> {
        let mut url = format!("{}/threads/{}/messages", self.base_url, thread_id);
        if let Some(since) = since {
            url.push_str(&format!(
                "?since={}",
                since.to_rfc3339_opts(SecondsFormat::Millis, true)
            ));
        }

        let response: MessagesResponse = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.messages)
    }
}

/// Forward coordinator emissions to the typing endpoint until the
/// coordinator is dropped. Send failures are logged and skipped, exactly
/// like every other best-effort signal.
pub async fn forward_typing(
    client: ApiClient,
    thread_id: String,
    mut emissions: mpsc::UnboundedReceiver<TypingEmit>,
) {
    while let Some(emit) = emissions.recv().await {
        let result = match &emit {
            TypingEmit::Start => client.send_typing(&thread_id, true, None).await,
            TypingEmit::Stop => client.send_typing(&thread_id, false, None).await,
            TypingEmit::Preview(draft) => {
                client.send_typing(&thread_id, true, Some(draft)).await
            }
        };
        if let Err(e) = result {
            warn!("Typing relay failed for thread {}: {}", thread_id, e);
        }
    }
}
