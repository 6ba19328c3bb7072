//! Hosted pub/sub push transport.
//!
//! Speaks the Pusher-compatible REST trigger protocol: a signed
//! `POST /apps/{app_id}/events` per published event. The transport is
//! optional — without credentials in the environment it is simply absent
//! and delivery degrades to the polling/SSE fallback.

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha2::Sha256;
use std::time::Duration;
use tracing::warn;

use mingle_types::events::ThreadEvent;

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub app_id: String,
    pub key: String,
    pub secret: String,
    pub cluster: String,
}

impl PushConfig {
    /// Reads `MINGLE_PUSH_APP_ID` / `MINGLE_PUSH_KEY` / `MINGLE_PUSH_SECRET`
    /// (`MINGLE_PUSH_CLUSTER` optional, default `ap1`). All three secrets
    /// must be present for the transport to be configured at all.
    pub fn from_env() -> Option<Self> {
        let app_id = std::env::var("MINGLE_PUSH_APP_ID").ok()?;
        let key = std::env::var("MINGLE_PUSH_KEY").ok()?;
        let secret = std::env::var("MINGLE_PUSH_SECRET").ok()?;
        let cluster = std::env::var("MINGLE_PUSH_CLUSTER").unwrap_or_else(|_| "ap1".into());
        Some(Self {
            app_id,
            key,
            secret,
            cluster,
        })
    }
}

pub struct PushClient {
    config: PushConfig,
    http: reqwest::Client,
}

impl PushClient {
    pub fn new(config: PushConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    /// Publish one event on a thread channel. Best effort: any failure is
    /// logged and reported as `false`, never propagated.
    pub async fn trigger(&self, channel: &str, event: &ThreadEvent) -> bool {
        let data = match serde_json::to_string(event) {
            Ok(data) => data,
            Err(e) => {
                warn!("Push payload serialization failed: {}", e);
                return false;
            }
        };

        let body = serde_json::json!({
            "name": event.kind(),
            "channel": format!("thread-{}", channel),
            "data": data,
        })
        .to_string();

        let url = self.signed_url(&body, chrono::Utc::now().timestamp());

        match self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!("Push trigger rejected: {}", resp.status());
                false
            }
            Err(e) => {
                warn!("Push trigger error: {}", e);
                false
            }
        }
    }

    /// Request signing: MD5 of the body plus an HMAC-SHA256 over the
    /// method, path and sorted query string.
    fn signed_url(&self, body: &str, timestamp: i64) -> String {
        let body_md5 = hex::encode(Md5::digest(body.as_bytes()));
        let path = format!("/apps/{}/events", self.config.app_id);
        let query = format!(
            "auth_key={}&auth_timestamp={}&auth_version=1.0&body_md5={}",
            self.config.key, timestamp, body_md5
        );

        let to_sign = format!("POST\n{}\n{}", path, query);
        let mut mac = HmacSha256::new_from_slice(self.config.secret.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(to_sign.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        format!(
            "https://api-{}.pusher.com{}?{}&auth_signature={}",
            self.config.cluster, path, query, signature
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_url_is_deterministic_for_fixed_inputs() {
        let client = PushClient::new(PushConfig {
            app_id: "123".into(),
            key: "k".into(),
            secret: "s".into(),
            cluster: "ap1".into(),
        });

        let a = client.signed_url("{}", 1_700_000_000);
        let b = client.signed_url("{}", 1_700_000_000);
        assert_eq!(a, b);
        assert!(a.starts_with("https://api-ap1.pusher.com/apps/123/events?auth_key=k"));
        assert!(a.contains("&auth_signature="));
    }

    #[test]
    fn signature_depends_on_body() {
        let client = PushClient::new(PushConfig {
            app_id: "123".into(),
            key: "k".into(),
            secret: "s".into(),
            cluster: "ap1".into(),
        });

        assert_ne!(
            client.signed_url("{\"a\":1}", 1_700_000_000),
            client.signed_url("{\"a\":2}", 1_700_000_000),
        );
    }
}
