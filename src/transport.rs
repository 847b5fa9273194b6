use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::error::TransportError;

/// Upstream keepalive call. Implementations may suspend; they are only ever
/// awaited from the heartbeat task.
#[async_trait]
pub trait KeepaliveTransport: Send + Sync {
    async fn send_keepalive(&self) -> Result<(), TransportError>;
}

/// Posts heartbeats to `{base_url}/rooms/{room_id}/heartbeat`.
pub struct HttpKeepalive {
    client: Client,
    base_url: String,
    room_id: String,
    auth_token: Option<String>,
}

impl HttpKeepalive {
    pub fn new(base_url: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            room_id: room_id.into(),
            auth_token: None,
        }
    }

    pub fn with_auth_token(mut self, token: String) -> Self {
        self.auth_token = Some(token);
        self
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref token) = self.auth_token {
            builder.header("Authorization", format!("Bearer {token}"))
        } else {
            builder
        }
    }

    pub fn heartbeat_url(&self) -> String {
        format!("{}/rooms/{}/heartbeat", self.base_url, self.room_id)
    }
}

#[async_trait]
impl KeepaliveTransport for HttpKeepalive {
    async fn send_keepalive(&self) -> Result<(), TransportError> {
        let builder = self
            .client
            .post(self.heartbeat_url())
            .json(&json!({ "room_id": self.room_id }));
        let resp = self.apply_auth(builder).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Upstream { status, body });
        }

        Ok(())
    }
}
