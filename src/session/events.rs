use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat/overlay line as delivered by the transport. The core never looks
/// inside it beyond logging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MessagePayload {
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// A payload once it has been accepted into the buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Assigned at insertion, strictly increasing for the life of a buffer.
    pub seq: u64,
    pub received_at: DateTime<Utc>,
    pub payload: MessagePayload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ConnectSuccess,
    Message(MessagePayload),
    Disconnect,
    /// Toggles the scroll-to-bottom policy.
    SetAutoScroll(bool),
    /// Anything the transport produced that this version does not know.
    Other(String),
}

impl SessionEvent {
    pub fn kind(&self) -> &str {
        match self {
            SessionEvent::ConnectSuccess => "connect_success",
            SessionEvent::Message(_) => "danmaku",
            SessionEvent::Disconnect => "disconnect",
            SessionEvent::SetAutoScroll(_) => "auto_scroll",
            SessionEvent::Other(kind) => kind,
        }
    }
}

/// Transport frame envelope.
#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Decode one JSON frame. Returns `None` for malformed frames; unknown frame
/// types come back as [`SessionEvent::Other`].
pub fn decode(text: &str) -> Option<SessionEvent> {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!("dropping malformed frame: {e}");
            return None;
        }
    };

    match frame.kind.as_str() {
        "connect_success" => Some(SessionEvent::ConnectSuccess),
        "disconnect" => Some(SessionEvent::Disconnect),
        "danmaku" | "message" => {
            let data = frame.data?;
            match serde_json::from_value::<MessagePayload>(data) {
                Ok(payload) => Some(SessionEvent::Message(payload)),
                Err(e) => {
                    tracing::debug!("dropping malformed message payload: {e}");
                    None
                }
            }
        }
        "auto_scroll" => frame
            .data
            .and_then(|d| d.as_bool())
            .map(SessionEvent::SetAutoScroll),
        _ => Some(SessionEvent::Other(frame.kind)),
    }
}
