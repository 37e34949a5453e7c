use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use pulsebot_core::domain::post::Post;

/// Event kind the reply path cares about; everything else is noise.
pub const POSTED_EVENT: &str = "posted";

/// One inbound event from the stream, with the broadcast channel id as
/// reported by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventEnvelope {
    pub seq: i64,
    pub channel_id: String,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Posted(Post),
    Unsupported { event_type: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> &str {
        match self {
            Self::Posted(_) => POSTED_EVENT,
            Self::Unsupported { event_type } => event_type,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("event frame is not a valid envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("posted event is missing its post payload")]
    MissingPostPayload,
    #[error("post payload is not a valid post record: {0}")]
    PostPayload(#[source] serde_json::Error),
}

// The server double-encodes post payloads: `data.post` is a JSON string
// containing the post record, not an inline object.
#[derive(Debug, Deserialize)]
struct WireEnvelope {
    #[serde(default)]
    event: String,
    #[serde(default)]
    seq: i64,
    #[serde(default)]
    data: HashMap<String, Value>,
    #[serde(default)]
    broadcast: WireBroadcast,
}

#[derive(Debug, Default, Deserialize)]
struct WireBroadcast {
    #[serde(default)]
    channel_id: String,
}

pub fn decode_event(raw: &str) -> Result<EventEnvelope, DecodeError> {
    let wire: WireEnvelope = serde_json::from_str(raw).map_err(DecodeError::Envelope)?;

    let event = match wire.event.as_str() {
        POSTED_EVENT => {
            let payload = wire
                .data
                .get("post")
                .and_then(Value::as_str)
                .ok_or(DecodeError::MissingPostPayload)?;
            let post: Post = serde_json::from_str(payload).map_err(DecodeError::PostPayload)?;
            ChatEvent::Posted(post)
        }
        other => ChatEvent::Unsupported { event_type: other.to_string() },
    };

    Ok(EventEnvelope { seq: wire.seq, channel_id: wire.broadcast.channel_id, event })
}
