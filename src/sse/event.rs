//! Events pushed over the SSE stream.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event type sent by the server once the subscription is registered.
pub const USER_CONNECTED: &str = "user-connected";

/// One JSON event from the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub message: Option<String>,
    /// Any other fields the server included.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// JSON text the event was parsed from.
    #[serde(skip)]
    pub raw: String,
}

impl Event {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Parse one chunk: everything before the first `{` is framing
/// (`data:`, `event:`, ...) and is discarded; the rest must be one JSON
/// object. `None` when the chunk has no `{` at all.
pub fn parse_chunk(chunk: &[u8]) -> Option<Result<Event, serde_json::Error>> {
    let start = chunk.iter().position(|&b| b == b'{')?;
    let json = &chunk[start..];
    Some(serde_json::from_slice::<Event>(json).map(|mut event| {
        event.raw = String::from_utf8_lossy(json).trim_end().to_string();
        event
    }))
}
