//! Watch stream wire messages.
//!
//! A watch stream is a sequence of [`WatchMessage`]s: one `Snapshot`
//! message per record matching the filter at subscribe time, a single
//! `Parity` marker carrying the snapshot revision, then one message per
//! delta with a strictly greater sequence.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::kinds::WatchEventType;

/// Discriminant of a [`WatchMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum MessageType {
    /// A record that matched the filter when the watch started.
    Snapshot,
    /// End of the snapshot; the client's view is now complete.
    Parity,
    /// A record entered the watched set.
    Created,
    /// A watched record changed.
    Updated,
    /// A record left the watched set.
    Deleted,
}

impl From<WatchEventType> for MessageType {
    fn from(event_type: WatchEventType) -> Self {
        match event_type {
            WatchEventType::Created => Self::Created,
            WatchEventType::Updated => Self::Updated,
            WatchEventType::Deleted => Self::Deleted,
        }
    }
}

/// One frame on a watch stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WatchMessage {
    /// Store revision the message reflects. Snapshot and parity messages
    /// carry the snapshot revision; deltas carry their own.
    pub sequence: u64,
    /// Message discriminant.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Shaped resource; absent on `Parity`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_omits_resource() {
        let msg = WatchMessage {
            sequence: 7,
            message_type: MessageType::Parity,
            resource: None,
        };
        let json = serde_json::to_value(&msg).ok();
        assert_eq!(json, Some(serde_json::json!({"sequence": 7, "type": "Parity"})));
    }

    #[test]
    fn event_types_map_onto_message_types() {
        assert_eq!(MessageType::from(WatchEventType::Created), MessageType::Created);
        assert_eq!(MessageType::from(WatchEventType::Updated), MessageType::Updated);
        assert_eq!(MessageType::from(WatchEventType::Deleted), MessageType::Deleted);
    }
}
