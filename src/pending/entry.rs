//! Pending-queue entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{ClientSeq, MessageKind, SeqNum};

/// How submitted ops leave the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// Ops go to the transport as they are submitted.
    Automatic,
    /// Ops accumulate until an explicit flush; the run forms one batch.
    Manual,
}

/// A submitted op awaiting its ack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingMessage {
    pub kind: MessageKind,
    pub client_seq: ClientSeq,
    /// Latest sequence number the client had observed at submit time.
    pub ref_seq: SeqNum,
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_metadata: Option<Value>,
}

/// One slot in the pending (or rehydrated) queue.
///
/// The serde form is the on-disk handoff format; tags are stable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PendingEntry {
    #[serde(rename = "message")]
    Message(PendingMessage),
    #[serde(rename = "flush_mode")]
    FlushModeChange { mode: FlushMode },
    #[serde(rename = "flush")]
    FlushMarker,
}

impl PendingEntry {
    pub fn is_message(&self) -> bool {
        matches!(self, PendingEntry::Message(_))
    }

    pub fn as_message(&self) -> Option<&PendingMessage> {
        match self {
            PendingEntry::Message(message) => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn message(csn: u64) -> PendingEntry {
        PendingEntry::Message(PendingMessage {
            kind: MessageKind::Op,
            client_seq: ClientSeq::new(csn),
            ref_seq: SeqNum::new(10),
            content: json!({"path": "/text", "insert": "hi"}),
            local_metadata: None,
            op_metadata: None,
        })
    }

    #[test]
    fn entries_tag_by_type() {
        let encoded = serde_json::to_value(message(3)).unwrap();
        assert_eq!(encoded["type"], "message");
        assert_eq!(encoded["client_seq"], 3);

        let encoded = serde_json::to_value(PendingEntry::FlushModeChange {
            mode: FlushMode::Manual,
        })
        .unwrap();
        assert_eq!(encoded["type"], "flush_mode");
        assert_eq!(encoded["mode"], "manual");

        let encoded = serde_json::to_value(PendingEntry::FlushMarker).unwrap();
        assert_eq!(encoded["type"], "flush");
    }

    #[test]
    fn entries_round_trip() {
        for entry in [
            message(1),
            PendingEntry::FlushModeChange {
                mode: FlushMode::Automatic,
            },
            PendingEntry::FlushMarker,
        ] {
            let bytes = serde_json::to_vec(&entry).unwrap();
            let back: PendingEntry = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(back, entry);
        }
    }

    #[test]
    fn absent_metadata_is_omitted() {
        let encoded = serde_json::to_value(message(1)).unwrap();
        assert!(encoded.get("local_metadata").is_none());
        assert!(encoded.get("op_metadata").is_none());
    }
}
