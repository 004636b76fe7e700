//! Sequenced messages echoed back by the ordering service.

use serde::{Deserialize, Serialize};

use super::identity::ClientId;
use super::seq::{ClientSeq, SeqNum};

/// Kind tag carried by every message on the delta stream.
///
/// The pending-op core only special-cases `ChunkedOp` (fragments are
/// reassembled by the transport and never tracked); everything else flows
/// through uniformly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A DDS operation envelope.
    Op,
    /// Attach of a new data store to the document.
    Attach,
    /// One fragment of an op too large for a single frame.
    ChunkedOp,
    /// Attach of an out-of-band blob.
    BlobAttach,
    /// Client rejoin notification.
    Rejoin,
}

/// Framing metadata the runtime stamps onto ops at flush time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// `Some(true)` opens a batch, `Some(false)` closes it, `None` on every
    /// other op (including all of a single-op batch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<bool>,
}

/// The sequencer's echo of a submitted op: the ack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedMessage {
    pub kind: MessageKind,
    /// Absent on server-originated messages.
    pub client_id: Option<ClientId>,
    pub client_seq: ClientSeq,
    pub sequence_number: SeqNum,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl SequencedMessage {
    /// The tri-state batch flag: begin, end, or neither.
    pub fn batch_flag(&self) -> Option<bool> {
        self.metadata.as_ref().and_then(|metadata| metadata.batch)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn kind_uses_snake_case_tags() {
        assert_eq!(
            serde_json::to_value(MessageKind::ChunkedOp).unwrap(),
            json!("chunked_op")
        );
        let kind: MessageKind = serde_json::from_value(json!("blob_attach")).unwrap();
        assert_eq!(kind, MessageKind::BlobAttach);
    }

    #[test]
    fn batch_flag_defaults_to_absent() {
        let message = SequencedMessage {
            kind: MessageKind::Op,
            client_id: None,
            client_seq: ClientSeq::new(1),
            sequence_number: SeqNum::new(1),
            metadata: None,
        };
        assert_eq!(message.batch_flag(), None);

        let message = SequencedMessage {
            metadata: Some(MessageMetadata { batch: Some(true) }),
            ..message
        };
        assert_eq!(message.batch_flag(), Some(true));
    }
}
