//! Shared test fixtures: a scripted container runtime, a recording rebaser,
//! and sequenced-message builders.

// Each integration binary uses its own subset of these helpers.
#![allow(dead_code)]

use serde_json::Value;
use uuid::Uuid;

use weave_rs::{
    ClientId, ClientSeq, FlushMode, MessageKind, MessageMetadata, OpRuntime, PendingError,
    RebaseError, Rebaser, SeqNum, SequencedMessage, Submission,
};

/// Every call the state machine makes against the runtime, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum RuntimeCall {
    SetFlushMode(FlushMode),
    Flush,
    Resubmit {
        kind: MessageKind,
        content: Value,
        local_metadata: Option<Value>,
        op_metadata: Option<Value>,
    },
    Close(PendingError),
}

/// A container runtime double that records the calls driven into it and
/// assigns fresh client sequence numbers on resubmit.
pub struct MockRuntime {
    pub connected: bool,
    pub client_id: Option<ClientId>,
    pub flush_mode: FlushMode,
    /// Reference sequence number stamped onto resubmissions.
    pub ref_seq: SeqNum,
    pub calls: Vec<RuntimeCall>,
    pub closed_with: Option<PendingError>,
    next_client_seq: u64,
}

impl MockRuntime {
    pub fn connected_as(id: &ClientId) -> Self {
        Self {
            connected: true,
            client_id: Some(id.clone()),
            flush_mode: FlushMode::Automatic,
            ref_seq: SeqNum::new(0),
            calls: Vec::new(),
            closed_with: None,
            next_client_seq: 0,
        }
    }

    pub fn resubmitted_contents(&self) -> Vec<&Value> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                RuntimeCall::Resubmit { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }
}

impl OpRuntime for MockRuntime {
    fn connected(&self) -> bool {
        self.connected
    }

    fn client_id(&self) -> Option<ClientId> {
        self.client_id.clone()
    }

    fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    fn set_flush_mode(&mut self, mode: FlushMode) {
        // Leaving manual mode pushes whatever accumulated to the transport,
        // exactly as the live orderer does.
        if self.flush_mode == FlushMode::Manual && mode == FlushMode::Automatic {
            self.calls.push(RuntimeCall::Flush);
        }
        self.flush_mode = mode;
        self.calls.push(RuntimeCall::SetFlushMode(mode));
    }

    fn flush(&mut self) {
        self.calls.push(RuntimeCall::Flush);
    }

    fn resubmit(
        &mut self,
        kind: MessageKind,
        content: &Value,
        local_metadata: Option<&Value>,
        op_metadata: Option<&Value>,
    ) -> Submission {
        self.calls.push(RuntimeCall::Resubmit {
            kind,
            content: content.clone(),
            local_metadata: local_metadata.cloned(),
            op_metadata: op_metadata.cloned(),
        });
        self.next_client_seq += 1;
        Submission {
            client_seq: ClientSeq::new(self.next_client_seq),
            ref_seq: self.ref_seq,
        }
    }

    fn close(&mut self, error: PendingError) {
        self.closed_with = Some(error.clone());
        self.calls.push(RuntimeCall::Close(error));
    }
}

/// Rebaser double recording `(content, local_metadata)` pairs in order.
#[derive(Default)]
pub struct RecordingRebaser {
    pub rebased: Vec<(Value, Option<Value>)>,
}

impl Rebaser for RecordingRebaser {
    fn rebase(
        &mut self,
        content: &Value,
        local_metadata: Option<&Value>,
    ) -> Result<(), RebaseError> {
        self.rebased.push((content.clone(), local_metadata.cloned()));
        Ok(())
    }
}

/// Rebaser double that refuses everything.
pub struct FailingRebaser;

impl Rebaser for FailingRebaser {
    fn rebase(
        &mut self,
        _content: &Value,
        _local_metadata: Option<&Value>,
    ) -> Result<(), RebaseError> {
        Err(RebaseError {
            target: "text-dds".into(),
            reason: "detached".into(),
        })
    }
}

pub fn client_id(seed: u128) -> ClientId {
    ClientId::new(format!("client-{}", Uuid::from_u128(seed))).expect("client id")
}

pub fn ack(client: &ClientId, csn: u64, seq: u64, batch: Option<bool>) -> SequencedMessage {
    SequencedMessage {
        kind: MessageKind::Op,
        client_id: Some(client.clone()),
        client_seq: ClientSeq::new(csn),
        sequence_number: SeqNum::new(seq),
        metadata: batch.map(|flag| MessageMetadata { batch: Some(flag) }),
    }
}
