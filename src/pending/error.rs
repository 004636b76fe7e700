//! Pending-op error types.
//!
//! Everything here is unrecoverable by definition: each variant records a
//! divergence between the client's view of what it sent and the totally
//! ordered log. There is no retry and no local fallback.

use thiserror::Error;

use crate::core::{ClientId, ClientSeq, SeqNum};
use crate::runtime::RebaseError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PendingError {
    /// The ack's client sequence number does not match the head of the queue.
    #[error(
        "ack at seq {sequence_number} for client {client_id:?} carries csn \
         {client_sequence_number}, expected {expected_client_sequence_number}"
    )]
    CsnMismatch {
        client_id: Option<ClientId>,
        sequence_number: SeqNum,
        client_sequence_number: ClientSeq,
        expected_client_sequence_number: ClientSeq,
    },

    /// A local ack arrived while the queue head held no message for it.
    #[error("local ack at seq {sequence_number} but no pending message at the queue head")]
    AckWithoutMessage { sequence_number: SeqNum },

    /// A flush-mode marker sat where batch framing forbids it.
    #[error("misplaced {mode} flush-mode marker at the queue head (ack seq {sequence_number})")]
    MisplacedFlushMode {
        mode: &'static str,
        sequence_number: SeqNum,
    },

    /// A batch opened while another was still in flight.
    #[error(
        "batch beginning at seq {sequence_number} while the batch from seq \
         {open_sequence_number} is still open"
    )]
    NestedBatch {
        open_sequence_number: SeqNum,
        sequence_number: SeqNum,
    },

    /// A batch end was verified with no batch open.
    #[error("batch end at seq {sequence_number} with no batch open")]
    BatchNotOpen { sequence_number: SeqNum },

    /// Begin/end batch framing metadata is malformed.
    #[error(
        "malformed batch metadata: begin seq {begin_sequence_number} flag {begin_flag:?}, \
         end seq {end_sequence_number} flag {end_flag:?}"
    )]
    BatchMetadata {
        begin_sequence_number: SeqNum,
        end_sequence_number: SeqNum,
        begin_flag: Option<bool>,
        end_flag: Option<bool>,
    },

    /// Rehydrated ops were computed against an older baseline than the
    /// snapshot this session loaded from.
    #[error(
        "snapshot too recent to rebase pending ops: leading op references seq {ref_seq} \
         but the stream already reached seq {sequence_number}"
    )]
    RebaseTooOld { ref_seq: SeqNum, sequence_number: SeqNum },

    /// The injected rebase adapter failed.
    #[error(transparent)]
    Rebase(#[from] RebaseError),
}

impl PendingError {
    /// True for mismatches between the ack stream and the queue — the cases
    /// the state machine itself reports through [`OpRuntime::close`].
    ///
    /// [`OpRuntime::close`]: crate::runtime::OpRuntime::close
    pub fn is_data_corruption(&self) -> bool {
        matches!(
            self,
            PendingError::CsnMismatch { .. }
                | PendingError::AckWithoutMessage { .. }
                | PendingError::MisplacedFlushMode { .. }
                | PendingError::NestedBatch { .. }
                | PendingError::BatchNotOpen { .. }
                | PendingError::BatchMetadata { .. }
        )
    }
}
