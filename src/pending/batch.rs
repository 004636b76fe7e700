//! Batch framing verification across an ack stream.

use crate::core::SequencedMessage;

use super::error::PendingError;

/// Tracks the batch the local ack stream is currently inside.
///
/// Empty means "not in a batch". Entering records the first sequenced
/// message of the batch so its framing metadata can be verified against the
/// last one; a single `Option` keeps the flag and the begin message in step.
#[derive(Debug, Default)]
pub(crate) struct BatchTracker {
    begin: Option<SequencedMessage>,
}

impl BatchTracker {
    pub(crate) fn is_open(&self) -> bool {
        self.begin.is_some()
    }

    /// Open a batch at `begin`. Nested batches are corruption.
    pub(crate) fn enter(&mut self, begin: SequencedMessage) -> Result<(), PendingError> {
        if let Some(open) = &self.begin {
            return Err(PendingError::NestedBatch {
                open_sequence_number: open.sequence_number,
                sequence_number: begin.sequence_number,
            });
        }
        self.begin = Some(begin);
        Ok(())
    }

    /// Close the batch at `end`, verifying begin/end framing metadata.
    ///
    /// A single-message batch (begin and end are the same sequenced message)
    /// must carry no batch flag at all; a longer batch must open with
    /// `batch: true` and close with `batch: false`.
    pub(crate) fn finish(&mut self, end: &SequencedMessage) -> Result<(), PendingError> {
        let Some(begin) = self.begin.take() else {
            return Err(PendingError::BatchNotOpen {
                sequence_number: end.sequence_number,
            });
        };

        let begin_flag = begin.batch_flag();
        let end_flag = end.batch_flag();
        let well_formed = if begin.sequence_number == end.sequence_number {
            begin_flag.is_none()
        } else {
            begin_flag == Some(true) && end_flag == Some(false)
        };
        if !well_formed {
            return Err(PendingError::BatchMetadata {
                begin_sequence_number: begin.sequence_number,
                end_sequence_number: end.sequence_number,
                begin_flag,
                end_flag,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{ClientSeq, MessageKind, MessageMetadata, SeqNum};

    use super::*;

    fn ack(seq: u64, batch: Option<bool>) -> SequencedMessage {
        SequencedMessage {
            kind: MessageKind::Op,
            client_id: None,
            client_seq: ClientSeq::new(seq),
            sequence_number: SeqNum::new(seq),
            metadata: batch.map(|flag| MessageMetadata { batch: Some(flag) }),
        }
    }

    #[test]
    fn single_message_batch_requires_no_flag() {
        let mut tracker = BatchTracker::default();
        let only = ack(4, None);
        tracker.enter(only.clone()).unwrap();
        tracker.finish(&only).unwrap();
        assert!(!tracker.is_open());
    }

    #[test]
    fn single_message_batch_with_flag_is_corruption() {
        let mut tracker = BatchTracker::default();
        let only = ack(4, Some(true));
        tracker.enter(only.clone()).unwrap();
        let err = tracker.finish(&only).unwrap_err();
        assert!(matches!(err, PendingError::BatchMetadata { .. }));
    }

    #[test]
    fn multi_message_batch_requires_true_then_false() {
        let mut tracker = BatchTracker::default();
        tracker.enter(ack(1, Some(true))).unwrap();
        tracker.finish(&ack(3, Some(false))).unwrap();

        tracker.enter(ack(5, Some(true))).unwrap();
        let err = tracker.finish(&ack(7, None)).unwrap_err();
        assert!(matches!(err, PendingError::BatchMetadata { .. }));
    }

    #[test]
    fn nested_batches_are_rejected() {
        let mut tracker = BatchTracker::default();
        tracker.enter(ack(1, Some(true))).unwrap();
        let err = tracker.enter(ack(2, Some(true))).unwrap_err();
        assert_eq!(
            err,
            PendingError::NestedBatch {
                open_sequence_number: SeqNum::new(1),
                sequence_number: SeqNum::new(2),
            }
        );
    }
}
