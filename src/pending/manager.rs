//! The pending-op state machine.
//!
//! Tracks locally submitted but unacknowledged ops against the totally
//! ordered delta stream, preserves batch framing across reconnects, and
//! rehydrates pending work handed off from a previous process. A single
//! off-by-one between what was sent and what is re-sent silently diverges
//! replicas, so every ack is verified against the queue head and any
//! mismatch tears the container down.

use std::collections::VecDeque;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::core::{ClientId, ClientSeq, Limits, MessageKind, SeqNum, SequencedMessage};
use crate::runtime::{OpRuntime, Rebaser};

use super::batch::BatchTracker;
use super::entry::{FlushMode, PendingEntry, PendingMessage};
use super::error::PendingError;
use super::saved::{SavedPendingState, SAVED_STATE_VERSION};

/// What a processed ack turned out to be.
#[derive(Clone, Debug, PartialEq)]
pub enum AckClaim {
    /// The ack consumed a pending op of ours (or of our predecessor
    /// session); carries the op's local metadata for the owning DDS.
    Local { local_metadata: Option<Value> },
    /// Someone else's op, or a chunked fragment; nothing was dequeued.
    Foreign,
}

impl AckClaim {
    pub fn is_local(&self) -> bool {
        matches!(self, AckClaim::Local { .. })
    }
}

/// Per-client tracking of submitted-but-unacked ops.
///
/// All methods run on the runtime's main event loop; the type holds no locks
/// and must not be driven concurrently.
#[derive(Debug)]
pub struct PendingOps {
    limits: Limits,
    /// Live queue, head = oldest unacked.
    pending: VecDeque<PendingEntry>,
    /// Entries rehydrated from a prior session, drained head-first as the
    /// new session observes the stream. Once empty, never refilled.
    initial: VecDeque<PendingEntry>,
    initial_client_id: Option<ClientId>,
    initial_leading_csn: Option<ClientSeq>,
    /// Message entries in `pending` (framing entries excluded).
    pending_message_count: usize,
    batch: BatchTracker,
    /// Most recent client id this instance replayed under.
    session_client_id: Option<ClientId>,
    depth_warned: bool,
}

impl PendingOps {
    pub fn new(limits: Limits) -> Self {
        Self::from_parts(limits, VecDeque::new(), None)
    }

    /// Start a session from state a previous process saved.
    pub fn rehydrate(limits: Limits, saved: SavedPendingState) -> Self {
        Self::from_parts(limits, saved.entries.into(), saved.client_id)
    }

    fn from_parts(
        limits: Limits,
        initial: VecDeque<PendingEntry>,
        initial_client_id: Option<ClientId>,
    ) -> Self {
        let initial_leading_csn = initial
            .iter()
            .find_map(|entry| entry.as_message().map(|message| message.client_seq));
        Self {
            limits,
            pending: VecDeque::new(),
            initial,
            initial_client_id,
            initial_leading_csn,
            pending_message_count: 0,
            batch: BatchTracker::default(),
            session_client_id: None,
            depth_warned: false,
        }
    }

    /// Message entries currently tracked in the live queue.
    pub fn pending_message_count(&self) -> usize {
        self.pending_message_count
    }

    pub fn has_pending_messages(&self) -> bool {
        self.pending_message_count > 0 || !self.initial.is_empty()
    }

    /// Track a freshly submitted op. Must be called for every op the runtime
    /// puts on the wire; there is no failure mode.
    pub fn on_submit(
        &mut self,
        kind: MessageKind,
        client_seq: ClientSeq,
        ref_seq: SeqNum,
        content: Value,
        local_metadata: Option<Value>,
        op_metadata: Option<Value>,
    ) {
        self.pending.push_back(PendingEntry::Message(PendingMessage {
            kind,
            client_seq,
            ref_seq,
            content,
            local_metadata,
            op_metadata,
        }));
        self.pending_message_count += 1;
        if !self.depth_warned && self.pending_message_count >= self.limits.pending_depth_warn {
            self.depth_warned = true;
            warn!(
                pending = self.pending_message_count,
                threshold = self.limits.pending_depth_warn,
                "pending op depth crossed warning threshold"
            );
        }
    }

    /// Record a flush-mode transition at this point in the submission stream.
    ///
    /// Batch framing must be reconstructible from the queue alone on replay,
    /// so adjacent cancelling markers must not remain:
    /// - a manual flush immediately followed by the switch to automatic
    ///   collapses (the switch itself flushes);
    /// - a Manual marker immediately undone by Automatic leaves nothing.
    pub fn on_flush_mode_changed(&mut self, mode: FlushMode) {
        if mode == FlushMode::Automatic {
            match self.pending.back() {
                Some(PendingEntry::FlushMarker) => {
                    self.pending.pop_back();
                    self.pending
                        .push_back(PendingEntry::FlushModeChange { mode });
                    return;
                }
                Some(PendingEntry::FlushModeChange {
                    mode: FlushMode::Manual,
                }) => {
                    self.pending.pop_back();
                    return;
                }
                _ => {}
            }
        }
        self.pending
            .push_back(PendingEntry::FlushModeChange { mode });
    }

    /// Record an explicit manual flush.
    ///
    /// Meaningless in automatic mode, and meaningless unless at least one op
    /// was submitted since the last boundary; both cases are no-ops.
    pub fn on_flush(&mut self, active_mode: FlushMode) {
        if active_mode == FlushMode::Automatic {
            return;
        }
        if !matches!(self.pending.back(), Some(PendingEntry::Message(_))) {
            return;
        }
        self.pending.push_back(PendingEntry::FlushMarker);
    }

    /// Process one sequenced message from the delta stream.
    ///
    /// Data-corruption failures close the runtime before the error returns;
    /// rebase failures (rehydration path) are returned for the caller to
    /// close on.
    pub fn process_ack<R: OpRuntime>(
        &mut self,
        ack: &SequencedMessage,
        is_local: bool,
        runtime: &mut R,
        rebaser: &mut dyn Rebaser,
    ) -> Result<AckClaim, PendingError> {
        // Fragments are reassembled by the transport; the whole op acks later.
        if ack.kind == MessageKind::ChunkedOp {
            return Ok(AckClaim::Foreign);
        }
        if is_local {
            self.process_local_ack(ack, runtime)
        } else {
            self.process_remote_ack(ack, rebaser)
        }
    }

    fn process_local_ack<R: OpRuntime>(
        &mut self,
        ack: &SequencedMessage,
        runtime: &mut R,
    ) -> Result<AckClaim, PendingError> {
        match self.local_ack_inner(ack) {
            Ok(claim) => Ok(claim),
            Err(err) => {
                error!(%err, sequence_number = %ack.sequence_number, "pending queue diverged from ack stream");
                runtime.close(err.clone());
                Err(err)
            }
        }
    }

    fn local_ack_inner(&mut self, ack: &SequencedMessage) -> Result<AckClaim, PendingError> {
        self.maybe_enter_batch(ack)?;

        let message = match self.pending.pop_front() {
            Some(PendingEntry::Message(message)) => message,
            _ => {
                return Err(PendingError::AckWithoutMessage {
                    sequence_number: ack.sequence_number,
                });
            }
        };

        if message.client_seq != ack.client_seq {
            return Err(PendingError::CsnMismatch {
                client_id: ack.client_id.clone(),
                sequence_number: ack.sequence_number,
                client_sequence_number: ack.client_seq,
                expected_client_sequence_number: message.client_seq,
            });
        }

        self.note_message_dequeued();

        if self.batch.is_open() {
            self.maybe_finish_batch(ack)?;
        }

        Ok(AckClaim::Local {
            local_metadata: message.local_metadata,
        })
    }

    /// A FlushMarker or Manual flush-mode marker at the head means this ack
    /// opens a batch; the marker is consumed.
    fn maybe_enter_batch(&mut self, ack: &SequencedMessage) -> Result<(), PendingError> {
        match self.pending.front() {
            Some(PendingEntry::FlushMarker) => {}
            Some(PendingEntry::FlushModeChange { mode }) => {
                if *mode != FlushMode::Manual {
                    return Err(PendingError::MisplacedFlushMode {
                        mode: "automatic",
                        sequence_number: ack.sequence_number,
                    });
                }
            }
            _ => return Ok(()),
        }
        self.batch.enter(ack.clone())?;
        self.pending.pop_front();
        Ok(())
    }

    /// After a message dequeues inside a batch, a boundary at the new head
    /// ends the batch: an Automatic flush-mode marker is consumed, a
    /// FlushMarker stays put (it opens the next batch). Anything else means
    /// the batch continues.
    fn maybe_finish_batch(&mut self, ack: &SequencedMessage) -> Result<(), PendingError> {
        match self.pending.front() {
            Some(PendingEntry::FlushModeChange { mode }) => {
                if *mode != FlushMode::Automatic {
                    return Err(PendingError::MisplacedFlushMode {
                        mode: "manual",
                        sequence_number: ack.sequence_number,
                    });
                }
                self.pending.pop_front();
            }
            Some(PendingEntry::FlushMarker) => {}
            _ => return Ok(()),
        }
        self.batch.finish(ack)
    }

    fn process_remote_ack(
        &mut self,
        ack: &SequencedMessage,
        rebaser: &mut dyn Rebaser,
    ) -> Result<AckClaim, PendingError> {
        self.drain_initial_upto(ack.sequence_number, rebaser)?;

        let claimable = match (&self.initial_client_id, self.initial_leading_csn) {
            (Some(prior), Some(leading)) => {
                ack.client_id.as_ref() == Some(prior) && ack.client_seq >= leading
            }
            _ => false,
        };
        if !claimable {
            return Ok(AckClaim::Foreign);
        }

        // Framing entries from the prior session carried session-local
        // meaning only; discard them on the way to the acked message.
        while let Some(entry) = self.pending.pop_front() {
            if let PendingEntry::Message(message) = entry {
                self.note_message_dequeued();
                return Ok(AckClaim::Local {
                    local_metadata: message.local_metadata,
                });
            }
        }
        Ok(AckClaim::Foreign)
    }

    /// Rebase and promote rehydrated entries whose reference point the
    /// stream has reached.
    fn drain_initial_upto(
        &mut self,
        seen: SeqNum,
        rebaser: &mut dyn Rebaser,
    ) -> Result<(), PendingError> {
        loop {
            let Some(head) = self.initial.front() else {
                break;
            };
            if let PendingEntry::Message(message) = head {
                if message.ref_seq > seen {
                    break;
                }
                if Some(message.client_seq) == self.initial_leading_csn && seen > message.ref_seq {
                    // The prior session saw later ops than the snapshot this
                    // session rebased onto; its pending ops were computed
                    // against a baseline we no longer have.
                    return Err(PendingError::RebaseTooOld {
                        ref_seq: message.ref_seq,
                        sequence_number: seen,
                    });
                }
                rebaser.rebase(&message.content, message.local_metadata.as_ref())?;
            }
            if let Some(entry) = self.initial.pop_front() {
                if entry.is_message() {
                    self.pending_message_count += 1;
                }
                self.pending.push_back(entry);
            }
        }
        Ok(())
    }

    /// Re-send everything outstanding on a fresh connection.
    ///
    /// Rehydrated entries not yet promoted by remote acks are rebased first,
    /// then every queued entry replays against the runtime in submission
    /// order; messages re-enter the queue under the sequence numbers the
    /// runtime assigns them. Returns the number of messages resubmitted.
    ///
    /// Replay under a client id this instance already replayed for is
    /// refused (it would duplicate ops on the wire); the refusal surfaces as
    /// a telemetry warning because a spurious connect event can trip it.
    pub fn replay_on_reconnect<R: OpRuntime>(
        &mut self,
        runtime: &mut R,
        rebaser: &mut dyn Rebaser,
    ) -> Result<usize, PendingError> {
        if !runtime.connected() {
            warn!("reconnect replay requested while disconnected");
            return Ok(0);
        }
        let client_id = runtime.client_id();
        if client_id.is_some() && client_id == self.session_client_id {
            warn!(
                client_id = self.session_client_id.as_ref().map(ClientId::as_str),
                "reconnect replay skipped: client id unchanged since last replay"
            );
            return Ok(0);
        }
        self.session_client_id = client_id;

        while let Some(entry) = self.initial.pop_front() {
            if let PendingEntry::Message(message) = &entry {
                rebaser.rebase(&message.content, message.local_metadata.as_ref())?;
                self.pending_message_count += 1;
            }
            self.pending.push_back(entry);
        }

        // Resubmissions push fresh entries behind this cursor; touching only
        // the first `n` keeps the replay bounded.
        let n = self.pending.len();
        self.pending_message_count = 0;
        self.depth_warned = false;
        let saved_mode = runtime.flush_mode();
        let mut resubmitted = 0usize;

        for _ in 0..n {
            let Some(entry) = self.pending.pop_front() else {
                break;
            };
            match entry {
                PendingEntry::Message(message) => {
                    let submission = runtime.resubmit(
                        message.kind,
                        &message.content,
                        message.local_metadata.as_ref(),
                        message.op_metadata.as_ref(),
                    );
                    self.on_submit(
                        message.kind,
                        submission.client_seq,
                        submission.ref_seq,
                        message.content,
                        message.local_metadata,
                        message.op_metadata,
                    );
                    resubmitted += 1;
                }
                PendingEntry::FlushModeChange { mode } => {
                    self.drive_flush_mode(runtime, mode);
                }
                PendingEntry::FlushMarker => {
                    runtime.flush();
                    self.on_flush(runtime.flush_mode());
                }
            }
        }

        self.drive_flush_mode(runtime, saved_mode);
        info!(
            client_id = self.session_client_id.as_ref().map(ClientId::as_str),
            entries = n,
            resubmitted,
            "replayed pending ops onto new session"
        );
        Ok(resubmitted)
    }

    /// Set the runtime's flush mode and re-record the transition, skipping
    /// both when the mode is already current (the runtime notifies on actual
    /// changes only).
    fn drive_flush_mode<R: OpRuntime>(&mut self, runtime: &mut R, mode: FlushMode) {
        if runtime.flush_mode() == mode {
            return;
        }
        runtime.set_flush_mode(mode);
        self.on_flush_mode_changed(mode);
    }

    /// Export outstanding work for a process handoff. `None` when no
    /// messages are outstanding.
    pub fn save(&self) -> Option<SavedPendingState> {
        if self.pending_message_count == 0 {
            return None;
        }
        Some(SavedPendingState {
            version: SAVED_STATE_VERSION,
            client_id: self.session_client_id.clone(),
            entries: self.pending.iter().cloned().collect(),
        })
    }

    fn note_message_dequeued(&mut self) {
        self.pending_message_count -= 1;
        if self.pending_message_count == 0 {
            self.depth_warned = false;
        }
    }
}
