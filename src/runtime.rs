//! Container-runtime capability surface.
//!
//! The pending-op core never owns the runtime; hosts pass this narrow trait
//! by mutable reference into the operations that need it.

use serde_json::Value;
use thiserror::Error;

use crate::core::{ClientId, ClientSeq, MessageKind, SeqNum};
use crate::pending::{FlushMode, PendingError};

/// Sequence numbers the runtime assigns when an op (re)enters the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Submission {
    pub client_seq: ClientSeq,
    pub ref_seq: SeqNum,
}

/// The slice of the container runtime the pending-op core drives.
pub trait OpRuntime {
    fn connected(&self) -> bool;

    /// Client id of the current connection, if any.
    fn client_id(&self) -> Option<ClientId>;

    fn flush_mode(&self) -> FlushMode;

    fn set_flush_mode(&mut self, mode: FlushMode);

    /// Push accumulated manual-mode ops to the transport.
    fn flush(&mut self);

    /// Hand an op back to the transport path as if newly submitted.
    ///
    /// Returns the freshly assigned sequence numbers so the caller can track
    /// the op under its new identity.
    fn resubmit(
        &mut self,
        kind: MessageKind,
        content: &Value,
        local_metadata: Option<&Value>,
        op_metadata: Option<&Value>,
    ) -> Submission;

    /// Tear the container down with a fatal error.
    fn close(&mut self, error: PendingError);
}

/// Re-applies an op to the owning DDS's local state without transmitting it.
///
/// Injected by the container runtime; must be side-effect-free beyond
/// updating the target DDS. Synchronous from the core's point of view.
pub trait Rebaser {
    fn rebase(
        &mut self,
        content: &Value,
        local_metadata: Option<&Value>,
    ) -> Result<(), RebaseError>;
}

/// Failure from the injected rebase adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("rebase of {target} op failed: {reason}")]
pub struct RebaseError {
    /// Which DDS (or routing path) refused the op.
    pub target: String,
    pub reason: String,
}
