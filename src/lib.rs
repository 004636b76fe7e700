#![forbid(unsafe_code)]

pub mod core;
pub mod error;
pub mod pending;
pub mod runtime;
pub mod telemetry;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

// Re-export core types at crate root for convenience
pub use crate::core::{
    ClientId, ClientSeq, CoreError, InvalidId, Limits, MessageKind, MessageMetadata, SeqNum,
    SequencedMessage,
};
pub use crate::pending::{
    AckClaim, FlushMode, PendingEntry, PendingError, PendingMessage, PendingOps,
    SavedPendingState, SavedStateError, SAVED_STATE_VERSION,
};
pub use crate::runtime::{OpRuntime, RebaseError, Rebaser, Submission};
