//! Core types shared across the pending-op runtime: identity atoms,
//! sequence numbers, sequenced messages, and limits.

mod error;
mod identity;
mod limits;
mod message;
mod seq;

pub use error::{CoreError, InvalidId};
pub use identity::ClientId;
pub use limits::Limits;
pub use message::{MessageKind, MessageMetadata, SequencedMessage};
pub use seq::{ClientSeq, SeqNum};
