use thiserror::Error;

use crate::core::CoreError;
use crate::pending::{PendingError, SavedStateError};

/// Crate-level convenience error.
///
/// Not a "god error": it is a thin wrapper over the capability errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Pending(#[from] PendingError),

    #[error(transparent)]
    SavedState(#[from] SavedStateError),
}
