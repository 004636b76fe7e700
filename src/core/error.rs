//! Core capability errors (identity parsing and validation).
//!
//! Bounded and stable: these represent domain/refusal states, not library
//! implementation details.

use thiserror::Error;

/// Invalid identifier.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum InvalidId {
    #[error("client id `{raw}` is invalid: {reason}")]
    Client { raw: String, reason: String },
}

/// Canonical error enum for the core capability.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum CoreError {
    #[error(transparent)]
    InvalidId(#[from] InvalidId),
}
