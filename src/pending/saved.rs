//! Serialized pending state for process handoff.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{ClientId, Limits};

use super::entry::PendingEntry;

/// Current version of the saved-state shape.
pub const SAVED_STATE_VERSION: u32 = 1;

/// Pending entries exported by one session and rehydrated by the next.
///
/// The host stores and transports the encoded blob but never inspects it.
/// The core accepts any blob it produced; unknown entry tags and unsupported
/// versions refuse to rehydrate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedPendingState {
    pub version: u32,
    /// Client id of the session that exported this state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    pub entries: Vec<PendingEntry>,
}

#[derive(Debug, Error)]
pub enum SavedStateError {
    #[error("saved pending state version {version} is unsupported (expected {expected})")]
    UnsupportedVersion { version: u32, expected: u32 },

    #[error("saved pending state decode limit exceeded: {entries} entries (max {max})")]
    TooManyEntries { entries: usize, max: usize },

    #[error("saved pending state is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl SavedPendingState {
    pub fn to_json_vec(&self) -> Result<Vec<u8>, SavedStateError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_slice(bytes: &[u8], limits: &Limits) -> Result<Self, SavedStateError> {
        let state: SavedPendingState = serde_json::from_slice(bytes)?;
        if state.version != SAVED_STATE_VERSION {
            return Err(SavedStateError::UnsupportedVersion {
                version: state.version,
                expected: SAVED_STATE_VERSION,
            });
        }
        if state.entries.len() > limits.max_saved_entries {
            return Err(SavedStateError::TooManyEntries {
                entries: state.entries.len(),
                max: limits.max_saved_entries,
            });
        }
        Ok(state)
    }
}
