//! Runtime safety limits (normative defaults).

use serde::{Deserialize, Serialize};

/// Limits are normative defaults; hosts override them through configuration.
///
/// Values are intentionally explicit about what they bound.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Pending-message depth at which a telemetry warning is emitted once.
    pub pending_depth_warn: usize,
    /// Maximum entries accepted when decoding a saved pending-state blob.
    pub max_saved_entries: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            pending_depth_warn: 1_000,
            max_saved_entries: 100_000,
        }
    }
}
