//! Recording state management
//!
//! Defines the session state machine and the policy reasons a capture is
//! not started.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one recording session
///
/// `Pending` moves to `Active` when the capture process spawns. The three
/// terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Created, no process yet
    Pending,
    /// Capture process running
    Active,
    /// Process exited successfully
    Completed,
    /// Process exited with an error or could not be started
    Failed,
    /// Process was killed on request
    Aborted,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Why a session did not start a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// Empty artist, the player's marker for sponsored content
    Advertisement,
    /// Reported length under one second
    TooShort,
    /// Same filename is already being recorded
    DuplicateActive,
    /// Output file is already on disk
    ExistingFile,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::Advertisement => "this is an advertisement, will not record",
            SkipReason::TooShort => "reported length is too short, not starting to record",
            SkipReason::DuplicateActive => "already being recorded right now, not starting again",
            SkipReason::ExistingFile => "already exists, not overwriting",
        };
        f.write_str(text)
    }
}

/// Result of `RecordingSession::start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    Skipped(SkipReason),
    /// The capture command could not be spawned
    SpawnFailed,
}
