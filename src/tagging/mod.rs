//! Tagging of finished recordings
//!
//! A tagging failure never removes a recording: the audio stays on disk,
//! untagged or without cover art, and the reason is reported back.

mod id3_tagger;

#[cfg(test)]
pub(crate) mod testing;

pub use id3_tagger::Id3Tagger;

use crate::notification::TrackMetadata;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Non-fatal reasons a recording ended up without (some) tags
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagFailure {
    #[error("failed to read existing tag: {0}")]
    Read(String),

    #[error("failed to write tag: {0}")]
    Write(String),

    #[error("cover art download failed: {0}")]
    CoverFetch(String),

    #[error("cover art server responded with status {0}")]
    CoverStatus(u16),
}

/// Result of tagging one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    /// All tags written, cover art included when one was available
    Tagged,
    /// Text tags written, cover art could not be embedded
    TaggedWithoutCover(TagFailure),
    /// Nothing written
    Untagged(TagFailure),
}

impl TagOutcome {
    pub fn failure(&self) -> Option<&TagFailure> {
        match self {
            TagOutcome::Tagged => None,
            TagOutcome::TaggedWithoutCover(failure) | TagOutcome::Untagged(failure) => Some(failure),
        }
    }
}

/// Writes track metadata into a finished recording
#[async_trait]
pub trait Tagger: Send + Sync {
    async fn tag(&self, path: &Path, metadata: &TrackMetadata) -> TagOutcome;
}
