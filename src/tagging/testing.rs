//! Tagger double that records which files it was asked to tag

use super::{TagOutcome, Tagger};
use crate::notification::TrackMetadata;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

#[derive(Default)]
pub struct RecordingTagger {
    tagged: Mutex<Vec<PathBuf>>,
}

impl RecordingTagger {
    pub fn tagged(&self) -> Vec<PathBuf> {
        self.tagged.lock().clone()
    }
}

#[async_trait]
impl Tagger for RecordingTagger {
    async fn tag(&self, path: &Path, _metadata: &TrackMetadata) -> TagOutcome {
        self.tagged.lock().push(path.to_path_buf());
        TagOutcome::Tagged
    }
}
