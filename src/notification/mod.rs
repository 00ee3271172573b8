//! Playback notifications
//!
//! Types describing what the media player announces, plus the reader that
//! turns a stream of MPRIS payloads into notifications.

pub mod source;
pub mod types;

pub use source::{decode_line, spawn_line_reader, spawn_stdin_source};
pub use types::{Notification, PlaybackStatus, PropertiesChanged, TrackMetadata};
