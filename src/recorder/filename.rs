//! Filename derivation for recordings
//!
//! Names come from a pattern with `@placeholder` tokens filled from track
//! metadata, then characters that common filesystems reject are swapped for
//! look-alikes.

use crate::notification::TrackMetadata;
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Reserved characters and their visually similar replacements
const SUBSTITUTIONS: [(char, char); 7] = [
    ('/', '／'),
    ('\\', '＼'),
    ('*', '＊'),
    ('?', '﹖'),
    ('<', '‹'),
    ('>', '›'),
    (':', '：'),
];

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"(?i)@([a-z]+)").expect("placeholder pattern is valid"))
}

fn field(metadata: &TrackMetadata, name: &str) -> Option<String> {
    let value = match name.to_ascii_lowercase().as_str() {
        "artist" => metadata.artist.clone(),
        "album" => metadata.album.clone(),
        "title" => metadata.title.clone(),
        "tracknumber" => metadata.track_number.to_string(),
        "discnumber" => metadata.disc_number.to_string(),
        _ => return None,
    };
    Some(value)
}

/// Fill `pattern` from `metadata`. Unknown placeholders are kept verbatim.
pub fn format_filename(metadata: &TrackMetadata, pattern: &str) -> String {
    placeholder_regex()
        .replace_all(pattern, |caps: &Captures| {
            field(metadata, &caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Replace every reserved character with its look-alike
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            SUBSTITUTIONS
                .iter()
                .find(|(reserved, _)| *reserved == c)
                .map(|(_, replacement)| *replacement)
                .unwrap_or(c)
        })
        .collect()
}
