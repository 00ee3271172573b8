//! Notification types
//!
//! Normalized playback notifications and the MPRIS `PropertiesChanged`
//! payload they are decoded from.

use serde::{Deserialize, Serialize};

/// Playback status reported by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
}

impl PlaybackStatus {
    /// Whether this status ends any running capture
    pub fn is_halted(&self) -> bool {
        matches!(self, PlaybackStatus::Paused | PlaybackStatus::Stopped)
    }
}

/// Normalized view of one notification's track information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
    /// First listed artist. Empty marks an advertisement.
    pub artist: String,
    pub album: String,
    pub title: String,
    pub track_number: u32,
    pub disc_number: u32,
    /// Track length in seconds
    pub length_seconds: f64,
    pub art_url: Option<String>,
}

impl TrackMetadata {
    /// Convert a track length reported in microseconds
    pub fn seconds_from_micros(micros: u64) -> f64 {
        micros as f64 * 1e-6
    }
}

/// One playback notification as seen by the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub status: PlaybackStatus,
    pub metadata: Option<TrackMetadata>,
}

/// Artist field: MPRIS sends a list, some bridges flatten it to a string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ArtistField {
    Many(Vec<String>),
    One(String),
}

impl ArtistField {
    fn first(self) -> String {
        match self {
            ArtistField::Many(names) => names.into_iter().next().unwrap_or_default(),
            ArtistField::One(name) => name,
        }
    }
}

/// `Metadata` dictionary as delivered on the wire
#[derive(Debug, Clone, Deserialize)]
struct RawMetadata {
    #[serde(rename = "xesam:artist")]
    artist: Option<ArtistField>,
    #[serde(rename = "xesam:album", default)]
    album: String,
    #[serde(rename = "xesam:title", default)]
    title: String,
    #[serde(rename = "xesam:trackNumber", default)]
    track_number: u32,
    #[serde(rename = "xesam:discNumber", default)]
    disc_number: u32,
    #[serde(rename = "mpris:length", default)]
    length: u64,
    #[serde(rename = "mpris:artUrl")]
    art_url: Option<String>,
}

impl From<RawMetadata> for TrackMetadata {
    fn from(raw: RawMetadata) -> Self {
        Self {
            artist: raw.artist.map(ArtistField::first).unwrap_or_default(),
            album: raw.album,
            title: raw.title,
            track_number: raw.track_number,
            disc_number: raw.disc_number,
            length_seconds: TrackMetadata::seconds_from_micros(raw.length),
            art_url: raw.art_url.filter(|url| !url.is_empty()),
        }
    }
}

/// Changed properties of `org.mpris.MediaPlayer2.Player`
#[derive(Debug, Clone, Deserialize)]
pub struct PropertiesChanged {
    #[serde(rename = "PlaybackStatus")]
    playback_status: Option<PlaybackStatus>,
    #[serde(rename = "Metadata")]
    metadata: Option<RawMetadata>,
}

impl PropertiesChanged {
    /// Normalize into a notification.
    ///
    /// Returns `None` when the payload carries neither a status nor metadata.
    /// A metadata change without a status is a track change while playing.
    pub fn into_notification(self) -> Option<Notification> {
        match (self.playback_status, self.metadata) {
            (None, None) => None,
            (status, metadata) => Some(Notification {
                status: status.unwrap_or(PlaybackStatus::Playing),
                metadata: metadata.map(TrackMetadata::from),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> Option<Notification> {
        serde_json::from_str::<PropertiesChanged>(json)
            .unwrap()
            .into_notification()
    }

    #[test]
    fn test_decode_playing_with_metadata() {
        let n = decode(
            r#"{"PlaybackStatus":"Playing","Metadata":{
                "xesam:artist":["Daft Punk","Romanthony"],
                "xesam:album":"Discovery",
                "xesam:title":"One More Time",
                "xesam:trackNumber":1,
                "xesam:discNumber":1,
                "mpris:length":320000000,
                "mpris:artUrl":"https://i.scdn.co/image/ab67616d0000b273"}}"#,
        )
        .unwrap();

        assert_eq!(n.status, PlaybackStatus::Playing);
        let m = n.metadata.unwrap();
        assert_eq!(m.artist, "Daft Punk");
        assert_eq!(m.track_number, 1);
        assert!((m.length_seconds - 320.0).abs() < 1e-9);
        assert!(m.art_url.is_some());
    }

    #[test]
    fn test_empty_artist_list_is_advert_shape() {
        let n = decode(r#"{"Metadata":{"xesam:artist":[""],"xesam:title":"Ad","mpris:length":30000000}}"#)
            .unwrap();
        assert_eq!(n.status, PlaybackStatus::Playing);
        assert_eq!(n.metadata.unwrap().artist, "");

        let n = decode(r#"{"Metadata":{"xesam:artist":[],"mpris:length":30000000}}"#).unwrap();
        assert_eq!(n.metadata.unwrap().artist, "");
    }

    #[test]
    fn test_status_only() {
        let n = decode(r#"{"PlaybackStatus":"Paused"}"#).unwrap();
        assert!(n.status.is_halted());
        assert!(n.metadata.is_none());
    }

    #[test]
    fn test_unrelated_properties_are_ignored() {
        assert!(decode(r#"{"Volume":0.5}"#).is_none());
    }
}
