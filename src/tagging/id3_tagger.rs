//! ID3 tagger with cover art download

use super::{TagFailure, TagOutcome, Tagger};
use crate::notification::TrackMetadata;
use crate::utils::{AppError, AppResult};
use async_trait::async_trait;
use id3::frame::{Picture, PictureType};
use id3::{ErrorKind, Tag, TagLike, Version};
use std::path::{Path, PathBuf};
use std::time::Duration;

const COVER_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_COVER_MIME: &str = "image/jpeg";

/// Downloaded cover image
#[derive(Debug, Clone)]
struct CoverArt {
    mime_type: String,
    data: Vec<u8>,
}

/// Writes ID3v2.4 tags, embedding cover art when a user agent is configured
pub struct Id3Tagger {
    http_client: Option<reqwest::Client>,
}

impl Id3Tagger {
    /// Create a tagger. Without a user agent no cover art is downloaded.
    pub fn new(user_agent: Option<&str>) -> AppResult<Self> {
        let http_client = match user_agent {
            Some(user_agent) => Some(
                reqwest::Client::builder()
                    .user_agent(user_agent)
                    .timeout(COVER_TIMEOUT)
                    .build()
                    .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?,
            ),
            None => None,
        };
        Ok(Self { http_client })
    }

    async fn fetch_cover(client: &reqwest::Client, url: &str) -> Result<CoverArt, TagFailure> {
        // Players such as VLC announce local artwork
        if let Ok(parsed) = reqwest::Url::parse(url) {
            if parsed.scheme() == "file" {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| TagFailure::CoverFetch(format!("invalid file URL {}", url)))?;
                let data = tokio::fs::read(&path)
                    .await
                    .map_err(|e| TagFailure::CoverFetch(e.to_string()))?;
                return Ok(CoverArt {
                    mime_type: mime_from_extension(&path).to_string(),
                    data,
                });
            }
        }

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| TagFailure::CoverFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TagFailure::CoverStatus(status.as_u16()));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_COVER_MIME)
            .to_string();

        let data = response
            .bytes()
            .await
            .map_err(|e| TagFailure::CoverFetch(e.to_string()))?
            .to_vec();

        Ok(CoverArt { mime_type, data })
    }
}

#[async_trait]
impl Tagger for Id3Tagger {
    async fn tag(&self, path: &Path, metadata: &TrackMetadata) -> TagOutcome {
        let cover = match (&self.http_client, &metadata.art_url) {
            (Some(client), Some(url)) => Some(Self::fetch_cover(client, url).await),
            _ => None,
        };
        let (cover, cover_failure) = match cover {
            Some(Ok(cover)) => (Some(cover), None),
            Some(Err(failure)) => (None, Some(failure)),
            None => (None, None),
        };

        let path: PathBuf = path.to_path_buf();
        let metadata = metadata.clone();
        let written =
            tokio::task::spawn_blocking(move || write_tags(&path, &metadata, cover)).await;

        match written {
            Ok(Ok(())) => match cover_failure {
                None => TagOutcome::Tagged,
                Some(failure) => TagOutcome::TaggedWithoutCover(failure),
            },
            Ok(Err(failure)) => TagOutcome::Untagged(failure),
            Err(e) => TagOutcome::Untagged(TagFailure::Write(format!("tagging task failed: {}", e))),
        }
    }
}

fn mime_from_extension(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        _ => DEFAULT_COVER_MIME,
    }
}

fn write_tags(path: &Path, metadata: &TrackMetadata, cover: Option<CoverArt>) -> Result<(), TagFailure> {
    let mut tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(e) if matches!(e.kind, ErrorKind::NoTag) => Tag::new(),
        Err(e) => return Err(TagFailure::Read(e.to_string())),
    };

    tag.set_artist(metadata.artist.as_str());
    tag.set_album(metadata.album.as_str());
    tag.set_title(metadata.title.as_str());
    if metadata.track_number > 0 {
        tag.set_track(metadata.track_number);
    }
    if metadata.disc_number > 0 {
        tag.set_disc(metadata.disc_number);
    }

    if let Some(cover) = cover {
        tag.remove_picture_by_type(PictureType::CoverFront);
        tag.add_frame(Picture {
            mime_type: cover.mime_type,
            picture_type: PictureType::CoverFront,
            description: "Cover".to_string(),
            data: cover.data,
        });
    }

    tag.write_to_path(path, Version::Id3v24)
        .map_err(|e| TagFailure::Write(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn metadata() -> TrackMetadata {
        TrackMetadata {
            artist: "Röyksopp".to_string(),
            album: "Melody A.M.".to_string(),
            title: "Eple".to_string(),
            track_number: 3,
            disc_number: 1,
            length_seconds: 220.0,
            art_url: None,
        }
    }

    fn audio_file(dir: &Path) -> PathBuf {
        let path = dir.join("track.mp3");
        std::fs::write(&path, vec![0u8; 512]).unwrap();
        path
    }

    #[tokio::test]
    async fn test_tags_written() {
        let dir = tempdir().unwrap();
        let path = audio_file(dir.path());

        let tagger = Id3Tagger::new(None).unwrap();
        assert_eq!(tagger.tag(&path, &metadata()).await, TagOutcome::Tagged);

        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.artist(), Some("Röyksopp"));
        assert_eq!(tag.album(), Some("Melody A.M."));
        assert_eq!(tag.title(), Some("Eple"));
        assert_eq!(tag.track(), Some(3));
    }

    #[tokio::test]
    async fn test_missing_file_is_untagged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.mp3");

        let tagger = Id3Tagger::new(None).unwrap();
        let outcome = tagger.tag(&path, &metadata()).await;
        assert!(matches!(outcome, TagOutcome::Untagged(TagFailure::Read(_))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_local_cover_embedded() {
        let dir = tempdir().unwrap();
        let path = audio_file(dir.path());
        let cover = dir.path().join("cover.png");
        std::fs::write(&cover, b"\x89PNG fake image").unwrap();

        let mut m = metadata();
        m.art_url = Some(reqwest::Url::from_file_path(&cover).unwrap().to_string());

        let tagger = Id3Tagger::new(Some("drainify-test")).unwrap();
        assert_eq!(tagger.tag(&path, &m).await, TagOutcome::Tagged);

        let tag = Tag::read_from_path(&path).unwrap();
        let picture = tag.pictures().next().unwrap();
        assert_eq!(picture.mime_type, "image/png");
        assert_eq!(picture.picture_type, PictureType::CoverFront);
    }

    #[tokio::test]
    async fn test_missing_cover_keeps_text_tags() {
        let dir = tempdir().unwrap();
        let path = audio_file(dir.path());

        let mut m = metadata();
        m.art_url = Some(
            reqwest::Url::from_file_path(dir.path().join("nope.jpg"))
                .unwrap()
                .to_string(),
        );

        let tagger = Id3Tagger::new(Some("drainify-test")).unwrap();
        let outcome = tagger.tag(&path, &m).await;
        assert!(matches!(
            outcome,
            TagOutcome::TaggedWithoutCover(TagFailure::CoverFetch(_))
        ));
        assert_eq!(Tag::read_from_path(&path).unwrap().title(), Some("Eple"));
    }

    #[tokio::test]
    async fn test_no_cover_without_user_agent() {
        let dir = tempdir().unwrap();
        let path = audio_file(dir.path());

        let mut m = metadata();
        m.art_url = Some("https://example.invalid/cover.jpg".to_string());

        let tagger = Id3Tagger::new(None).unwrap();
        assert_eq!(tagger.tag(&path, &m).await, TagOutcome::Tagged);
        assert_eq!(Tag::read_from_path(&path).unwrap().pictures().count(), 0);
    }
}
