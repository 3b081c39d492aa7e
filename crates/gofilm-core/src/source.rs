//! Source URL parsing and media-kind detection

use crate::{Error, MediaKind, Result};
use serde::Serialize;
use url::Url;

/// Path suffixes that mark a segmented manifest
const SEGMENTED_SUFFIXES: &[&str] = &[".m3u8", ".m3u"];

/// A validated media source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaSource {
    url: Url,
    kind: MediaKind,
}

impl MediaSource {
    /// Parse a source URL, rejecting empty or malformed input
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::EmptySource);
        }

        let url = Url::parse(trimmed).map_err(|source| Error::InvalidSource {
            url: trimmed.to_string(),
            source,
        })?;
        let kind = detect_media_kind(&url);

        Ok(Self { url, kind })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

impl std::fmt::Display for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Detect the media kind from the URL path suffix.
///
/// Query strings and fragments do not take part; the match is case-insensitive.
pub fn detect_media_kind(url: &Url) -> MediaKind {
    let path = url.path().to_lowercase();
    if SEGMENTED_SUFFIXES.iter().any(|suffix| path.ends_with(suffix)) {
        MediaKind::SegmentedManifest
    } else {
        MediaKind::DirectFile
    }
}

/// Validate a link typed into the custom player page.
///
/// Only `http(s)` links to an `.m3u8` manifest or an `.mp4` file are accepted.
pub fn validate_playable_link(raw: &str) -> Result<MediaSource> {
    let source = MediaSource::parse(raw)?;

    let scheme_ok = matches!(source.url.scheme(), "http" | "https");
    let path = source.url.path().to_lowercase();
    let suffix_ok = path.ends_with(".m3u8") || path.ends_with(".mp4");

    if scheme_ok && suffix_ok {
        Ok(source)
    } else {
        Err(Error::UnsupportedLink(raw.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_segmented() {
        let url = Url::parse("https://example.com/vod/index.m3u8").unwrap();
        assert_eq!(detect_media_kind(&url), MediaKind::SegmentedManifest);

        let url = Url::parse("https://example.com/vod/INDEX.M3U8?token=abc#t=10").unwrap();
        assert_eq!(detect_media_kind(&url), MediaKind::SegmentedManifest);
    }

    #[test]
    fn test_detect_direct() {
        let url = Url::parse("https://example.com/movie.mp4").unwrap();
        assert_eq!(detect_media_kind(&url), MediaKind::DirectFile);

        // Suffix only counts on the path
        let url = Url::parse("https://example.com/movie.mp4?next=a.m3u8").unwrap();
        assert_eq!(detect_media_kind(&url), MediaKind::DirectFile);
    }

    #[test]
    fn test_parse_rejects_empty_and_malformed() {
        assert!(matches!(MediaSource::parse(""), Err(Error::EmptySource)));
        assert!(matches!(MediaSource::parse("   "), Err(Error::EmptySource)));
        assert!(matches!(
            MediaSource::parse("not a url"),
            Err(Error::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let source = MediaSource::parse("  https://x/a.m3u8 ").unwrap();
        assert_eq!(source.as_str(), "https://x/a.m3u8");
        assert_eq!(source.kind(), MediaKind::SegmentedManifest);
    }

    #[test]
    fn test_playable_link_validation() {
        assert!(validate_playable_link("https://cdn.example.com/a/index.m3u8").is_ok());
        assert!(validate_playable_link("http://cdn.example.com/film.mp4").is_ok());
        assert!(matches!(
            validate_playable_link("ftp://cdn.example.com/film.mp4"),
            Err(Error::UnsupportedLink(_))
        ));
        assert!(matches!(
            validate_playable_link("https://cdn.example.com/film.mkv"),
            Err(Error::UnsupportedLink(_))
        ));
    }
}
