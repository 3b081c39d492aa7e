//! Core types for GoFilm playback

use serde::{Deserialize, Serialize};

/// Identifies one attach-to-detach lifetime of an engine stack.
///
/// Engine callbacks carry the generation they were created under; the
/// controller drops anything that does not match its live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation that follows this one
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a source is handed to the player engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// A progressive file (mp4, webm, ...) set directly on the media element
    DirectFile,
    /// A segmented manifest (HLS) fed through the adaptive-stream engine
    SegmentedManifest,
}

impl MediaKind {
    /// MIME type announced to players that need one
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaKind::DirectFile => "video/mp4",
            MediaKind::SegmentedManifest => "application/x-mpegURL",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::DirectFile => write!(f, "direct file"),
            MediaKind::SegmentedManifest => write!(f, "segmented manifest"),
        }
    }
}

/// Playback session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Engine stack built, waiting for media to start
    Initializing,
    /// Media is playing
    Playing,
    /// Playback paused
    Paused,
    /// Reached the end of the source
    Ended,
    /// Fatal failure; only a new generation leaves this state
    Errored,
}

impl PlaybackState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlaybackState) -> bool {
        use PlaybackState::*;
        matches!(
            (self, target),
            // From Initializing
            (Initializing, Playing) | (Initializing, Paused) | (Initializing, Ended) | (Initializing, Errored) |
            // From Playing
            (Playing, Paused) | (Playing, Ended) | (Playing, Errored) |
            // From Paused
            (Paused, Playing) | (Paused, Ended) | (Paused, Errored) |
            // From Ended (replay after reaching the end)
            (Ended, Playing) | (Ended, Paused) | (Ended, Errored)
        )
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Initializing => write!(f, "initializing"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Ended => write!(f, "ended"),
            PlaybackState::Errored => write!(f, "errored"),
        }
    }
}

/// Inline or floating miniature presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationMode {
    #[default]
    Inline,
    Mini,
}

/// Most recent progress sample
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Current position in seconds
    pub current_time: f64,
    /// Duration in seconds (NaN or infinite for unknown/live)
    pub duration: f64,
}

impl Progress {
    pub fn new(current_time: f64, duration: f64) -> Self {
        Self {
            current_time,
            duration,
        }
    }

    /// Fraction watched in `0.0..=1.0`, if the duration is known
    pub fn fraction(&self) -> Option<f64> {
        if self.duration.is_finite() && self.duration > 0.0 {
            Some((self.current_time / self.duration).clamp(0.0, 1.0))
        } else {
            None
        }
    }
}

/// Options supplied with a source on attach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachOptions {
    /// Poster image shown before playback
    pub poster_url: Option<String>,
    /// Start playing as soon as media allows
    pub autoplay: bool,
    /// Position to seek to once the session is ready
    pub resume_offset_seconds: f64,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            poster_url: None,
            autoplay: true,
            resume_offset_seconds: 0.0,
        }
    }
}

impl AttachOptions {
    /// Options that resume at `offset` seconds
    pub fn resume_at(offset: f64) -> Self {
        Self {
            resume_offset_seconds: offset,
            ..Default::default()
        }
    }
}

/// Which layer reported a fatal failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    /// The player engine / media element
    Player,
    /// The adaptive-stream engine
    Stream,
}

/// Coarse classification of fatal failures, for logging only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalErrorKind {
    /// Manifest or segment fetch failed
    Network,
    /// Decode or codec failure
    Media,
    /// DRM / key system rejection
    KeySystem,
    /// Neither the stream engine nor the platform can play the source
    Unsupported,
    /// The engine stack could not be constructed
    Engine,
    Other,
}

impl FatalErrorKind {
    /// Map an hls.js style error type string
    pub fn from_stream_type(kind: &str) -> Self {
        match kind {
            "networkError" => FatalErrorKind::Network,
            "mediaError" => FatalErrorKind::Media,
            "keySystemError" => FatalErrorKind::KeySystem,
            _ => FatalErrorKind::Other,
        }
    }
}

/// Opaque description of a fatal failure, handed to the host as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatalErrorDetail {
    pub source: ErrorSource,
    pub kind: FatalErrorKind,
    pub message: String,
    /// Raw engine payload
    #[serde(default)]
    pub details: serde_json::Value,
}

impl FatalErrorDetail {
    pub fn new(source: ErrorSource, kind: FatalErrorKind, message: impl Into<String>) -> Self {
        Self {
            source,
            kind,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// What the host renders in place of the playback surface after a fatal error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSurface {
    pub title: String,
    pub message: String,
    /// Re-attach the same source with a fresh engine
    pub retry_available: bool,
    /// Heavier fallback: reload the whole page
    pub reload_available: bool,
}

impl Default for ErrorSurface {
    fn default() -> Self {
        Self {
            title: "Video failed to load".to_string(),
            message: "The source may be invalid or blocked by the environment. \
                      Try another source or load it again."
                .to_string(),
            retry_available: true,
            reload_available: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_ordering() {
        let g = Generation::default();
        assert_eq!(g.next(), Generation(1));
        assert!(g.next().next() > g.next());
        assert_eq!(Generation(7).to_string(), "#7");
    }

    #[test]
    fn test_errored_is_sticky() {
        for target in [
            PlaybackState::Initializing,
            PlaybackState::Playing,
            PlaybackState::Paused,
            PlaybackState::Ended,
        ] {
            assert!(!PlaybackState::Errored.can_transition_to(target));
        }
        assert!(PlaybackState::Playing.can_transition_to(PlaybackState::Errored));
        assert!(!PlaybackState::Playing.can_transition_to(PlaybackState::Initializing));
    }

    #[test]
    fn test_progress_fraction() {
        assert_eq!(Progress::new(30.0, 120.0).fraction(), Some(0.25));
        assert_eq!(Progress::new(30.0, f64::NAN).fraction(), None);
        assert_eq!(Progress::new(30.0, 0.0).fraction(), None);
    }

    #[test]
    fn test_fatal_kind_mapping() {
        assert_eq!(FatalErrorKind::from_stream_type("networkError"), FatalErrorKind::Network);
        assert_eq!(FatalErrorKind::from_stream_type("keySystemError"), FatalErrorKind::KeySystem);
        assert_eq!(FatalErrorKind::from_stream_type("muxError"), FatalErrorKind::Other);
    }

    #[test]
    fn test_fatal_detail_serializes_snake_case() {
        let detail = FatalErrorDetail::new(ErrorSource::Stream, FatalErrorKind::KeySystem, "denied");
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["source"], "stream");
        assert_eq!(json["kind"], "key_system");
        assert_eq!(json["details"], serde_json::Value::Null);
    }
}
