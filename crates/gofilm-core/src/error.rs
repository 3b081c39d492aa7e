//! Error types for GoFilm Core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
///
/// Runtime stream failures never surface here; they become the `Errored`
/// playback state plus a [`PlaybackEvent::FatalError`](crate::PlaybackEvent).
#[derive(Error, Debug)]
pub enum Error {
    // Attach misuse
    #[error("Source URL is empty")]
    EmptySource,

    #[error("Invalid source URL {url}: {source}")]
    InvalidSource {
        url: String,
        source: url::ParseError,
    },

    #[error("Invalid resume offset: {0}s")]
    InvalidResumeOffset(f64),

    #[error("Unsupported link: {0}")]
    UnsupportedLink(String),

    // Contract violations
    #[error("No playback session has been attached")]
    NoSession,

    // Engine construction
    #[error("Failed to create {component}: {message}")]
    EngineCreate {
        component: &'static str,
        message: String,
    },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Persistence
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an engine construction error
    pub fn engine(component: &'static str, message: impl Into<String>) -> Self {
        Error::EngineCreate {
            component,
            message: message.into(),
        }
    }

    /// Returns true if the error came from bad input to `attach`
    pub fn is_attach_misuse(&self) -> bool {
        matches!(
            self,
            Error::EmptySource | Error::InvalidSource { .. } | Error::InvalidResumeOffset(_)
        )
    }

    /// Returns the error code for logs and host reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::EmptySource => "EMPTY_SOURCE",
            Error::InvalidSource { .. } => "INVALID_SOURCE",
            Error::InvalidResumeOffset(_) => "INVALID_RESUME_OFFSET",
            Error::UnsupportedLink(_) => "UNSUPPORTED_LINK",
            Error::NoSession => "NO_SESSION",
            Error::EngineCreate { .. } => "ENGINE_CREATE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}
