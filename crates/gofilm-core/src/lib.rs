//! GoFilm Core - Playback controller for the GoFilm player
//!
//! This crate provides the platform-independent playback logic:
//! - Source-kind dispatch between direct files and segmented (HLS) manifests
//! - Session lifecycle with generation guards against stale callbacks
//! - One-shot resume seeking
//! - Fatal error surfacing with operator-triggered retry
//! - Viewport-driven mini-player transitions
//! - Local watch history and episode navigation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          GoFilm Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │    Source    │  │     Mini     │  │    Config    │          │
//! │  │   Dispatch   │  │   Tracker    │  │              │          │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘          │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Playback   │                              │
//! │                    │ Controller  │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐           │
//! │  │    Engine    │  │    Event    │  │    Watch     │           │
//! │  │   Factory    │  │   Channel   │  │   History    │           │
//! │  └──────────────┘  └─────────────┘  └──────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use gofilm_core::{AttachOptions, EngineEvent, PlaybackController, PlaybackState, PlayerConfig};
//! use gofilm_core::headless::HeadlessFactory;
//!
//! let (mut controller, _events) = PlaybackController::new(HeadlessFactory::new(), PlayerConfig::default()).unwrap();
//! let generation = controller.attach("https://cdn.example.com/a.m3u8", AttachOptions::resume_at(30.0)).unwrap();
//!
//! controller.handle_engine_event(generation, EngineEvent::Ready);
//! controller.handle_engine_event(generation, EngineEvent::Playing);
//! assert_eq!(controller.state(), Some(PlaybackState::Playing));
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod source;
pub mod engine;
pub mod mini;
pub mod controller;
pub mod history;
pub mod episodes;
#[cfg(feature = "headless")]
pub mod headless;

pub use error::{Error, Result};
pub use types::*;
pub use config::{MiniModeConfig, MiniTrigger, PlayerConfig, StreamEngineConfig};
pub use source::{detect_media_kind, validate_playable_link, MediaSource};
pub use engine::{Dispose, EngineEvent, EngineFactory, EngineSpec, PlayerEngine, StreamEngine, ViewportWatch};
pub use mini::{MiniModeTracker, ViewportEvent};
pub use controller::{EventReceiver, PlaybackController, PlaybackEvent};
pub use history::{FilmRef, HistoryEntry, ResumeTarget, WatchHistory};
pub use episodes::{EndAction, EpisodeCursor, EpisodeLink, PlaySource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version once at startup
pub fn init() {
    tracing::info!(version = VERSION, "GoFilm Core initialized");
}
