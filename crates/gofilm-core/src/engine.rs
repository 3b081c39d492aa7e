//! Engine seams
//!
//! The controller never touches a platform directly. A platform provides an
//! [`EngineFactory`] that builds three disposable resources per session:
//!
//! ```text
//!   player engine  ──►  stream engine (segmented sources only)  ──►  viewport watch
//!        ▲                                                                │
//!        └──────────────── disposed in reverse order ◄────────────────────┘
//! ```
//!
//! Every resource is built with the session [`Generation`] so its callbacks
//! can be routed back through `PlaybackController::handle_engine_event`.

use crate::{
    AttachOptions, FatalErrorDetail, Generation, MediaSource, PlayerConfig, PresentationMode,
    Result,
};
use serde::{Deserialize, Serialize};

/// Callbacks reported by the player and stream engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Metadata loaded; seeking is now possible
    Ready,
    Playing,
    Paused,
    TimeUpdate { current_time: f64, duration: f64 },
    Ended,
    /// Non-fatal condition such as a buffering stall
    Warning { message: String },
    /// Unrecoverable failure
    Fatal { detail: FatalErrorDetail },
}

/// A resource with explicit teardown
pub trait Dispose {
    /// Detach listeners and release the underlying platform object
    fn dispose(&mut self);
}

/// The media element / player engine
pub trait PlayerEngine: Dispose {
    /// Hand a source URL straight to the media element
    fn set_source(&mut self, url: &str);

    /// Whether the platform plays segmented manifests without a stream engine
    fn supports_native_segmented(&self) -> bool;

    fn seek(&mut self, seconds: f64);

    fn pause(&mut self);

    fn set_poster(&mut self, url: &str);

    /// Show or hide the playback surface
    fn set_surface_visible(&mut self, visible: bool);

    fn set_presentation(&mut self, mode: PresentationMode);
}

/// Adaptive-bitrate stream engine bound to a player's media element
pub trait StreamEngine: Dispose {}

/// Observers reporting the host element's viewport position
pub trait ViewportWatch: Dispose {}

/// Everything a factory needs to build one session's resources
#[derive(Debug, Clone, Copy)]
pub struct EngineSpec<'a> {
    pub generation: Generation,
    pub source: &'a MediaSource,
    pub options: &'a AttachOptions,
    pub config: &'a PlayerConfig,
}

/// Platform factory for session resources
pub trait EngineFactory {
    type Player: PlayerEngine;
    type Stream: StreamEngine;
    type Viewport: ViewportWatch;

    fn create_player(&mut self, spec: &EngineSpec<'_>) -> Result<Self::Player>;

    /// Whether the adaptive-stream engine runs on this platform
    fn stream_supported(&self) -> bool;

    /// Build a stream engine, load the manifest and bind it to `player`
    fn create_stream(&mut self, spec: &EngineSpec<'_>, player: &mut Self::Player) -> Result<Self::Stream>;

    fn watch_viewport(&mut self, spec: &EngineSpec<'_>) -> Result<Self::Viewport>;
}

/// One session's engine stack.
///
/// Acquired in order player, stream, viewport; dropping it disposes in the
/// reverse order, so a stream engine never outlives its media element.
pub struct SessionResources<F: EngineFactory> {
    pub(crate) player: Option<F::Player>,
    pub(crate) stream: Option<F::Stream>,
    pub(crate) viewport: Option<F::Viewport>,
}

impl<F: EngineFactory> SessionResources<F> {
    pub(crate) fn new() -> Self {
        Self {
            player: None,
            stream: None,
            viewport: None,
        }
    }

    pub(crate) fn player_mut(&mut self) -> Option<&mut F::Player> {
        self.player.as_mut()
    }

    pub fn has_player(&self) -> bool {
        self.player.is_some()
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Dispose everything still held. Safe to call more than once.
    pub(crate) fn release(&mut self) {
        if let Some(mut viewport) = self.viewport.take() {
            viewport.dispose();
        }
        if let Some(mut stream) = self.stream.take() {
            stream.dispose();
        }
        if let Some(mut player) = self.player.take() {
            player.dispose();
        }
    }
}

impl<F: EngineFactory> Drop for SessionResources<F> {
    fn drop(&mut self) {
        self.release();
    }
}
