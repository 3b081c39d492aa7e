//! Headless engine
//!
//! An [`EngineFactory`] with no platform behind it. Every engine call is
//! recorded in a shared [`HeadlessLog`] together with live-instance counts,
//! which makes it the engine of choice for tests and for dry-run sessions
//! driven from the CLI.

use crate::engine::{Dispose, EngineFactory, EngineSpec, PlayerEngine, StreamEngine, ViewportWatch};
use crate::{Error, Generation, PresentationMode, Result};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// A recorded engine call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EngineCommand {
    CreatePlayer { generation: Generation, autoplay: bool, poster: Option<String> },
    SetSource { generation: Generation, url: String },
    CreateStream { generation: Generation, url: String, enable_worker: bool },
    WatchViewport { generation: Generation },
    Seek { generation: Generation, seconds: f64 },
    Pause { generation: Generation },
    SetPoster { generation: Generation, url: String },
    SetSurfaceVisible { generation: Generation, visible: bool },
    SetPresentation { generation: Generation, mode: PresentationMode },
    DisposeViewport { generation: Generation },
    DisposeStream { generation: Generation },
    DisposePlayer { generation: Generation },
}

/// Everything the headless engines did
#[derive(Debug, Default)]
pub struct HeadlessLog {
    pub commands: Vec<EngineCommand>,
    pub live_players: usize,
    pub live_streams: usize,
    pub live_viewports: usize,
    pub players_created: usize,
}

/// Shared view of a [`HeadlessLog`]
#[derive(Debug, Clone, Default)]
pub struct HeadlessHandle(Rc<RefCell<HeadlessLog>>);

impl HeadlessHandle {
    fn record(&self, command: EngineCommand) {
        self.0.borrow_mut().commands.push(command);
    }

    pub fn commands(&self) -> Vec<EngineCommand> {
        self.0.borrow().commands.clone()
    }

    /// Commands issued under one generation
    pub fn commands_for(&self, generation: Generation) -> Vec<EngineCommand> {
        self.0
            .borrow()
            .commands
            .iter()
            .filter(|c| c.generation() == generation)
            .cloned()
            .collect()
    }

    pub fn live_players(&self) -> usize {
        self.0.borrow().live_players
    }

    pub fn live_streams(&self) -> usize {
        self.0.borrow().live_streams
    }

    pub fn live_viewports(&self) -> usize {
        self.0.borrow().live_viewports
    }

    pub fn players_created(&self) -> usize {
        self.0.borrow().players_created
    }

    /// Number of seeks issued under `generation`
    pub fn seek_count(&self, generation: Generation) -> usize {
        self.commands_for(generation)
            .iter()
            .filter(|c| matches!(c, EngineCommand::Seek { .. }))
            .count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().commands.clear();
    }
}

impl EngineCommand {
    pub fn generation(&self) -> Generation {
        match self {
            EngineCommand::CreatePlayer { generation, .. }
            | EngineCommand::SetSource { generation, .. }
            | EngineCommand::CreateStream { generation, .. }
            | EngineCommand::WatchViewport { generation }
            | EngineCommand::Seek { generation, .. }
            | EngineCommand::Pause { generation }
            | EngineCommand::SetPoster { generation, .. }
            | EngineCommand::SetSurfaceVisible { generation, .. }
            | EngineCommand::SetPresentation { generation, .. }
            | EngineCommand::DisposeViewport { generation }
            | EngineCommand::DisposeStream { generation }
            | EngineCommand::DisposePlayer { generation } => *generation,
        }
    }
}

/// Platform capabilities the headless factory pretends to have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessCapabilities {
    /// Adaptive-stream engine available
    pub stream_engine: bool,
    /// Media element plays segmented manifests on its own
    pub native_segmented: bool,
    /// Player construction fails
    pub fail_player: bool,
}

impl Default for HeadlessCapabilities {
    fn default() -> Self {
        Self {
            stream_engine: true,
            native_segmented: false,
            fail_player: false,
        }
    }
}

/// Factory producing recording engines
#[derive(Debug, Default)]
pub struct HeadlessFactory {
    log: HeadlessHandle,
    capabilities: HeadlessCapabilities,
}

impl HeadlessFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: HeadlessCapabilities) -> Self {
        Self {
            log: HeadlessHandle::default(),
            capabilities,
        }
    }

    /// Handle to the shared log
    pub fn handle(&self) -> HeadlessHandle {
        self.log.clone()
    }

    pub fn set_capabilities(&mut self, capabilities: HeadlessCapabilities) {
        self.capabilities = capabilities;
    }
}

impl EngineFactory for HeadlessFactory {
    type Player = HeadlessPlayer;
    type Stream = HeadlessStream;
    type Viewport = HeadlessViewport;

    fn create_player(&mut self, spec: &EngineSpec<'_>) -> Result<HeadlessPlayer> {
        if self.capabilities.fail_player {
            return Err(Error::engine("player engine", "headless player construction disabled"));
        }

        self.log.record(EngineCommand::CreatePlayer {
            generation: spec.generation,
            autoplay: spec.options.autoplay,
            poster: spec.options.poster_url.clone(),
        });
        {
            let mut log = self.log.0.borrow_mut();
            log.live_players += 1;
            log.players_created += 1;
        }

        Ok(HeadlessPlayer {
            generation: spec.generation,
            log: self.log.clone(),
            native_segmented: self.capabilities.native_segmented,
        })
    }

    fn stream_supported(&self) -> bool {
        self.capabilities.stream_engine
    }

    fn create_stream(&mut self, spec: &EngineSpec<'_>, _player: &mut HeadlessPlayer) -> Result<HeadlessStream> {
        self.log.record(EngineCommand::CreateStream {
            generation: spec.generation,
            url: spec.source.as_str().to_string(),
            enable_worker: spec.config.stream.enable_worker,
        });
        self.log.0.borrow_mut().live_streams += 1;

        Ok(HeadlessStream {
            generation: spec.generation,
            log: self.log.clone(),
        })
    }

    fn watch_viewport(&mut self, spec: &EngineSpec<'_>) -> Result<HeadlessViewport> {
        self.log.record(EngineCommand::WatchViewport {
            generation: spec.generation,
        });
        self.log.0.borrow_mut().live_viewports += 1;

        Ok(HeadlessViewport {
            generation: spec.generation,
            log: self.log.clone(),
        })
    }
}

/// Recording player engine
#[derive(Debug)]
pub struct HeadlessPlayer {
    generation: Generation,
    log: HeadlessHandle,
    native_segmented: bool,
}

impl PlayerEngine for HeadlessPlayer {
    fn set_source(&mut self, url: &str) {
        self.log.record(EngineCommand::SetSource {
            generation: self.generation,
            url: url.to_string(),
        });
    }

    fn supports_native_segmented(&self) -> bool {
        self.native_segmented
    }

    fn seek(&mut self, seconds: f64) {
        self.log.record(EngineCommand::Seek {
            generation: self.generation,
            seconds,
        });
    }

    fn pause(&mut self) {
        self.log.record(EngineCommand::Pause {
            generation: self.generation,
        });
    }

    fn set_poster(&mut self, url: &str) {
        self.log.record(EngineCommand::SetPoster {
            generation: self.generation,
            url: url.to_string(),
        });
    }

    fn set_surface_visible(&mut self, visible: bool) {
        self.log.record(EngineCommand::SetSurfaceVisible {
            generation: self.generation,
            visible,
        });
    }

    fn set_presentation(&mut self, mode: PresentationMode) {
        self.log.record(EngineCommand::SetPresentation {
            generation: self.generation,
            mode,
        });
    }
}

impl Dispose for HeadlessPlayer {
    fn dispose(&mut self) {
        self.log.record(EngineCommand::DisposePlayer {
            generation: self.generation,
        });
        self.log.0.borrow_mut().live_players -= 1;
    }
}

/// Recording stream engine
#[derive(Debug)]
pub struct HeadlessStream {
    generation: Generation,
    log: HeadlessHandle,
}

impl StreamEngine for HeadlessStream {}

impl Dispose for HeadlessStream {
    fn dispose(&mut self) {
        self.log.record(EngineCommand::DisposeStream {
            generation: self.generation,
        });
        self.log.0.borrow_mut().live_streams -= 1;
    }
}

/// Recording viewport watch
#[derive(Debug)]
pub struct HeadlessViewport {
    generation: Generation,
    log: HeadlessHandle,
}

impl ViewportWatch for HeadlessViewport {}

impl Dispose for HeadlessViewport {
    fn dispose(&mut self) {
        self.log.record(EngineCommand::DisposeViewport {
            generation: self.generation,
        });
        self.log.0.borrow_mut().live_viewports -= 1;
    }
}
