//! Playback Controller - owns one playback session at a time
//!
//! Coordinates:
//! - Source-kind dispatch (direct file vs. adaptive stream engine)
//! - Session generations and stale-callback rejection
//! - Resume position, applied once per generation
//! - Fatal error surfacing and operator-triggered retry
//! - Mini-player transitions

use crate::{
    engine::{EngineEvent, EngineFactory, EngineSpec, PlayerEngine, SessionResources},
    mini::{MiniModeTracker, ViewportEvent},
    source::MediaSource,
    AttachOptions, Error, ErrorSource, ErrorSurface, FatalErrorDetail, FatalErrorKind, Generation,
    MediaKind, PlaybackState, PlayerConfig, PresentationMode, Progress, Result,
};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// Events delivered to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// Engine time update
    Progress {
        generation: Generation,
        current_time: f64,
        duration: f64,
    },
    /// Reached the end of the source; once per generation
    Ended { generation: Generation },
    /// Unrecoverable failure; once per generation
    FatalError {
        generation: Generation,
        detail: FatalErrorDetail,
    },
    StateChanged {
        generation: Generation,
        from: PlaybackState,
        to: PlaybackState,
    },
    MiniModeChanged { generation: Generation, mini: bool },
    /// The operator chose the page-reload recovery path
    ReloadRequested,
}

impl PlaybackEvent {
    /// Session the event belongs to; `None` for page-level requests
    pub fn generation(&self) -> Option<Generation> {
        match self {
            PlaybackEvent::Progress { generation, .. }
            | PlaybackEvent::Ended { generation }
            | PlaybackEvent::FatalError { generation, .. }
            | PlaybackEvent::StateChanged { generation, .. }
            | PlaybackEvent::MiniModeChanged { generation, .. } => Some(*generation),
            PlaybackEvent::ReloadRequested => None,
        }
    }
}

/// Receiving half of the controller's event channel
pub type EventReceiver = mpsc::UnboundedReceiver<PlaybackEvent>;

/// Outbound channels shared by the controller and its session
struct Emitter {
    events: mpsc::UnboundedSender<PlaybackEvent>,
    state: watch::Sender<Option<PlaybackState>>,
}

impl Emitter {
    fn emit(&self, event: PlaybackEvent) {
        // A host that dropped its receiver simply stops listening
        let _ = self.events.send(event);
    }

    fn publish_state(&self, state: Option<PlaybackState>) {
        self.state.send_replace(state);
    }
}

/// Source and options of the most recent attach, kept for retry
#[derive(Debug, Clone)]
struct AttachRequest {
    source: MediaSource,
    options: AttachOptions,
}

/// One live generation
struct Session<F: EngineFactory> {
    generation: Generation,
    request: AttachRequest,
    state: PlaybackState,
    mini: MiniModeTracker,
    resume_applied: bool,
    ended_emitted: bool,
    fatal: Option<FatalErrorDetail>,
    progress: Progress,
    resources: SessionResources<F>,
}

impl<F: EngineFactory> Session<F> {
    fn transition(&mut self, to: PlaybackState, emitter: &Emitter) {
        let from = self.state;
        if from == to {
            return;
        }
        if !from.can_transition_to(to) {
            debug!(generation = %self.generation, %from, %to, "Ignoring state change");
            return;
        }

        self.state = to;
        emitter.publish_state(Some(to));
        emitter.emit(PlaybackEvent::StateChanged {
            generation: self.generation,
            from,
            to,
        });
        info!(generation = %self.generation, %from, %to, "State transition");

        let change = self.mini.set_playing(to == PlaybackState::Playing);
        self.apply_presentation(change, emitter);
    }

    fn apply_presentation(&mut self, change: Option<PresentationMode>, emitter: &Emitter) {
        let Some(mode) = change else {
            return;
        };
        if let Some(player) = self.resources.player_mut() {
            player.set_presentation(mode);
        }
        emitter.emit(PlaybackEvent::MiniModeChanged {
            generation: self.generation,
            mini: mode == PresentationMode::Mini,
        });
    }

    fn on_ready(&mut self) {
        if self.resume_applied {
            return;
        }
        self.resume_applied = true;

        let offset = self.request.options.resume_offset_seconds;
        if offset > 0.0 {
            if let Some(player) = self.resources.player_mut() {
                info!(generation = %self.generation, offset, "Resuming playback position");
                player.seek(offset);
            }
        }
    }

    fn on_ended(&mut self, emitter: &Emitter) {
        if !self.ended_emitted {
            self.ended_emitted = true;
            emitter.emit(PlaybackEvent::Ended {
                generation: self.generation,
            });
        }
        self.transition(PlaybackState::Ended, emitter);
    }

    fn fail(&mut self, detail: FatalErrorDetail, emitter: &Emitter) {
        if self.fatal.is_some() {
            return;
        }

        warn!(
            generation = %self.generation,
            url = %self.request.source,
            source = ?detail.source,
            kind = ?detail.kind,
            message = %detail.message,
            "Fatal playback error"
        );

        self.transition(PlaybackState::Errored, emitter);
        let change = self.mini.force_inline();
        self.apply_presentation(change, emitter);

        if let Some(player) = self.resources.player_mut() {
            player.pause();
            player.set_surface_visible(false);
        }

        self.fatal = Some(detail.clone());
        emitter.emit(PlaybackEvent::FatalError {
            generation: self.generation,
            detail,
        });
    }
}

/// Playback controller for one host element
pub struct PlaybackController<F: EngineFactory> {
    factory: F,
    config: PlayerConfig,
    generation: Generation,
    session: Option<Session<F>>,
    last_request: Option<AttachRequest>,
    emitter: Emitter,
}

impl<F: EngineFactory> PlaybackController<F> {
    /// Create a controller and the receiver for its events.
    ///
    /// Fails with [`Error::InvalidConfig`] when `config` does not validate.
    pub fn new(factory: F, config: PlayerConfig) -> Result<(Self, EventReceiver)> {
        config.validate()?;

        let (events, receiver) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(None);

        let controller = Self {
            factory,
            config,
            generation: Generation::default(),
            session: None,
            last_request: None,
            emitter: Emitter { events, state },
        };

        Ok((controller, receiver))
    }

    /// Start a new session for `source_url`, replacing any live one
    #[instrument(skip(self, options))]
    pub fn attach(&mut self, source_url: &str, options: AttachOptions) -> Result<Generation> {
        let offset = options.resume_offset_seconds;
        if !offset.is_finite() || offset < 0.0 {
            return Err(Error::InvalidResumeOffset(offset));
        }
        let source = MediaSource::parse(source_url)?;

        Ok(self.start(AttachRequest { source, options }))
    }

    /// Re-create the last session with a fresh engine stack
    pub fn retry(&mut self) -> Result<Generation> {
        let request = self.last_request.clone().ok_or(Error::NoSession)?;
        info!(url = %request.source, "Retrying playback");
        Ok(self.start(request))
    }

    /// Tear down the live session, if any
    pub fn detach(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        let change = session.mini.reset();
        session.apply_presentation(change, &self.emitter);
        session.resources.release();
        self.emitter.publish_state(None);

        info!(generation = %session.generation, "Session detached");
    }

    /// Host chose the page-reload recovery path
    pub fn request_reload(&mut self) {
        info!("Page reload requested");
        self.emitter.emit(PlaybackEvent::ReloadRequested);
    }

    /// Change the poster without recreating the session
    pub fn set_poster(&mut self, url: &str) -> Result<()> {
        let session = self.session.as_mut().ok_or(Error::NoSession)?;
        session.request.options.poster_url = Some(url.to_string());
        if let Some(player) = session.resources.player_mut() {
            player.set_poster(url);
        }
        if let Some(request) = self.last_request.as_mut() {
            request.options.poster_url = Some(url.to_string());
        }
        Ok(())
    }

    /// Route a player or stream engine callback.
    ///
    /// Returns `false` when the event belongs to a superseded generation.
    pub fn handle_engine_event(&mut self, generation: Generation, event: EngineEvent) -> bool {
        let Some(session) = self.session.as_mut().filter(|s| s.generation == generation) else {
            debug!(%generation, ?event, "Discarding stale engine event");
            return false;
        };

        if session.state == PlaybackState::Errored {
            debug!(%generation, ?event, "Session errored, ignoring engine event");
            return true;
        }

        let emitter = &self.emitter;
        match event {
            EngineEvent::Ready => session.on_ready(),
            EngineEvent::Playing => session.transition(PlaybackState::Playing, emitter),
            EngineEvent::Paused => session.transition(PlaybackState::Paused, emitter),
            EngineEvent::TimeUpdate { current_time, duration } => {
                session.progress = Progress::new(current_time, duration);
                emitter.emit(PlaybackEvent::Progress {
                    generation,
                    current_time,
                    duration,
                });
            }
            EngineEvent::Ended => session.on_ended(emitter),
            EngineEvent::Warning { message } => {
                debug!(%generation, %message, "Engine warning");
            }
            EngineEvent::Fatal { detail } => session.fail(detail, emitter),
        }
        true
    }

    /// Route a viewport observation.
    ///
    /// Returns `false` when the event belongs to a superseded generation.
    pub fn handle_viewport_event(&mut self, generation: Generation, event: ViewportEvent) -> bool {
        let Some(session) = self.session.as_mut().filter(|s| s.generation == generation) else {
            debug!(%generation, ?event, "Discarding stale viewport event");
            return false;
        };

        let change = session.mini.observe(event);
        session.apply_presentation(change, &self.emitter);
        true
    }

    /// Current playback state, `None` when detached
    pub fn state(&self) -> Option<PlaybackState> {
        self.session.as_ref().map(|s| s.state)
    }

    /// Subscribe to playback state changes
    pub fn subscribe_state(&self) -> watch::Receiver<Option<PlaybackState>> {
        self.emitter.state.subscribe()
    }

    pub fn is_mini_mode(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.mini.is_mini())
    }

    pub fn is_fullscreen(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.mini.is_fullscreen())
    }

    /// Generation of the most recently created session
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_attached(&self) -> bool {
        self.session.is_some()
    }

    pub fn source(&self) -> Option<&MediaSource> {
        self.session.as_ref().map(|s| &s.request.source)
    }

    pub fn media_kind(&self) -> Option<MediaKind> {
        self.source().map(MediaSource::kind)
    }

    pub fn last_position(&self) -> Option<Progress> {
        self.session.as_ref().map(|s| s.progress)
    }

    pub fn fatal_error(&self) -> Option<&FatalErrorDetail> {
        self.session.as_ref().and_then(|s| s.fatal.as_ref())
    }

    /// What to show instead of the playback surface, while errored
    pub fn error_surface(&self) -> Option<ErrorSurface> {
        self.fatal_error().map(|_| ErrorSurface::default())
    }

    /// Whether the live session holds a stream engine
    pub fn uses_stream_engine(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.resources.has_stream())
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    fn start(&mut self, request: AttachRequest) -> Generation {
        self.detach();

        self.generation = self.generation.next();
        let generation = self.generation;
        info!(
            %generation,
            url = %request.source,
            kind = %request.source.kind(),
            "Creating playback session"
        );

        let mut resources = SessionResources::new();
        let spec = EngineSpec {
            generation,
            source: &request.source,
            options: &request.options,
            config: &self.config,
        };
        let outcome = acquire(&mut self.factory, &mut resources, &spec);

        self.last_request = Some(request.clone());
        let session = self.session.insert(Session {
            generation,
            request,
            state: PlaybackState::Initializing,
            mini: MiniModeTracker::new(self.config.mini.clone()),
            resume_applied: false,
            ended_emitted: false,
            fatal: None,
            progress: Progress::default(),
            resources,
        });
        self.emitter.publish_state(Some(PlaybackState::Initializing));

        if let Err(detail) = outcome {
            session.fail(detail, &self.emitter);
        }

        generation
    }
}

/// Build the engine stack for one session, dispatching on media kind
fn acquire<F: EngineFactory>(
    factory: &mut F,
    resources: &mut SessionResources<F>,
    spec: &EngineSpec<'_>,
) -> std::result::Result<(), FatalErrorDetail> {
    let player = factory
        .create_player(spec)
        .map_err(|e| engine_failure(ErrorSource::Player, &e))?;
    let player = resources.player.insert(player);
    let url = spec.source.as_str();

    match spec.source.kind() {
        MediaKind::DirectFile => player.set_source(url),
        MediaKind::SegmentedManifest if factory.stream_supported() => {
            let stream = factory
                .create_stream(spec, player)
                .map_err(|e| engine_failure(ErrorSource::Stream, &e))?;
            resources.stream = Some(stream);
        }
        MediaKind::SegmentedManifest if player.supports_native_segmented() => {
            debug!(generation = %spec.generation, "Using native segmented playback");
            player.set_source(url);
        }
        MediaKind::SegmentedManifest => {
            return Err(FatalErrorDetail::new(
                ErrorSource::Stream,
                FatalErrorKind::Unsupported,
                "segmented manifests are not playable in this environment",
            ));
        }
    }

    let viewport = factory
        .watch_viewport(spec)
        .map_err(|e| engine_failure(ErrorSource::Player, &e))?;
    resources.viewport = Some(viewport);

    Ok(())
}

fn engine_failure(source: ErrorSource, error: &Error) -> FatalErrorDetail {
    FatalErrorDetail::new(source, FatalErrorKind::Engine, error.to_string())
        .with_details(serde_json::json!({ "code": error.error_code() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{EngineCommand, HeadlessCapabilities, HeadlessFactory};

    fn controller() -> (PlaybackController<HeadlessFactory>, EventReceiver) {
        PlaybackController::new(HeadlessFactory::new(), PlayerConfig::default()).unwrap()
    }

    fn drain(rx: &mut EventReceiver) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_controller_creation() {
        let (controller, _rx) = controller();
        assert_eq!(controller.state(), None);
        assert_eq!(controller.generation(), Generation(0));
        assert!(!controller.is_mini_mode());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = PlayerConfig::default();
        config.mini.enter_ratio = 0.6;
        config.mini.exit_ratio = 0.4;
        assert!(matches!(
            PlaybackController::new(HeadlessFactory::new(), config),
            Err(Error::InvalidConfig(_))
        ));

        let mut config = PlayerConfig::default();
        config.volume = 1.5;
        assert!(PlaybackController::new(HeadlessFactory::new(), config).is_err());
    }

    #[test]
    fn test_event_generation() {
        let (mut controller, mut rx) = controller();
        let generation = controller.attach("https://x/a.mp4", AttachOptions::default()).unwrap();
        controller.request_reload();

        let events = drain(&mut rx);
        assert!(!events.is_empty());
        for event in &events {
            match event {
                PlaybackEvent::ReloadRequested => assert_eq!(event.generation(), None),
                _ => assert_eq!(event.generation(), Some(generation)),
            }
        }
        assert_eq!(events.last(), Some(&PlaybackEvent::ReloadRequested));
    }

    #[test]
    fn test_attach_rejects_misuse_without_engine() {
        let (mut controller, _rx) = controller();
        let handle = controller.factory().handle();

        assert!(matches!(
            controller.attach("", AttachOptions::default()),
            Err(Error::EmptySource)
        ));
        assert!(matches!(
            controller.attach("https://x/a.mp4", AttachOptions::resume_at(-3.0)),
            Err(Error::InvalidResumeOffset(_))
        ));
        assert!(matches!(
            controller.attach("https://x/a.mp4", AttachOptions::resume_at(f64::NAN)),
            Err(Error::InvalidResumeOffset(_))
        ));

        assert_eq!(handle.players_created(), 0);
        assert!(!controller.is_attached());
        assert_eq!(controller.generation(), Generation(0));
    }

    #[test]
    fn test_misuse_keeps_live_session() {
        let (mut controller, _rx) = controller();
        let generation = controller.attach("https://x/a.mp4", AttachOptions::default()).unwrap();

        assert!(controller.attach("  ", AttachOptions::default()).is_err());
        assert_eq!(controller.generation(), generation);
        assert!(controller.is_attached());
    }

    #[test]
    fn test_direct_file_sets_source() {
        let (mut controller, _rx) = controller();
        let handle = controller.factory().handle();
        let generation = controller.attach("https://x/a.mp4", AttachOptions::default()).unwrap();

        let commands = handle.commands_for(generation);
        assert!(commands.contains(&EngineCommand::SetSource {
            generation,
            url: "https://x/a.mp4".to_string(),
        }));
        assert!(!controller.uses_stream_engine());
        assert_eq!(controller.media_kind(), Some(MediaKind::DirectFile));
        assert_eq!(controller.state(), Some(PlaybackState::Initializing));
    }

    #[test]
    fn test_native_fallback_for_segmented() {
        let factory = HeadlessFactory::with_capabilities(HeadlessCapabilities {
            stream_engine: false,
            native_segmented: true,
            fail_player: false,
        });
        let handle = factory.handle();
        let (mut controller, _rx) =
            PlaybackController::new(factory, PlayerConfig::default()).unwrap();

        let generation = controller.attach("https://x/a.m3u8", AttachOptions::default()).unwrap();
        assert!(!controller.uses_stream_engine());
        assert!(handle
            .commands_for(generation)
            .iter()
            .any(|c| matches!(c, EngineCommand::SetSource { .. })));
    }

    #[test]
    fn test_unsupported_segmented_errors() {
        let factory = HeadlessFactory::with_capabilities(HeadlessCapabilities {
            stream_engine: false,
            native_segmented: false,
            fail_player: false,
        });
        let (mut controller, mut rx) =
            PlaybackController::new(factory, PlayerConfig::default()).unwrap();

        controller.attach("https://x/a.m3u8", AttachOptions::default()).unwrap();
        assert_eq!(controller.state(), Some(PlaybackState::Errored));
        assert_eq!(
            controller.fatal_error().map(|d| d.kind),
            Some(FatalErrorKind::Unsupported)
        );

        let fatal = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, PlaybackEvent::FatalError { .. }))
            .count();
        assert_eq!(fatal, 1);
    }

    #[test]
    fn test_player_construction_failure_is_fatal() {
        let factory = HeadlessFactory::with_capabilities(HeadlessCapabilities {
            fail_player: true,
            ..Default::default()
        });
        let (mut controller, _rx) =
            PlaybackController::new(factory, PlayerConfig::default()).unwrap();

        assert!(controller.attach("https://x/a.mp4", AttachOptions::default()).is_ok());
        assert_eq!(controller.state(), Some(PlaybackState::Errored));
        assert_eq!(controller.fatal_error().map(|d| d.kind), Some(FatalErrorKind::Engine));
        assert!(controller.error_surface().is_some());
    }

    #[test]
    fn test_errored_session_ignores_playback_events() {
        let (mut controller, mut rx) = controller();
        let generation = controller.attach("https://x/a.mp4", AttachOptions::default()).unwrap();

        controller.handle_engine_event(
            generation,
            EngineEvent::Fatal {
                detail: FatalErrorDetail::new(ErrorSource::Player, FatalErrorKind::Media, "decode"),
            },
        );
        drain(&mut rx);

        controller.handle_engine_event(generation, EngineEvent::Playing);
        controller.handle_engine_event(
            generation,
            EngineEvent::TimeUpdate {
                current_time: 1.0,
                duration: 10.0,
            },
        );

        assert_eq!(controller.state(), Some(PlaybackState::Errored));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_warning_keeps_state() {
        let (mut controller, _rx) = controller();
        let generation = controller.attach("https://x/a.mp4", AttachOptions::default()).unwrap();
        controller.handle_engine_event(generation, EngineEvent::Playing);

        controller.handle_engine_event(
            generation,
            EngineEvent::Warning {
                message: "bufferStalledError".to_string(),
            },
        );
        assert_eq!(controller.state(), Some(PlaybackState::Playing));
    }

    #[test]
    fn test_set_poster_forwards_and_survives_retry() {
        let (mut controller, _rx) = controller();
        let handle = controller.factory().handle();

        assert!(matches!(controller.set_poster("https://x/p.jpg"), Err(Error::NoSession)));

        let generation = controller.attach("https://x/a.mp4", AttachOptions::default()).unwrap();
        controller.set_poster("https://x/p.jpg").unwrap();
        assert!(handle.commands_for(generation).contains(&EngineCommand::SetPoster {
            generation,
            url: "https://x/p.jpg".to_string(),
        }));

        let retried = controller.retry().unwrap();
        assert!(handle.commands_for(retried).contains(&EngineCommand::CreatePlayer {
            generation: retried,
            autoplay: true,
            poster: Some("https://x/p.jpg".to_string()),
        }));
    }

    #[test]
    fn test_state_subscription() {
        let (mut controller, _rx) = controller();
        let state = controller.subscribe_state();

        let generation = controller.attach("https://x/a.mp4", AttachOptions::default()).unwrap();
        controller.handle_engine_event(generation, EngineEvent::Playing);
        assert_eq!(*state.borrow(), Some(PlaybackState::Playing));

        controller.detach();
        assert_eq!(*state.borrow(), None);
    }

    #[test]
    fn test_reload_request_is_forwarded() {
        let (mut controller, mut rx) = controller();
        controller.request_reload();
        assert_eq!(drain(&mut rx), vec![PlaybackEvent::ReloadRequested]);
    }
}
