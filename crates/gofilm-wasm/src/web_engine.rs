//! Browser implementation of the engine seams
//!
//! - `<video>` element as the player engine
//! - hls.js as the adaptive-stream engine
//! - IntersectionObserver plus scroll, resize and fullscreen listeners as
//!   the viewport watch, with an animation-frame bounding-rect sampler when
//!   the observer is unavailable or not wanted
//!
//! Every DOM callback holds a `Weak<Shared>` and the session generation, and
//! hands its event to [`Shared`] for routing into the controller.

use std::cell::{Cell, OnceCell, RefCell};
use std::rc::{Rc, Weak};

use gofilm_core::{
    Dispose, EngineEvent, EngineFactory, EngineSpec, ErrorSource, FatalErrorDetail,
    FatalErrorKind, Generation, MiniTrigger, PlayerEngine, PresentationMode, StreamEngine,
    ViewportEvent, ViewportWatch,
};
use js_sys::Reflect;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Event, EventTarget, HtmlElement, HtmlVideoElement, IntersectionObserver,
    IntersectionObserverEntry, IntersectionObserverInit, MediaError, Window,
};

use crate::hls::{self, Hls, HlsConfig};
use crate::player::Shared;

/// Class toggled on the container while the mini player is shown
pub const MINI_CLASS: &str = "gofilm-player--mini";

const VIDEO_CLASS: &str = "gofilm-player__video";

const SEGMENTED_MIME: &str = "application/vnd.apple.mpegurl";

/// Inline playback on mobile browsers
const INLINE_ATTRIBUTES: [(&str, &str); 4] = [
    ("playsinline", "true"),
    ("webkit-playsinline", "true"),
    ("x5-video-player-type", "h5"),
    ("x5-video-player-fullscreen", "true"),
];

type Listener = Closure<dyn FnMut(Event)>;

/// Drop a closure after the current call stack unwinds.
///
/// A listener may trigger teardown of its own session (an `ended` handler
/// starting the next episode, a click on the retry button). Freeing the
/// closure while it is still executing is not allowed, so teardown hands it
/// to the microtask queue instead.
pub(crate) fn defer_drop<T: 'static>(value: T) {
    wasm_bindgen_futures::spawn_local(async move {
        drop(value);
    });
}

fn route_engine(shared: &Weak<Shared>, generation: Generation, event: EngineEvent) {
    if let Some(shared) = shared.upgrade() {
        shared.route_engine(generation, event);
    }
}

fn route_viewport(shared: &Weak<Shared>, generation: Generation, event: ViewportEvent) {
    if let Some(shared) = shared.upgrade() {
        shared.route_viewport(generation, event);
    }
}

fn engine_error(component: &'static str, value: JsValue) -> gofilm_core::Error {
    let message = value
        .as_string()
        .or_else(|| value.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
        .unwrap_or_else(|| format!("{:?}", value));
    gofilm_core::Error::engine(component, message)
}

// ============================================================================
// Factory
// ============================================================================

/// Handle to the player state, bound once the state has been allocated
pub(crate) type SharedLink = Rc<OnceCell<Weak<Shared>>>;

pub struct WebEngineFactory {
    window: Window,
    document: Document,
    container: HtmlElement,
    shared: SharedLink,
}

impl WebEngineFactory {
    pub(crate) fn new(
        window: Window,
        document: Document,
        container: HtmlElement,
        shared: SharedLink,
    ) -> Self {
        Self {
            window,
            document,
            container,
            shared,
        }
    }

    /// Unbound until the player finished construction; callbacks holding
    /// an unbound handle drop their events
    pub(crate) fn shared(&self) -> Weak<Shared> {
        self.shared.get().cloned().unwrap_or_default()
    }
}

impl EngineFactory for WebEngineFactory {
    type Player = VideoPlayer;
    type Stream = HlsStream;
    type Viewport = WebViewport;

    fn create_player(&mut self, spec: &EngineSpec<'_>) -> gofilm_core::Result<VideoPlayer> {
        VideoPlayer::create(&self.document, &self.container, spec, self.shared())
            .map_err(|e| engine_error("video element", e))
    }

    fn stream_supported(&self) -> bool {
        hls::is_available()
    }

    fn create_stream(
        &mut self,
        spec: &EngineSpec<'_>,
        player: &mut VideoPlayer,
    ) -> gofilm_core::Result<HlsStream> {
        HlsStream::create(spec, &player.video, self.shared())
            .map_err(|e| engine_error("hls.js", e))
    }

    fn watch_viewport(&mut self, spec: &EngineSpec<'_>) -> gofilm_core::Result<WebViewport> {
        WebViewport::create(
            &self.window,
            &self.document,
            &self.container,
            spec,
            self.shared(),
        )
        .map_err(|e| engine_error("viewport observer", e))
    }
}

// ============================================================================
// Player Engine
// ============================================================================

/// A `<video>` element appended to the player container
pub struct VideoPlayer {
    container: HtmlElement,
    video: HtmlVideoElement,
    listeners: Vec<(&'static str, Listener)>,
}

impl VideoPlayer {
    fn create(
        document: &Document,
        container: &HtmlElement,
        spec: &EngineSpec<'_>,
        shared: Weak<Shared>,
    ) -> Result<Self, JsValue> {
        let video: HtmlVideoElement = document
            .create_element("video")?
            .dyn_into()
            .map_err(JsValue::from)?;
        video.set_class_name(VIDEO_CLASS);
        video.set_controls(true);
        video.set_autoplay(spec.options.autoplay);
        video.set_volume(spec.config.volume);
        if let Some(poster) = &spec.options.poster_url {
            video.set_poster(poster);
        }
        for (name, value) in INLINE_ATTRIBUTES {
            video.set_attribute(name, value)?;
        }
        container.append_child(&video)?;

        let mut player = Self {
            container: container.clone(),
            video,
            listeners: Vec::new(),
        };

        let generation = spec.generation;
        player.listen("loadedmetadata", generation, &shared, |_| EngineEvent::Ready)?;
        player.listen("playing", generation, &shared, |_| EngineEvent::Playing)?;
        player.listen("pause", generation, &shared, |_| EngineEvent::Paused)?;
        player.listen("ended", generation, &shared, |_| EngineEvent::Ended)?;
        player.listen("timeupdate", generation, &shared, |video| EngineEvent::TimeUpdate {
            current_time: video.current_time(),
            duration: video.duration(),
        })?;
        player.listen("waiting", generation, &shared, |_| EngineEvent::Warning {
            message: "waiting for data".to_string(),
        })?;
        player.listen("error", generation, &shared, media_error)?;

        Ok(player)
    }

    fn listen(
        &mut self,
        name: &'static str,
        generation: Generation,
        shared: &Weak<Shared>,
        map: impl Fn(&HtmlVideoElement) -> EngineEvent + 'static,
    ) -> Result<(), JsValue> {
        let video = self.video.clone();
        let shared = shared.clone();
        let listener = Listener::new(move |_event: Event| {
            route_engine(&shared, generation, map(&video));
        });
        self.video
            .add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())?;
        self.listeners.push((name, listener));
        Ok(())
    }
}

fn media_error(video: &HtmlVideoElement) -> EngineEvent {
    let (kind, code, message) = match video.error() {
        Some(error) => {
            let kind = match error.code() {
                MediaError::MEDIA_ERR_NETWORK => FatalErrorKind::Network,
                MediaError::MEDIA_ERR_DECODE => FatalErrorKind::Media,
                MediaError::MEDIA_ERR_SRC_NOT_SUPPORTED => FatalErrorKind::Unsupported,
                _ => FatalErrorKind::Other,
            };
            (kind, error.code(), error.message())
        }
        None => (FatalErrorKind::Other, 0, "media element error".to_string()),
    };

    let detail = FatalErrorDetail::new(ErrorSource::Player, kind, message)
        .with_details(serde_json::json!({ "code": code }));
    EngineEvent::Fatal { detail }
}

impl PlayerEngine for VideoPlayer {
    fn set_source(&mut self, url: &str) {
        self.video.set_src(url);
    }

    fn supports_native_segmented(&self) -> bool {
        !self.video.can_play_type(SEGMENTED_MIME).is_empty()
    }

    fn seek(&mut self, seconds: f64) {
        self.video.set_current_time(seconds);
    }

    fn pause(&mut self) {
        let _ = self.video.pause();
    }

    fn set_poster(&mut self, url: &str) {
        self.video.set_poster(url);
    }

    fn set_surface_visible(&mut self, visible: bool) {
        let display = if visible { "block" } else { "none" };
        let _ = self.video.style().set_property("display", display);
    }

    fn set_presentation(&mut self, mode: PresentationMode) {
        let _ = self
            .container
            .class_list()
            .toggle_with_force(MINI_CLASS, mode == PresentationMode::Mini);
    }
}

impl Dispose for VideoPlayer {
    fn dispose(&mut self) {
        for (name, listener) in &self.listeners {
            let _ = self
                .video
                .remove_event_listener_with_callback(name, listener.as_ref().unchecked_ref());
        }
        defer_drop(std::mem::take(&mut self.listeners));

        let _ = self.video.pause();
        let _ = self.video.remove_attribute("src");
        self.video.load();
        self.video.remove();
        let _ = self.container.class_list().remove_1(MINI_CLASS);
    }
}

// ============================================================================
// Stream Engine
// ============================================================================

/// hls.js instance bound to the session's `<video>` element
pub struct HlsStream {
    hls: Hls,
    on_error: Option<Closure<dyn FnMut(JsValue, JsValue)>>,
}

impl HlsStream {
    fn create(
        spec: &EngineSpec<'_>,
        video: &HtmlVideoElement,
        shared: Weak<Shared>,
    ) -> Result<Self, JsValue> {
        let config = serde_wasm_bindgen::to_value(&HlsConfig {
            enable_worker: spec.config.stream.enable_worker,
        })
        .map_err(JsValue::from)?;
        let hls = Hls::new(&config)?;

        let generation = spec.generation;
        let on_error = Closure::<dyn FnMut(JsValue, JsValue)>::new(
            move |_event: JsValue, data: JsValue| {
                route_engine(&shared, generation, hls::error_event(&data));
            },
        );
        hls.on(hls::HLS_ERROR, on_error.as_ref().unchecked_ref());
        hls.load_source(spec.source.as_str());
        hls.attach_media(video);

        Ok(Self {
            hls,
            on_error: Some(on_error),
        })
    }
}

impl StreamEngine for HlsStream {}

impl Dispose for HlsStream {
    fn dispose(&mut self) {
        if let Some(on_error) = self.on_error.take() {
            self.hls.off(hls::HLS_ERROR, on_error.as_ref().unchecked_ref());
            defer_drop(on_error);
        }
        self.hls.destroy();
    }
}

// ============================================================================
// Viewport Watch
// ============================================================================

type ObserverCallback = Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>;

/// Observers feeding the mini-player tracker
pub struct WebViewport {
    window: Window,
    observer: Option<(IntersectionObserver, ObserverCallback)>,
    frames: Option<FrameSampler>,
    listeners: Vec<(EventTarget, &'static str, Listener)>,
}

impl WebViewport {
    fn create(
        window: &Window,
        document: &Document,
        container: &HtmlElement,
        spec: &EngineSpec<'_>,
        shared: Weak<Shared>,
    ) -> Result<Self, JsValue> {
        let generation = spec.generation;
        let mini = &spec.config.mini;
        let mobile = is_mobile_agent(window);

        let mut watch = Self {
            window: window.clone(),
            observer: None,
            frames: None,
            listeners: Vec::new(),
        };

        route_viewport(
            &shared,
            generation,
            ViewportEvent::Resize {
                width: effective_width(window, mobile),
            },
        );

        if mini.trigger == MiniTrigger::Intersection && intersection_supported(window) {
            let weak = shared.clone();
            let callback = ObserverCallback::new(
                move |entries: js_sys::Array, _observer: IntersectionObserver| {
                    for entry in entries.iter() {
                        if let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() {
                            route_viewport(
                                &weak,
                                generation,
                                ViewportEvent::Intersection {
                                    ratio: entry.intersection_ratio(),
                                },
                            );
                        }
                    }
                },
            );

            let thresholds = js_sys::Array::new();
            for ratio in mini.observer_thresholds() {
                thresholds.push(&JsValue::from_f64(ratio));
            }
            let init = IntersectionObserverInit::new();
            init.set_threshold(&thresholds);

            let observer =
                IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init)?;
            observer.observe(container);
            watch.observer = Some((observer, callback));
        } else {
            watch.frames = Some(FrameSampler::start(
                window,
                container,
                generation,
                shared.clone(),
            )?);
        }

        {
            let window_handle = window.clone();
            let weak = shared.clone();
            watch.listen(window, "scroll", move |_| {
                let scroll_y = window_handle.scroll_y().unwrap_or(0.0);
                route_viewport(&weak, generation, ViewportEvent::Scroll { scroll_y });
            })?;
        }
        {
            let window_handle = window.clone();
            let weak = shared.clone();
            watch.listen(window, "resize", move |_| {
                let width = effective_width(&window_handle, mobile);
                route_viewport(&weak, generation, ViewportEvent::Resize { width });
            })?;
        }
        {
            let document_handle = document.clone();
            let weak = shared;
            watch.listen(document, "fullscreenchange", move |_| {
                let active = document_handle.fullscreen_element().is_some();
                route_viewport(&weak, generation, ViewportEvent::Fullscreen { active });
            })?;
        }

        Ok(watch)
    }

    fn listen(
        &mut self,
        target: &EventTarget,
        name: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> Result<(), JsValue> {
        let listener = Listener::new(handler);
        target.add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())?;
        self.listeners.push((target.clone(), name, listener));
        Ok(())
    }
}

impl ViewportWatch for WebViewport {}

impl Dispose for WebViewport {
    fn dispose(&mut self) {
        if let Some((observer, callback)) = self.observer.take() {
            observer.disconnect();
            defer_drop(callback);
        }
        if let Some(mut frames) = self.frames.take() {
            frames.cancel(&self.window);
        }
        for (target, name, listener) in &self.listeners {
            let _ = target.remove_event_listener_with_callback(name, listener.as_ref().unchecked_ref());
        }
        defer_drop(std::mem::take(&mut self.listeners));
    }
}

/// Samples the container's bounding rect once per animation frame
struct FrameSampler {
    handle: Rc<Cell<Option<i32>>>,
    tick: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
}

impl FrameSampler {
    fn start(
        window: &Window,
        container: &HtmlElement,
        generation: Generation,
        shared: Weak<Shared>,
    ) -> Result<Self, JsValue> {
        let handle = Rc::new(Cell::new(None));
        let tick: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));

        let closure = {
            let window = window.clone();
            let container = container.clone();
            let handle = handle.clone();
            let slot = Rc::downgrade(&tick);
            Closure::<dyn FnMut()>::new(move || {
                let rect = container.get_bounding_client_rect();
                route_viewport(
                    &shared,
                    generation,
                    ViewportEvent::Bounds {
                        top: rect.top(),
                        bottom: rect.bottom(),
                    },
                );

                // Cancelled during routing
                let Some(slot) = slot.upgrade() else { return };
                let next = slot
                    .borrow()
                    .as_ref()
                    .and_then(|cb| window.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
                handle.set(next);
            })
        };

        handle.set(Some(
            window.request_animation_frame(closure.as_ref().unchecked_ref())?,
        ));
        *tick.borrow_mut() = Some(closure);

        Ok(Self { handle, tick })
    }

    fn cancel(&mut self, window: &Window) {
        if let Some(id) = self.handle.take() {
            let _ = window.cancel_animation_frame(id);
        }
        if let Some(closure) = self.tick.borrow_mut().take() {
            defer_drop(closure);
        }
    }
}

fn intersection_supported(window: &Window) -> bool {
    Reflect::has(window, &JsValue::from_str("IntersectionObserver")).unwrap_or(false)
}

fn is_mobile_agent(window: &Window) -> bool {
    window
        .navigator()
        .user_agent()
        .map(|agent| agent_is_mobile(&agent))
        .unwrap_or(false)
}

fn agent_is_mobile(agent: &str) -> bool {
    const MOBILE_AGENTS: [&str; 5] = ["Android", "iPhone", "iPad", "iPod", "Mobile"];
    MOBILE_AGENTS.iter().any(|m| agent.contains(m))
}

fn effective_width(window: &Window, mobile: bool) -> f64 {
    gated_width(mobile, window.inner_width().ok().and_then(|w| w.as_f64()))
}

/// Viewport width as the mini tracker sees it; mobile agents report zero so
/// the mini player stays disabled regardless of screen size
fn gated_width(mobile: bool, inner_width: Option<f64>) -> f64 {
    if mobile {
        return 0.0;
    }
    inner_width.unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mobile_agents() {
        assert!(agent_is_mobile(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15"
        ));
        assert!(agent_is_mobile(
            "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 Chrome/120.0 Mobile"
        ));
        assert!(!agent_is_mobile(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36"
        ));
    }

    #[test]
    fn test_mobile_width_disables_mini() {
        assert_eq!(gated_width(true, Some(1280.0)), 0.0);
        assert_eq!(gated_width(false, Some(1280.0)), 1280.0);
        assert_eq!(gated_width(false, None), 0.0);
    }

    #[test]
    fn test_inline_attributes() {
        let names: Vec<&str> = INLINE_ATTRIBUTES.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            [
                "playsinline",
                "webkit-playsinline",
                "x5-video-player-type",
                "x5-video-player-fullscreen",
            ]
        );
        assert!(INLINE_ATTRIBUTES.contains(&("x5-video-player-fullscreen", "true")));
    }
}
