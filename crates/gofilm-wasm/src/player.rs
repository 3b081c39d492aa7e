//! `GofilmPlayer`, the JavaScript-facing player
//!
//! Every DOM callback and host call goes through [`Shared`], which routes
//! events via [`Router`] so host callbacks never run while the controller
//! is borrowed.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use gofilm_core::{
    AttachOptions, EngineEvent, Generation, PlaybackController, PlaybackEvent, PlayerConfig,
    ViewportEvent,
};
use js_sys::{Function, Reflect};
use serde::Deserialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{console, Document, HtmlElement, Window};

use crate::overlay::ErrorOverlay;
use crate::router::Router;
use crate::web_engine::{SharedLink, WebEngineFactory};

const CONTAINER_CLASS: &str = "gofilm-player";

type Controller = PlaybackController<WebEngineFactory>;

/// Host callbacks, replaced wholesale by `setCallbacks`
#[derive(Default, Clone)]
struct HostCallbacks {
    on_progress: Option<Function>,
    on_ended: Option<Function>,
    on_error: Option<Function>,
    on_mini_mode: Option<Function>,
    on_state_change: Option<Function>,
    on_reload: Option<Function>,
}

impl HostCallbacks {
    fn from_js(value: &JsValue) -> Self {
        let get = |name: &str| {
            Reflect::get(value, &JsValue::from_str(name))
                .ok()
                .and_then(|v| v.dyn_into::<Function>().ok())
        };
        Self {
            on_progress: get("onProgress"),
            on_ended: get("onEnded"),
            on_error: get("onError"),
            on_mini_mode: get("onMiniMode"),
            on_state_change: get("onStateChange"),
            on_reload: get("onReload"),
        }
    }
}

/// Attach options as passed from JavaScript
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct JsAttachOptions {
    poster_url: Option<String>,
    autoplay: Option<bool>,
    /// Resume position in seconds
    initial_time: Option<f64>,
}

impl From<JsAttachOptions> for AttachOptions {
    fn from(options: JsAttachOptions) -> Self {
        let defaults = AttachOptions::default();
        AttachOptions {
            poster_url: options.poster_url,
            autoplay: options.autoplay.unwrap_or(defaults.autoplay),
            resume_offset_seconds: options.initial_time.unwrap_or(defaults.resume_offset_seconds),
        }
    }
}

fn to_js(error: gofilm_core::Error) -> JsValue {
    js_sys::Error::new(&format!("[{}] {}", error.error_code(), error)).into()
}

/// State shared between the player handle and every DOM callback
pub(crate) struct Shared {
    router: Router<WebEngineFactory>,
    callbacks: RefCell<HostCallbacks>,
    overlay: RefCell<Option<ErrorOverlay>>,
    window: Window,
    document: Document,
    container: HtmlElement,
}

impl Shared {
    pub(crate) fn route_engine(&self, generation: Generation, event: EngineEvent) {
        self.router.queue_engine(generation, event);
        self.flush();
    }

    pub(crate) fn route_viewport(&self, generation: Generation, event: ViewportEvent) {
        self.router.queue_viewport(generation, event);
        self.flush();
    }

    fn controller(&self) -> &RefCell<Controller> {
        self.router.controller()
    }

    fn controller_mut(&self) -> Result<RefMut<'_, Controller>, JsValue> {
        self.router
            .try_controller_mut()
            .ok_or_else(|| JsValue::from_str("player is busy"))
    }

    pub(crate) fn attach(&self, url: &str, options: AttachOptions) -> Result<Generation, JsValue> {
        self.hide_error();
        let result = self.controller_mut()?.attach(url, options);
        self.flush();
        result.map_err(to_js)
    }

    pub(crate) fn retry(&self) -> Result<Generation, JsValue> {
        self.hide_error();
        let result = self.controller_mut()?.retry();
        self.flush();
        result.map_err(to_js)
    }

    pub(crate) fn detach(&self) {
        self.hide_error();
        match self.router.try_controller_mut() {
            Some(mut controller) => controller.detach(),
            None => console::warn_1(&"[GoFilm] detach ignored: player is busy".into()),
        }
        self.flush();
    }

    pub(crate) fn request_reload(&self) {
        match self.router.try_controller_mut() {
            Some(mut controller) => controller.request_reload(),
            None => console::warn_1(&"[GoFilm] reload ignored: player is busy".into()),
        }
        self.flush();
    }

    /// Apply queued DOM events, then deliver controller events to the host
    pub(crate) fn flush(&self) {
        self.router.flush(|event| self.dispatch(event));
    }

    fn dispatch(&self, event: PlaybackEvent) {
        let callbacks = self.callbacks.borrow().clone();
        let result = match &event {
            PlaybackEvent::Progress {
                current_time,
                duration,
                ..
            } => call(&callbacks.on_progress, &[(*current_time).into(), (*duration).into()]),
            PlaybackEvent::Ended { .. } => call(&callbacks.on_ended, &[]),
            PlaybackEvent::FatalError { detail, .. } => {
                self.show_error();
                let detail = serde_wasm_bindgen::to_value(detail).unwrap_or(JsValue::NULL);
                call(&callbacks.on_error, &[detail])
            }
            PlaybackEvent::MiniModeChanged { mini, .. } => {
                call(&callbacks.on_mini_mode, &[(*mini).into()])
            }
            PlaybackEvent::StateChanged { to, .. } => {
                call(&callbacks.on_state_change, &[JsValue::from_str(&to.to_string())])
            }
            PlaybackEvent::ReloadRequested => match &callbacks.on_reload {
                Some(_) => call(&callbacks.on_reload, &[]),
                None => self.window.location().reload(),
            },
        };

        if let Err(e) = result {
            console::error_2(&"[GoFilm] Host callback failed:".into(), &e);
        }
    }

    fn show_error(&self) {
        if self.overlay.borrow().is_some() {
            return;
        }
        let surface = match self.controller().try_borrow() {
            Ok(controller) => controller.error_surface(),
            Err(_) => None,
        };
        let Some(surface) = surface else { return };

        // The overlay's buttons need a handle back to this state
        let Some(shared) = self.weak_self() else { return };
        match ErrorOverlay::show(&self.document, &self.container, &surface, shared) {
            Ok(overlay) => *self.overlay.borrow_mut() = Some(overlay),
            Err(e) => console::error_2(&"[GoFilm] Could not render error surface:".into(), &e),
        }
    }

    fn hide_error(&self) {
        let overlay = self.overlay.borrow_mut().take();
        if let Some(overlay) = overlay {
            overlay.remove();
        }
    }

    fn weak_self(&self) -> Option<std::rc::Weak<Shared>> {
        self.controller().try_borrow().ok().map(|c| c.factory().shared())
    }
}

fn call(callback: &Option<Function>, args: &[JsValue]) -> Result<(), JsValue> {
    let Some(callback) = callback else {
        return Ok(());
    };
    let this = JsValue::NULL;
    match args {
        [] => callback.call0(&this),
        [a] => callback.call1(&this, a),
        [a, b] => callback.call2(&this, a, b),
        _ => callback.apply(&this, &args.iter().collect()),
    }
    .map(|_| ())
}

/// Video player bound to a container element.
///
/// ```javascript
/// const player = new GofilmPlayer(document.getElementById('player'), { volume: 0.7 });
/// player.setCallbacks({
///   onProgress: (time, duration) => saveHistory(time, duration),
///   onEnded: () => playNext(),
///   onError: (detail) => console.warn(detail),
///   onMiniMode: (mini) => {},
/// });
/// player.attach('https://cdn.example.com/film/index.m3u8', { initialTime: 61.5 });
/// ```
#[wasm_bindgen]
pub struct GofilmPlayer {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl GofilmPlayer {
    /// Create a player inside `container`. `config` may be omitted.
    #[wasm_bindgen(constructor)]
    pub fn new(container: HtmlElement, config: JsValue) -> Result<GofilmPlayer, JsValue> {
        let config: PlayerConfig = if config.is_undefined() || config.is_null() {
            PlayerConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;

        let link = SharedLink::default();
        let factory = WebEngineFactory::new(
            window.clone(),
            document.clone(),
            container.clone(),
            link.clone(),
        );
        let (controller, events) = PlaybackController::new(factory, config).map_err(to_js)?;
        container.class_list().add_1(CONTAINER_CLASS)?;

        let shared = Rc::new(Shared {
            router: Router::new(controller, events),
            callbacks: RefCell::new(HostCallbacks::default()),
            overlay: RefCell::new(None),
            window,
            document,
            container,
        });
        // Nothing is attached yet, so no callback has seen the unbound link
        let _ = link.set(Rc::downgrade(&shared));

        Ok(Self { shared })
    }

    /// Start playback of `source_url`, tearing down any previous session.
    /// Returns the new session generation.
    pub fn attach(&self, source_url: &str, options: JsValue) -> Result<f64, JsValue> {
        let options: JsAttachOptions = if options.is_undefined() || options.is_null() {
            JsAttachOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)?
        };
        let generation = self.shared.attach(source_url, options.into())?;
        Ok(generation.0 as f64)
    }

    pub fn detach(&self) {
        self.shared.detach();
    }

    /// Rebuild the last session from scratch
    pub fn retry(&self) -> Result<f64, JsValue> {
        Ok(self.shared.retry()?.0 as f64)
    }

    /// Ask for a full page reload; handled by `onReload` when set
    pub fn reload(&self) {
        self.shared.request_reload();
    }

    #[wasm_bindgen(js_name = setPoster)]
    pub fn set_poster(&self, url: &str) -> Result<(), JsValue> {
        let result = self.shared.controller_mut()?.set_poster(url);
        self.shared.flush();
        result.map_err(to_js)
    }

    /// Replace all host callbacks at once
    #[wasm_bindgen(js_name = setCallbacks)]
    pub fn set_callbacks(&self, callbacks: JsValue) {
        *self.shared.callbacks.borrow_mut() = HostCallbacks::from_js(&callbacks);
    }

    #[wasm_bindgen(getter)]
    pub fn state(&self) -> Option<String> {
        let controller = self.shared.controller().try_borrow().ok()?;
        controller.state().map(|s| s.to_string())
    }

    #[wasm_bindgen(getter, js_name = isMiniMode)]
    pub fn is_mini_mode(&self) -> bool {
        self.shared
            .controller()
            .try_borrow()
            .map(|c| c.is_mini_mode())
            .unwrap_or(false)
    }

    #[wasm_bindgen(getter)]
    pub fn generation(&self) -> f64 {
        self.shared
            .controller()
            .try_borrow()
            .map(|c| c.generation().0 as f64)
            .unwrap_or(0.0)
    }

    /// Last reported position as `{ current_time, duration }`
    #[wasm_bindgen(js_name = lastPosition)]
    pub fn last_position(&self) -> JsValue {
        let progress = self
            .shared
            .controller()
            .try_borrow()
            .ok()
            .and_then(|c| c.last_position());
        match progress {
            Some(progress) => serde_wasm_bindgen::to_value(&progress).unwrap_or(JsValue::NULL),
            None => JsValue::NULL,
        }
    }
}

impl Drop for GofilmPlayer {
    fn drop(&mut self) {
        self.shared.detach();
        let _ = self.shared.container.class_list().remove_1(CONTAINER_CLASS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_options_defaults() {
        let options: AttachOptions = JsAttachOptions::default().into();
        assert_eq!(options.poster_url, None);
        assert!(options.autoplay);
        assert_eq!(options.resume_offset_seconds, 0.0);
    }

    #[test]
    fn test_attach_options_from_host_object() {
        let options: JsAttachOptions = serde_json::from_str(
            r#"{"posterUrl": "https://x/poster.jpg", "autoplay": false, "initialTime": 61.5}"#,
        )
        .unwrap();
        let options = AttachOptions::from(options);
        assert_eq!(options.poster_url.as_deref(), Some("https://x/poster.jpg"));
        assert!(!options.autoplay);
        assert_eq!(options.resume_offset_seconds, 61.5);

        let options: JsAttachOptions = serde_json::from_str(r#"{"initialTime": 12}"#).unwrap();
        let options = AttachOptions::from(options);
        assert!(options.autoplay);
        assert_eq!(options.resume_offset_seconds, 12.0);
    }
}
