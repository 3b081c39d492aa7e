//! GoFilm WASM - Browser bindings for the GoFilm player
//!
//! Runs the `gofilm-core` playback controller in the browser:
//! - `<video>` element playback with hls.js for HLS manifests
//! - Native HLS fallback where the browser plays manifests itself
//! - Mini player driven by IntersectionObserver
//! - Error surface with retry and page reload
//! - Watch history helpers
//!
//! ## Usage
//!
//! ```javascript
//! import init, { GofilmPlayer, GofilmHistory } from '@gofilm/wasm';
//!
//! await init();
//! const player = new GofilmPlayer(document.getElementById('player'));
//! player.attach(url, { posterUrl, initialTime: 61.5 });
//! ```
//!
//! hls.js must be loaded as the global `Hls` for HLS playback in browsers
//! without native support.

use wasm_bindgen::prelude::*;

mod hls;
mod history;
mod overlay;
mod player;
mod router;
mod web_engine;

pub use history::{is_playable_link, parse_resume_link, GofilmHistory};
pub use player::GofilmPlayer;
pub use web_engine::MINI_CLASS;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&format!("[GoFilm WASM] Initialized v{}", gofilm_core::VERSION).into());
}

/// Library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// MIME type of the media kind the player would pick for `url`
#[wasm_bindgen(js_name = probeSource)]
pub fn probe_source(url: &str) -> Result<String, JsValue> {
    gofilm_core::MediaSource::parse(url)
        .map(|source| source.kind().mime_type().to_string())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
