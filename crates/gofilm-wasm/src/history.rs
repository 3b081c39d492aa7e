//! Watch history for the browser, persisted by the host as a JSON string
//! (cookie or localStorage)

use chrono::DateTime;
use gofilm_core::{validate_playable_link, FilmRef, Progress, ResumeTarget, WatchHistory};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
#[derive(Default)]
pub struct GofilmHistory {
    inner: WatchHistory,
}

#[wasm_bindgen]
impl GofilmHistory {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored history; unreadable data yields an empty history
    #[wasm_bindgen(js_name = fromJson)]
    pub fn from_json(json: &str) -> Self {
        Self {
            inner: WatchHistory::from_json_lenient(json),
        }
    }

    #[wasm_bindgen(js_name = toJson)]
    pub fn to_json(&self) -> Result<String, JsValue> {
        self.inner
            .to_json()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Record the position reported by `onProgress`
    #[wasm_bindgen(js_name = recordProgress)]
    pub fn record_progress(
        &mut self,
        film: JsValue,
        episode_label: &str,
        source_id: &str,
        episode: usize,
        current_time: f64,
        duration: f64,
    ) -> Result<(), JsValue> {
        let film: FilmRef = serde_wasm_bindgen::from_value(film)?;
        let at = DateTime::from_timestamp_millis(js_sys::Date::now() as i64)
            .ok_or_else(|| JsValue::from_str("clock out of range"))?;
        self.inner.record_progress(
            &film,
            episode_label,
            source_id,
            episode,
            Progress::new(current_time, duration),
            at,
        );
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.inner.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Entries, most recently watched first
    pub fn list(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&self.inner.list())?)
    }

    #[wasm_bindgen(getter)]
    pub fn length(&self) -> usize {
        self.inner.len()
    }
}

/// Decode a play-page resume link into `{ film_id, source_id, episode, current_time }`
#[wasm_bindgen(js_name = parseResumeLink)]
pub fn parse_resume_link(link: &str) -> Result<JsValue, JsValue> {
    match ResumeTarget::parse(link) {
        Some(target) => Ok(serde_wasm_bindgen::to_value(&target)?),
        None => Ok(JsValue::NULL),
    }
}

/// Whether a user-supplied link can be played by the custom player page
#[wasm_bindgen(js_name = isPlayableLink)]
pub fn is_playable_link(link: &str) -> bool {
    validate_playable_link(link).is_ok()
}
