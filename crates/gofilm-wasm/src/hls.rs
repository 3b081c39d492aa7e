//! hls.js bindings
//!
//! hls.js is loaded by the page as the global `Hls`. Only the handful of
//! calls the stream engine needs are bound here.

use gofilm_core::{EngineEvent, ErrorSource, FatalErrorDetail, FatalErrorKind};
use js_sys::{Function, Reflect};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use web_sys::HtmlMediaElement;

/// `Hls.Events.ERROR`
pub const HLS_ERROR: &str = "hlsError";

#[wasm_bindgen]
extern "C" {
    #[derive(Debug, Clone)]
    pub type Hls;

    #[wasm_bindgen(static_method_of = Hls, js_name = isSupported)]
    fn is_supported() -> bool;

    #[wasm_bindgen(constructor, catch)]
    pub fn new(config: &JsValue) -> Result<Hls, JsValue>;

    #[wasm_bindgen(method, js_name = loadSource)]
    pub fn load_source(this: &Hls, url: &str);

    #[wasm_bindgen(method, js_name = attachMedia)]
    pub fn attach_media(this: &Hls, media: &HtmlMediaElement);

    #[wasm_bindgen(method)]
    pub fn on(this: &Hls, event: &str, callback: &Function);

    #[wasm_bindgen(method)]
    pub fn off(this: &Hls, event: &str, callback: &Function);

    #[wasm_bindgen(method)]
    pub fn destroy(this: &Hls);
}

/// Constructor options, serialized to the object hls.js expects
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HlsConfig {
    pub enable_worker: bool,
}

/// hls.js is loaded and Media Source Extensions are available
pub fn is_available() -> bool {
    let loaded = Reflect::has(&js_sys::global(), &JsValue::from_str("Hls")).unwrap_or(false);
    loaded && Hls::is_supported()
}

/// Map the payload of an `hlsError` callback to an engine event
pub fn error_event(data: &JsValue) -> EngineEvent {
    let field = |name: &str| Reflect::get(data, &JsValue::from_str(name)).ok();
    let fatal = field("fatal").and_then(|v| v.as_bool()).unwrap_or(false);
    let error_type = field("type").and_then(|v| v.as_string()).unwrap_or_default();
    let details = field("details").and_then(|v| v.as_string()).unwrap_or_default();
    map_error(fatal, error_type, details)
}

fn map_error(fatal: bool, error_type: String, details: String) -> EngineEvent {
    if !fatal {
        return EngineEvent::Warning { message: details };
    }

    let detail = FatalErrorDetail::new(
        ErrorSource::Stream,
        FatalErrorKind::from_stream_type(&error_type),
        format!("{}: {}", error_type, details),
    )
    .with_details(serde_json::json!({
        "type": error_type,
        "details": details,
    }));
    EngineEvent::Fatal { detail }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_fatal_error_is_warning() {
        let event = map_error(false, "networkError".into(), "fragLoadError".into());
        assert_eq!(
            event,
            EngineEvent::Warning {
                message: "fragLoadError".to_string()
            }
        );
    }

    #[test]
    fn test_fatal_error_kind_mapping() {
        let cases = [
            ("networkError", FatalErrorKind::Network),
            ("mediaError", FatalErrorKind::Media),
            ("otherError", FatalErrorKind::Other),
        ];
        for (error_type, kind) in cases {
            let EngineEvent::Fatal { detail } =
                map_error(true, error_type.into(), "manifestLoadError".into())
            else {
                panic!("expected fatal event for {}", error_type);
            };
            assert_eq!(detail.kind, kind);
            assert_eq!(detail.source, ErrorSource::Stream);
            assert_eq!(detail.message, format!("{}: manifestLoadError", error_type));
        }
    }

    #[test]
    fn test_fatal_error_keeps_raw_fields() {
        let EngineEvent::Fatal { detail } =
            map_error(true, "networkError".into(), "manifestLoadError".into())
        else {
            panic!("expected fatal event");
        };
        assert_eq!(
            detail.details,
            serde_json::json!({
                "type": "networkError",
                "details": "manifestLoadError",
            })
        );
    }
}
