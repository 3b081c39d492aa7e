//! Error surface rendered over the player container

use std::rc::Weak;

use gofilm_core::ErrorSurface;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, HtmlElement};

use crate::player::Shared;
use crate::web_engine::defer_drop;

const OVERLAY_CLASS: &str = "gofilm-player__error";

type Listener = Closure<dyn FnMut(Event)>;

pub(crate) struct ErrorOverlay {
    root: Element,
    buttons: Vec<(Element, Listener)>,
}

impl ErrorOverlay {
    pub(crate) fn show(
        document: &Document,
        container: &HtmlElement,
        surface: &ErrorSurface,
        shared: Weak<Shared>,
    ) -> Result<Self, JsValue> {
        let root = document.create_element("div")?;
        root.set_class_name(OVERLAY_CLASS);

        let title = document.create_element("h3")?;
        title.set_text_content(Some(&surface.title));
        root.append_child(&title)?;

        let message = document.create_element("p")?;
        message.set_text_content(Some(&surface.message));
        root.append_child(&message)?;

        let mut overlay = Self {
            root,
            buttons: Vec::new(),
        };

        if surface.retry_available {
            let weak = shared.clone();
            overlay.button(document, "Retry", move |_| {
                if let Some(shared) = weak.upgrade() {
                    if let Err(e) = shared.retry() {
                        web_sys::console::error_2(&"[GoFilm] Retry failed:".into(), &e);
                    }
                }
            })?;
        }
        if surface.reload_available {
            overlay.button(document, "Reload page", move |_| {
                if let Some(shared) = shared.upgrade() {
                    shared.request_reload();
                }
            })?;
        }

        container.append_child(&overlay.root)?;
        Ok(overlay)
    }

    fn button(
        &mut self,
        document: &Document,
        label: &str,
        on_click: impl FnMut(Event) + 'static,
    ) -> Result<(), JsValue> {
        let button = document.create_element("button")?;
        button.set_class_name(&format!("{}-action", OVERLAY_CLASS));
        button.set_text_content(Some(label));

        let listener = Listener::new(on_click);
        button.add_event_listener_with_callback("click", listener.as_ref().unchecked_ref())?;
        self.root.append_child(&button)?;
        self.buttons.push((button, listener));
        Ok(())
    }

    pub(crate) fn remove(mut self) {
        for (button, listener) in &self.buttons {
            let _ = button.remove_event_listener_with_callback("click", listener.as_ref().unchecked_ref());
        }
        defer_drop(std::mem::take(&mut self.buttons));
        self.root.remove();
    }
}
