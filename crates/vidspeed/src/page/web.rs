//! Browser page bindings for the content-script build
//!
//! Only compiled with the `wasm` feature.

use super::{MediaElement, MediaPage, MAX_RATE, MIN_RATE};
use crate::advisory::Advisory;
use crate::controller::SpeedController;
use crate::error::MediaError;
use crate::host::{self, ReportSink};
use crate::message::{self, StatusReport};
use js_sys::Function;
use tokio::sync::broadcast;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{console, Document, HtmlElement, HtmlMediaElement};

const ADVISORY_ID: &str = "speed-notification";

const ADVISORY_STYLE: [(&str, &str); 10] = [
    ("position", "fixed"),
    ("top", "20px"),
    ("right", "20px"),
    ("background", "rgba(0, 0, 0, 0.8)"),
    ("color", "white"),
    ("padding", "10px 20px"),
    ("border-radius", "5px"),
    ("font-size", "16px"),
    ("z-index", "10000"),
    ("transition", "opacity 0.3s ease"),
];

/// A `<video>` or `<audio>` element
#[derive(Debug, Clone)]
pub struct WebMedia {
    element: HtmlMediaElement,
}

impl MediaElement for WebMedia {
    fn playback_rate(&self) -> f64 {
        self.element.playback_rate()
    }

    fn set_playback_rate(&self, rate: f64) -> Result<(), MediaError> {
        if !self.element.is_connected() {
            return Err(MediaError::Detached);
        }
        if !rate.is_finite() || !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(MediaError::UnsupportedRate { rate });
        }
        self.element.set_playback_rate(rate);
        Ok(())
    }

    fn paused(&self) -> bool {
        self.element.paused()
    }

    fn current_time(&self) -> f64 {
        self.element.current_time()
    }
}

/// The document the content script runs in
#[derive(Debug, Clone)]
pub struct WebPage {
    document: Document,
}

impl WebPage {
    /// Page of the current window, if there is one
    pub fn current() -> Option<Self> {
        let document = web_sys::window()?.document()?;
        Some(Self { document })
    }

    fn remove_advisory(&self) {
        if let Some(existing) = self.document.get_element_by_id(ADVISORY_ID) {
            existing.remove();
        }
    }

    fn build_advisory(&self, advisory: &Advisory) -> Result<HtmlElement, JsValue> {
        let element: HtmlElement = self.document.create_element("div")?.dyn_into()?;
        element.set_id(ADVISORY_ID);
        element.set_text_content(Some(&advisory.text));
        let style = element.style();
        for (property, value) in ADVISORY_STYLE {
            style.set_property(property, value)?;
        }
        let body = self
            .document
            .body()
            .ok_or_else(|| JsValue::from_str("document has no body"))?;
        body.append_child(&element)?;
        Ok(element)
    }

    fn schedule_dismissal(element: HtmlElement, advisory: &Advisory) -> Result<(), JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let fading = element.clone();
        let fade = Closure::once_into_js(move || {
            // Failure to restyle only skips the fade
            let _ = fading.style().set_property("opacity", "0");
        });
        let remove = Closure::once_into_js(move || element.remove());
        let ttl = advisory.ttl.as_millis() as i32;
        let gone = (advisory.ttl + advisory.fade).as_millis() as i32;
        window.set_timeout_with_callback_and_timeout_and_arguments_0(fade.unchecked_ref(), ttl)?;
        window.set_timeout_with_callback_and_timeout_and_arguments_0(remove.unchecked_ref(), gone)?;
        Ok(())
    }
}

impl MediaPage for WebPage {
    type Element = WebMedia;

    fn media_elements(&self) -> Vec<WebMedia> {
        let Ok(nodes) = self.document.query_selector_all("video, audio") else {
            return Vec::new();
        };
        (0..nodes.length())
            .filter_map(|i| nodes.item(i))
            .filter_map(|node| node.dyn_into::<HtmlMediaElement>().ok())
            .map(|element| WebMedia { element })
            .collect()
    }

    fn render_advisory(&self, advisory: &Advisory) {
        self.remove_advisory();
        let rendered = self
            .build_advisory(advisory)
            .and_then(|element| Self::schedule_dismissal(element, advisory));
        if let Err(e) = rendered {
            warn!(error = ?e, "failed to render advisory");
        }
    }
}

/// Content-script entry point owning the page's controller
#[derive(Debug)]
#[wasm_bindgen]
pub struct ContentScript {
    controller: SpeedController<WebPage>,
    reports: broadcast::Receiver<StatusReport>,
    on_report: Function,
}

#[wasm_bindgen]
impl ContentScript {
    /// Attach a controller to the current document
    ///
    /// `on_report` receives every status report as a JSON string, typically
    /// forwarding it with `chrome.runtime.sendMessage`.
    #[wasm_bindgen(constructor)]
    pub fn new(on_report: Function) -> Result<ContentScript, JsValue> {
        console_error_panic_hook::set_once();
        let page = WebPage::current().ok_or_else(|| JsValue::from_str("no document"))?;
        let (sender, reports) = broadcast::channel(16);
        console::log_1(&"video speed controller loaded".into());
        Ok(Self {
            controller: SpeedController::new(page, ReportSink::new(sender)),
            reports,
            on_report,
        })
    }

    /// Handle one JSON request and return the JSON response
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&mut self, raw: &str) -> String {
        let response = self.controller.handle_message(raw);
        self.flush_reports();
        message::encode(&response).unwrap_or_else(|e| {
            warn!(error = %e, "failed to encode response");
            r#"{"success":false}"#.to_string()
        })
    }

    /// Recount media after a DOM mutation
    #[wasm_bindgen(js_name = onMutation)]
    pub fn on_mutation(&mut self) {
        self.controller.on_mutation();
        self.flush_reports();
    }

    /// Current playback multiplier held by the controller
    #[wasm_bindgen(getter, js_name = currentSpeed)]
    pub fn current_speed(&self) -> f64 {
        self.controller.current_speed()
    }
}

impl ContentScript {
    /// Post reports queued by the last call to the page's callback
    fn flush_reports(&mut self) {
        let on_report = &self.on_report;
        host::forward_reports(&mut self.reports, |json| {
            if let Err(e) = on_report.call1(&JsValue::NULL, &JsValue::from_str(json)) {
                warn!(error = ?e, "report callback failed");
            }
        });
    }
}
