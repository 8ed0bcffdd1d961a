//! Browser capability drivers.
//!
//! The plugin core never touches the DOM directly; it talks to a
//! [`MetrikaDriver`], the injected capability covering the global `ym` slot
//! and the one-time tag-script insertion. Non-browser targets get a
//! [`HeadlessDriver`] that turns every lifecycle call into a safe no-op,
//! wasm targets with the `wasm-web` feature get the real DOM driver, and
//! tests (including a host application's own) get [`SimulatedBrowser`].

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::channel::{ChannelPhase, Command, CommandChannel, CommandSink};

pub trait MetrikaDriver: Send + Sync {
    /// Whether a document and a window-equivalent global are present.
    fn is_browser_context(&self) -> bool;

    /// Whether the global slot currently holds something callable.
    fn has_callable(&self) -> bool;

    /// Installs the queueing stub when the slot is vacant. Returns whether
    /// a new stub was installed.
    fn ensure_stub(&self) -> bool;

    /// Inserts the tag script before the first existing script element,
    /// once per URL. Returns whether a tag was actually inserted.
    fn inject_tag_script(&self, url: &str) -> bool;

    /// Fire-and-forget dispatch through the global slot.
    fn invoke(&self, command: Command);

    /// Current page location, when the driver has one.
    fn current_url(&self) -> Option<String>;
}

pub(crate) fn default_driver() -> Arc<dyn MetrikaDriver> {
    #[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
    {
        Arc::new(dom::DomDriver::new())
    }
    #[cfg(not(all(feature = "wasm-web", target_arch = "wasm32")))]
    {
        Arc::new(HeadlessDriver)
    }
}

/// Server-side driver: not a browser, so every probe answers no and every
/// action is a no-op. Keeps `initialize` and `loaded` safe outside a page.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeadlessDriver;

impl MetrikaDriver for HeadlessDriver {
    fn is_browser_context(&self) -> bool {
        false
    }

    fn has_callable(&self) -> bool {
        false
    }

    fn ensure_stub(&self) -> bool {
        false
    }

    fn inject_tag_script(&self, _url: &str) -> bool {
        false
    }

    fn invoke(&self, _command: Command) {}

    fn current_url(&self) -> Option<String> {
        None
    }
}

/// In-memory page standing in for a real browser window. Owns its own
/// [`CommandChannel`], records script insertions, and can simulate the
/// vendor takeover with [`go_live`](SimulatedBrowser::go_live).
#[derive(Clone)]
pub struct SimulatedBrowser {
    page: Arc<SimulatedPage>,
}

struct SimulatedPage {
    channel: CommandChannel,
    location: Mutex<String>,
    injected_urls: Mutex<Vec<String>>,
    dispatched: Arc<Mutex<Vec<Command>>>,
}

struct PageSink {
    dispatched: Arc<Mutex<Vec<Command>>>,
}

impl CommandSink for PageSink {
    fn dispatch(&self, command: Command) {
        self.dispatched.lock().unwrap().push(command);
    }
}

impl SimulatedBrowser {
    pub fn new() -> Self {
        Self::with_location("https://example.com/")
    }

    pub fn with_location(url: impl Into<String>) -> Self {
        Self {
            page: Arc::new(SimulatedPage {
                channel: CommandChannel::new(),
                location: Mutex::new(url.into()),
                injected_urls: Mutex::new(Vec::new()),
                dispatched: Arc::new(Mutex::new(Vec::new())),
            }),
        }
    }

    pub fn set_location(&self, url: impl Into<String>) {
        *self.page.location.lock().unwrap() = url.into();
    }

    /// Simulates the remote tag script finishing its load and taking over
    /// the slot: the stub backlog is replayed into the page's record.
    pub fn go_live(&self) {
        self.page.channel.promote(Arc::new(PageSink {
            dispatched: Arc::clone(&self.page.dispatched),
        }));
    }

    /// Simulates the global slot being cleared by foreign page code.
    pub fn clear_channel(&self) {
        self.page.channel.clear();
    }

    pub fn phase(&self) -> ChannelPhase {
        self.page.channel.phase()
    }

    pub fn stub_marker_ms(&self) -> Option<i64> {
        self.page.channel.stub_marker_ms()
    }

    pub fn script_insertions(&self) -> usize {
        self.page.injected_urls.lock().unwrap().len()
    }

    pub fn injected_urls(&self) -> Vec<String> {
        self.page.injected_urls.lock().unwrap().clone()
    }

    /// Commands replayed or forwarded after `go_live`.
    pub fn dispatched(&self) -> Vec<Command> {
        self.page.dispatched.lock().unwrap().clone()
    }

    /// Everything the channel has seen, in order: live dispatches followed
    /// by whatever is still queued in the stub. Exactly one of the two is
    /// non-empty at any time.
    pub fn commands(&self) -> Vec<Command> {
        let mut commands = self.dispatched();
        commands.extend(self.page.channel.queued());
        commands
    }
}

impl Default for SimulatedBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SimulatedBrowser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedBrowser")
            .field("phase", &self.phase())
            .field("script_insertions", &self.script_insertions())
            .finish()
    }
}

impl MetrikaDriver for SimulatedBrowser {
    fn is_browser_context(&self) -> bool {
        true
    }

    fn has_callable(&self) -> bool {
        self.page.channel.is_callable()
    }

    fn ensure_stub(&self) -> bool {
        self.page.channel.install_stub()
    }

    fn inject_tag_script(&self, url: &str) -> bool {
        let mut injected = self.page.injected_urls.lock().unwrap();
        if injected.iter().any(|existing| existing == url) {
            return false;
        }
        injected.push(url.to_owned());
        true
    }

    fn invoke(&self, command: Command) {
        self.page.channel.invoke(command);
    }

    fn current_url(&self) -> Option<String> {
        Some(self.page.location.lock().unwrap().clone())
    }
}

#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
mod dom {
    use super::*;

    use js_sys::{Array, Function, Reflect};
    use wasm_bindgen::{JsCast, JsValue};

    use crate::constants::GLOBAL_CHANNEL_NAME;

    /// Stub body installed on `window.ym`: queues `arguments` onto `ym.a`
    /// and swallows the call if the slot has been cleared meanwhile.
    const STUB_BODY: &str = "var m = window.ym; \
         if (!m) { return; } \
         m.a = m.a || []; \
         m.a.push(Array.prototype.slice.call(arguments));";

    /// Driver for real browser pages.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct DomDriver;

    impl DomDriver {
        pub fn new() -> Self {
            Self
        }
    }

    fn global_slot() -> Option<JsValue> {
        let window = web_sys::window()?;
        let value = Reflect::get(window.as_ref(), &JsValue::from_str(GLOBAL_CHANNEL_NAME)).ok()?;
        if value.is_null() || value.is_undefined() {
            None
        } else {
            Some(value)
        }
    }

    fn global_callable() -> Option<Function> {
        global_slot()?.dyn_into::<Function>().ok()
    }

    impl MetrikaDriver for DomDriver {
        fn is_browser_context(&self) -> bool {
            web_sys::window().and_then(|window| window.document()).is_some()
        }

        fn has_callable(&self) -> bool {
            global_callable().is_some()
        }

        fn ensure_stub(&self) -> bool {
            let Some(window) = web_sys::window() else {
                return false;
            };
            if global_slot().is_some() {
                return false;
            }
            let stub = Function::new_no_args(STUB_BODY);
            let name = JsValue::from_str(GLOBAL_CHANNEL_NAME);
            if Reflect::set(window.as_ref(), &name, stub.as_ref()).is_err() {
                return false;
            }
            let marker = JsValue::from_f64(js_sys::Date::now());
            let _ = Reflect::set(stub.as_ref(), &JsValue::from_str("l"), &marker);
            true
        }

        fn inject_tag_script(&self, url: &str) -> bool {
            let Some(document) = web_sys::window().and_then(|window| window.document()) else {
                return false;
            };
            let selector = format!("script[src=\"{url}\"]");
            if document.query_selector(&selector).ok().flatten().is_some() {
                return false;
            }

            let script = match document
                .create_element("script")
                .ok()
                .and_then(|element| element.dyn_into::<web_sys::HtmlScriptElement>().ok())
            {
                Some(script) => script,
                None => {
                    log::debug!("yandexMetrika: could not create the tag script element");
                    return false;
                }
            };
            script.set_async(true);
            script.set_src(url);

            // Before the first script tag when one exists; the tag expects
            // previously parsed inline scripts to have run.
            let anchor = document.get_elements_by_tag_name("script").item(0);
            let inserted = match anchor.and_then(|first| {
                first
                    .parent_node()
                    .map(|parent| parent.insert_before(&script, Some(first.as_ref())))
            }) {
                Some(result) => result.is_ok(),
                None => match document.head() {
                    Some(head) => head.append_child(&script).is_ok(),
                    None => false,
                },
            };
            if !inserted {
                log::debug!("yandexMetrika: tag script insertion failed");
            }
            inserted
        }

        fn invoke(&self, command: Command) {
            let Some(callable) = global_callable() else {
                return;
            };
            let args = Array::new();
            for value in command.invocation_args() {
                match js_sys::JSON::parse(&value.to_string()) {
                    Ok(js_value) => args.push(&js_value),
                    Err(_) => return,
                };
            }
            if callable.apply(&JsValue::UNDEFINED, &args).is_err() {
                log::debug!("yandexMetrika: {} command dispatch failed", command.kind);
            }
        }

        fn current_url(&self) -> Option<String> {
            web_sys::window()?.location().href().ok()
        }
    }
}

#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
pub use dom::DomDriver;
