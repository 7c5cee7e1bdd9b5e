//! WebAssembly embed controller for the Embedframe iframe widget.
//!
//! This crate mounts the Embedframe application in an iframe on a host page
//! and mediates the typed message protocol between the two over
//! `window.postMessage`.
//!
//! # Protocol Flow
//!
//! ```text
//! Host page (this crate)                     Embedded iframe
//! ──────────────────────────────────────────────────────────
//! 1. EmbedController.init()
//!    builds the iframe URL, mounts the
//!    iframe, subscribes to window messages
//!
//!              ◄──────── { status: "ready" } ────────
//! 2. onReady callback
//! 3.           ──── { status: "acknowledged" } ─────►
//!
//!              ◄────── { status: "confirmed" } ──────
//! 4. onConfirmed callback
//! ```
//!
//! Inbound messages are accepted only from the trusted origin derived from
//! the configured base URL; outbound messages are addressed strictly to that
//! origin, never to `"*"`.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Function;
use thiserror::Error;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlIFrameElement, MessageEvent, Window};

pub mod config;
pub mod protocol;

use config::{EmbedConfig, MountTarget};
use protocol::{Ack, EmbedEvent};

/// Embed controller errors surfaced to the host page.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("mount failed: {0}")]
    Mount(String),
    #[error("transport unavailable: {0}")]
    Transport(String),
}

impl From<EmbedError> for JsValue {
    fn from(err: EmbedError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// State shared between the controller handle and its message listener.
struct Inner {
    config: EmbedConfig,
    /// The one owned iframe, present between `init` and `destroy`.
    iframe: Option<HtmlIFrameElement>,
    /// The registered message listener. Retained (not leaked with
    /// `Closure::forget`) so `destroy` can remove exactly what `init` added.
    listener: Option<Closure<dyn FnMut(MessageEvent)>>,
}

/// Controller for one embedded Embedframe instance.
///
/// Owns a single iframe, its trusted origin and a single window-level
/// `message` subscription. Construction validates the configuration;
/// [`init`](EmbedController::init) performs all side effects;
/// [`destroy`](EmbedController::destroy) tears them down and is always safe
/// to call. The controller may be re-initialized after `destroy`.
#[wasm_bindgen]
pub struct EmbedController {
    inner: Rc<RefCell<Inner>>,
}

#[wasm_bindgen]
impl EmbedController {
    /// Create a controller from a configuration object.
    ///
    /// See [`EmbedConfig::from_js`] for the accepted fields. Validation
    /// happens here, before any side effect: a rejected configuration leaves
    /// the page untouched.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<EmbedController, JsValue> {
        let config = EmbedConfig::from_js(&config)?;
        Ok(Self {
            inner: Rc::new(RefCell::new(Inner {
                config,
                iframe: None,
                listener: None,
            })),
        })
    }

    /// Mount the iframe and subscribe to inbound messages.
    ///
    /// Resolves the mount target, clears it, inserts a freshly created
    /// iframe pointed at the base URL with `origin`, `appId` and `debug`
    /// query parameters, then registers the message listener. Calling `init`
    /// on an already-initialized controller first tears the previous
    /// iframe and subscription down, so the single-iframe and
    /// single-subscription invariants hold across re-initialization.
    pub fn init(&self) -> Result<(), JsValue> {
        let window =
            web_sys::window().ok_or_else(|| EmbedError::Mount("no window available".into()))?;
        let document = window
            .document()
            .ok_or_else(|| EmbedError::Mount("no document available".into()))?;

        self.teardown(&window);

        let container = self.resolve_container(&document)?;

        let host_origin = window
            .location()
            .origin()
            .map_err(|_| EmbedError::Mount("could not determine host page origin".into()))?;
        let (src, debug, app_id, trusted_origin) = {
            let st = self.inner.borrow();
            (
                st.config.iframe_src(&host_origin)?,
                st.config.debug,
                st.config.app_id.clone(),
                st.config.trusted_origin.clone(),
            )
        };

        // Clear-and-recreate policy: the container is always emptied and a
        // fresh iframe inserted, never a pre-existing one reused.
        container.set_inner_html("");
        let iframe: HtmlIFrameElement = document
            .create_element("iframe")
            .map_err(|_| EmbedError::Mount("could not create iframe element".into()))?
            .unchecked_into();
        iframe.set_src(&src);
        container
            .append_child(&iframe)
            .map_err(|_| EmbedError::Mount("could not attach iframe to container".into()))?;
        self.inner.borrow_mut().iframe = Some(iframe);

        let inner = Rc::clone(&self.inner);
        let listener = Closure::wrap(Box::new(move |event: MessageEvent| {
            handle_message(&inner, &event);
        }) as Box<dyn FnMut(MessageEvent)>);
        window
            .add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())
            .map_err(|_| EmbedError::Mount("could not register message listener".into()))?;
        self.inner.borrow_mut().listener = Some(listener);

        if debug {
            log::info!("embedframe: initialized app {app_id} (trusted origin {trusted_origin})");
        }
        Ok(())
    }

    /// Remove the message subscription and the owned iframe.
    ///
    /// Idempotent: calling before `init`, or twice in a row, is a no-op.
    pub fn destroy(&self) {
        match web_sys::window() {
            Some(window) => self.teardown(&window),
            None => {
                let mut st = self.inner.borrow_mut();
                st.listener = None;
                st.iframe = None;
            }
        }
    }

    /// Post a payload to the embedded iframe, addressed to the trusted
    /// origin.
    ///
    /// Fails with a transport error when the controller is not initialized
    /// or the iframe's content window is unreachable; a silent no-op here
    /// would hide integration bugs.
    #[wasm_bindgen(js_name = "postMessage")]
    pub fn post_message(&self, payload: JsValue) -> Result<(), JsValue> {
        post_to_trusted(&self.inner, &payload).map_err(Into::into)
    }

    /// The origin inbound messages are filtered by and outbound messages are
    /// addressed to.
    #[wasm_bindgen(js_name = "trustedOrigin")]
    pub fn trusted_origin(&self) -> String {
        self.inner.borrow().config.trusted_origin.clone()
    }

    /// Whether the controller currently holds an active subscription.
    #[wasm_bindgen(js_name = "isInitialized")]
    pub fn is_initialized(&self) -> bool {
        self.inner.borrow().listener.is_some()
    }

    fn resolve_container(&self, document: &web_sys::Document) -> Result<Element, EmbedError> {
        let st = self.inner.borrow();
        match &st.config.target {
            MountTarget::Element(element) => Ok(element.clone()),
            MountTarget::Selector(selector) => document
                .query_selector(selector)
                .map_err(|_| EmbedError::Mount(format!("invalid selector: {selector}")))?
                .ok_or_else(|| {
                    EmbedError::Mount(format!("no element matches selector: {selector}"))
                }),
        }
    }

    fn teardown(&self, window: &Window) {
        let mut st = self.inner.borrow_mut();
        if let Some(listener) = st.listener.take() {
            let _ = window
                .remove_event_listener_with_callback("message", listener.as_ref().unchecked_ref());
        }
        if let Some(iframe) = st.iframe.take() {
            if iframe.parent_node().is_some() {
                iframe.remove();
            }
        }
    }
}

/// Route one inbound window message.
///
/// Never raises: the message event loop has no error channel. Untrusted
/// origins are dropped silently; that comparison is the sole security
/// boundary.
fn handle_message(inner: &Rc<RefCell<Inner>>, event: &MessageEvent) {
    let (trusted_origin, debug, on_ready, on_confirmed) = {
        let st = inner.borrow();
        (
            st.config.trusted_origin.clone(),
            st.config.debug,
            st.config.on_ready.clone(),
            st.config.on_confirmed.clone(),
        )
    };

    if event.origin() != trusted_origin {
        return;
    }

    let payload = event.data();
    if debug {
        log::debug!("embedframe: message from {trusted_origin}: {payload:?}");
    }

    match EmbedEvent::classify(protocol::status_of(&payload).as_deref()) {
        EmbedEvent::Ready => {
            invoke_callback(inner, on_ready.as_ref(), "onReady", &payload);
            // Acknowledge even when the callback threw: the iframe waits on
            // receipt confirmation, not on callback success.
            match serde_wasm_bindgen::to_value(&Ack::new()) {
                Ok(ack) => {
                    if let Err(err) = post_to_trusted(inner, &ack) {
                        log::warn!("embedframe: could not acknowledge ready: {err}");
                    }
                }
                Err(err) => log::warn!("embedframe: could not encode acknowledgment: {err}"),
            }
        }
        EmbedEvent::Confirmed => {
            invoke_callback(inner, on_confirmed.as_ref(), "onConfirmed", &payload);
        }
        EmbedEvent::Unrecognized => {
            if debug {
                log::debug!("embedframe: ignoring message with unrecognized status");
            }
        }
    }
}

/// Invoke a host callback with `(payload, controller)`.
///
/// Exceptions are logged and swallowed. No `RefCell` borrow is held across
/// the call: the callback may re-enter through `postMessage` on the handle
/// it receives.
fn invoke_callback(
    inner: &Rc<RefCell<Inner>>,
    callback: Option<&Function>,
    name: &str,
    payload: &JsValue,
) {
    let Some(callback) = callback else {
        return;
    };
    let controller = EmbedController {
        inner: Rc::clone(inner),
    };
    if let Err(err) = callback.call2(&JsValue::NULL, payload, &JsValue::from(controller)) {
        log::warn!("embedframe: {name} callback threw: {err:?}");
    }
}

fn post_to_trusted(inner: &Rc<RefCell<Inner>>, payload: &JsValue) -> Result<(), EmbedError> {
    let st = inner.borrow();
    let iframe = st
        .iframe
        .as_ref()
        .ok_or_else(|| EmbedError::Transport("no iframe is mounted; call init() first".into()))?;
    let target = iframe
        .content_window()
        .ok_or_else(|| EmbedError::Transport("iframe content window is unreachable".into()))?;
    target
        .post_message(payload, &st.config.trusted_origin)
        .map_err(|_| EmbedError::Transport("posting to the iframe failed".into()))
}

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn start() {
    // Panic hook for readable errors in the browser console
    console_error_panic_hook::set_once();
    // May already be installed when the module is reloaded
    let _ = console_log::init_with_level(log::Level::Debug);
}

/// Test function to verify the WASM module loads correctly.
#[wasm_bindgen]
pub fn ping() -> String {
    "embedframe-wasm loaded".to_string()
}
