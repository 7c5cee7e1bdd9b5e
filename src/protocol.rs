//! Message protocol between the host page and the embedded iframe.
//!
//! Every protocol message is a JSON-shaped object carrying a `status`
//! discriminator. The iframe sends `"ready"` once it has booted and
//! `"confirmed"` once the user has completed the embedded flow; the host
//! replies to `"ready"` with `"acknowledged"`. Payloads may carry any other
//! fields — the controller only routes on the discriminator and hands the
//! full payload to the host callbacks untouched.

use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;

/// Discriminator value sent by the iframe once it has booted.
pub const STATUS_READY: &str = "ready";
/// Discriminator value sent by the iframe once the flow is complete.
pub const STATUS_CONFIRMED: &str = "confirmed";
/// Discriminator value of the host's reply to `"ready"`.
pub const STATUS_ACKNOWLEDGED: &str = "acknowledged";

/// Minimal view of an inbound payload: only the discriminator matters.
///
/// Unknown fields are ignored so the iframe is free to attach extra data.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Protocol discriminator. Absent on non-protocol messages.
    pub status: Option<String>,
}

/// Acknowledgment reply sent in response to `"ready"`.
#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    pub status: &'static str,
}

impl Ack {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: STATUS_ACKNOWLEDGED,
        }
    }
}

impl Default for Ack {
    fn default() -> Self {
        Self::new()
    }
}

/// Routing decision for an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedEvent {
    /// Iframe booted; invoke `onReady`, then acknowledge.
    Ready,
    /// Flow completed; invoke `onConfirmed`, no reply.
    Confirmed,
    /// Valid message, but not one we route. Ignored.
    Unrecognized,
}

impl EmbedEvent {
    /// Classify an inbound discriminator.
    ///
    /// Unknown values and absent discriminators are valid but ignored — the
    /// window-level message stream carries plenty of unrelated traffic even
    /// from the trusted origin.
    #[must_use]
    pub fn classify(status: Option<&str>) -> Self {
        match status {
            Some(STATUS_READY) => Self::Ready,
            Some(STATUS_CONFIRMED) => Self::Confirmed,
            _ => Self::Unrecognized,
        }
    }
}

/// Extract the `status` discriminator from a raw inbound payload.
///
/// Non-object payloads (strings, numbers, null) have no discriminator and
/// classify as [`EmbedEvent::Unrecognized`]. Never fails.
#[must_use]
pub fn status_of(payload: &JsValue) -> Option<String> {
    serde_wasm_bindgen::from_value::<Envelope>(payload.clone())
        .ok()
        .and_then(|envelope| envelope.status)
}
