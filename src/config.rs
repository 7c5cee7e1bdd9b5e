//! Embed configuration: parsing, validation, defaults, and the origin
//! allow-list.
//!
//! Configuration arrives from the host page as a plain JS object and is
//! validated once, at construction. Everything past this module works with an
//! [`EmbedConfig`] that is known-good and immutable: in particular the trusted
//! origin is derived here, exactly once, from the validated base URL — never
//! recomputed from anything an inbound message could influence.

use js_sys::{Function, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, Url};

use crate::EmbedError;

/// Production embed origin, used when the host omits `baseUrl`.
pub const DEFAULT_BASE_URL: &str = "https://embed.embedframe.app";

/// Origins the controller is willing to embed.
///
/// Matching is exact (scheme + host + port). The localhost entries exist for
/// local development against a dev server.
pub const ALLOWED_ORIGINS: &[&str] = &[
    "https://embed.embedframe.app",
    "https://embed.staging.embedframe.app",
    "http://localhost:8080",
    "http://127.0.0.1:8080",
];

/// Where the iframe gets mounted: a CSS selector resolved at `init`, or a
/// live element handle used directly.
#[derive(Debug, Clone)]
pub enum MountTarget {
    Selector(String),
    Element(Element),
}

/// Validated embed configuration. Immutable after construction.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    /// Identifier of the embedded application. Non-empty.
    pub app_id: String,
    /// Full base URL the iframe is pointed at.
    pub base_url: String,
    /// Origin of `base_url`; the sole filter for inbound messages and the
    /// sole destination for outbound ones.
    pub trusted_origin: String,
    /// Mount point for the iframe.
    pub target: MountTarget,
    /// Enables debug-level logging and is forwarded to the iframe.
    pub debug: bool,
    /// Invoked on `"ready"`, before the acknowledgment is sent.
    pub on_ready: Option<Function>,
    /// Invoked on `"confirmed"`. No reply is sent.
    pub on_confirmed: Option<Function>,
}

impl EmbedConfig {
    /// Parse and validate a configuration object supplied from JS.
    ///
    /// Expected fields: `appId` (required string), `target` (required
    /// selector string or element), `baseUrl` (optional string, defaults to
    /// [`DEFAULT_BASE_URL`]), `debug` (optional bool), `onReady` /
    /// `onConfirmed` (optional functions).
    ///
    /// Fails with [`EmbedError::Config`] naming the offending field. Has no
    /// side effects: no DOM mutation, no listener registration.
    pub fn from_js(value: &JsValue) -> Result<Self, EmbedError> {
        if !value.is_object() {
            return Err(EmbedError::Config("config must be an object".into()));
        }

        let app_id = require_non_empty("appId", get(value, "appId").as_string())?;

        let base_url = match get(value, "baseUrl") {
            raw if raw.is_undefined() || raw.is_null() => DEFAULT_BASE_URL.to_string(),
            raw => raw
                .as_string()
                .ok_or_else(|| EmbedError::Config("baseUrl must be a string".into()))?,
        };

        let url = Url::new(&base_url)
            .map_err(|_| EmbedError::Config(format!("baseUrl is not a valid URL: {base_url}")))?;
        let trusted_origin = url.origin();
        if !origin_allowed(&trusted_origin) {
            return Err(EmbedError::Config(format!(
                "baseUrl origin {trusted_origin} is not an allowed embed origin"
            )));
        }

        let target = match get(value, "target") {
            raw if raw.is_string() => {
                MountTarget::Selector(require_non_empty("target", raw.as_string())?)
            }
            raw if raw.is_instance_of::<Element>() => {
                MountTarget::Element(raw.unchecked_into())
            }
            _ => {
                return Err(EmbedError::Config(
                    "target must be a selector string or an element".into(),
                ))
            }
        };

        let debug = match get(value, "debug") {
            raw if raw.is_undefined() || raw.is_null() => false,
            raw => raw
                .as_bool()
                .ok_or_else(|| EmbedError::Config("debug must be a boolean".into()))?,
        };

        Ok(Self {
            app_id,
            base_url,
            trusted_origin,
            target,
            debug,
            on_ready: optional_callback(value, "onReady")?,
            on_confirmed: optional_callback(value, "onConfirmed")?,
        })
    }

    /// Build the iframe source URL: the base URL with `origin`, `appId` and
    /// `debug` query parameters appended.
    ///
    /// `origin` tells the embedded application who to post replies back to;
    /// `debug` is always `"1"` or `"0"`.
    pub fn iframe_src(&self, host_origin: &str) -> Result<String, EmbedError> {
        let url = Url::new(&self.base_url).map_err(|_| {
            EmbedError::Config(format!("baseUrl is not a valid URL: {}", self.base_url))
        })?;
        let params = url.search_params();
        params.append("origin", host_origin);
        params.append("appId", &self.app_id);
        params.append("debug", if self.debug { "1" } else { "0" });
        Ok(url.href())
    }
}

/// Exact allow-list match on scheme + host + port.
#[must_use]
pub fn origin_allowed(origin: &str) -> bool {
    ALLOWED_ORIGINS.contains(&origin)
}

fn require_non_empty(field: &str, value: Option<String>) -> Result<String, EmbedError> {
    value
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EmbedError::Config(format!("{field} must be a non-empty string")))
}

fn get(obj: &JsValue, key: &str) -> JsValue {
    Reflect::get(obj, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
}

fn optional_callback(obj: &JsValue, key: &str) -> Result<Option<Function>, EmbedError> {
    let raw = get(obj, key);
    if raw.is_undefined() || raw.is_null() {
        return Ok(None);
    }
    raw.dyn_into::<Function>()
        .map(Some)
        .map_err(|_| EmbedError::Config(format!("{key} must be a function")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_url_is_allowed() {
        assert!(origin_allowed(DEFAULT_BASE_URL));
    }

    #[test]
    fn test_origin_matching_is_exact() {
        assert!(origin_allowed("https://embed.embedframe.app"));
        // Prefixes, suffixes and scheme changes must not match.
        assert!(!origin_allowed("https://embed.embedframe.app.evil.com"));
        assert!(!origin_allowed("https://evil.com/embed.embedframe.app"));
        assert!(!origin_allowed("http://embed.embedframe.app"));
        assert!(!origin_allowed("https://embed.embedframe.app:8443"));
        assert!(!origin_allowed(""));
    }

    #[test]
    fn test_require_non_empty() {
        assert_eq!(
            require_non_empty("appId", Some("checkout".to_string())).unwrap(),
            "checkout"
        );
        assert!(require_non_empty("appId", Some(String::new())).is_err());
        assert!(require_non_empty("appId", None).is_err());
    }

    #[test]
    fn test_config_error_names_the_field() {
        let err = require_non_empty("appId", None).unwrap_err();
        assert!(err.to_string().contains("appId"));
    }
}
