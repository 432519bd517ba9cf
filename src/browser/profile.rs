//! Browser profiles
//!
//! A profile is an immutable bundle of HTTP headers representing one real
//! browser identity. Once a session picks a profile it never changes it:
//! headers and User-Agent stay consistent for the session's lifetime.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, USER_AGENT};
use tracing::debug;

/// One browser identity: a name plus its characteristic request headers.
///
/// The header map preserves the order of the source JSON. A `null` value
/// means the header is absent in this browser and is dropped when request
/// headers are built.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BrowserProfile {
    /// Profile name, e.g. `"chrome-linux"`
    pub name: String,
    /// Header name -> value; `null` marks a header this browser does not send
    pub headers: serde_json::Map<String, serde_json::Value>,
}

impl BrowserProfile {
    /// The profile's own User-Agent, if it carries one.
    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get("User-Agent").and_then(|v| v.as_str())
    }

    /// Build the request headers for this profile.
    ///
    /// Drops `null`-valued headers, applies the session's User-Agent when
    /// one was chosen, and always sends `Connection: keep-alive`.
    pub fn request_headers(&self, user_agent: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();

        for (name, value) in &self.headers {
            let Some(value) = value.as_str() else { continue };
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                _ => {
                    debug!("Profile {} has unusable header {:?}, skipping", self.name, name);
                }
            }
        }

        if let Some(ua) = user_agent {
            if let Ok(value) = HeaderValue::from_str(ua) {
                map.insert(USER_AGENT, value);
            }
        }

        map.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        map
    }
}
