//! Browser profile pool
//!
//! Loads a fixed set of profiles once at startup and hands them out to
//! sessions. Assignment is uniform random with replacement, so several
//! sessions may share the same identity.

use std::path::Path;
use once_cell::sync::Lazy;
use rand::Rng;
use serde_json::json;
use tracing::info;

use super::BrowserProfile;
use crate::ConfigError;

/// Small built-in profile set used when no profiles file is given.
static BUILTIN_PROFILES: Lazy<Vec<BrowserProfile>> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "name": "chrome-linux",
            "headers": {
                "User-Agent": "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
                "Accept": "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
                "Accept-Language": "en-US,en;q=0.9",
                "Accept-Encoding": "gzip, deflate, br",
                "Sec-CH-UA": "\"Chromium\";v=\"124\", \"Google Chrome\";v=\"124\", \"Not-A.Brand\";v=\"99\"",
                "Sec-CH-UA-Mobile": "?0",
                "Sec-CH-UA-Platform": "\"Linux\"",
                "Upgrade-Insecure-Requests": "1",
                "DNT": null
            }
        },
        {
            "name": "firefox-windows",
            "headers": {
                "User-Agent": "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
                "Accept": "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
                "Accept-Language": "en-US,en;q=0.5",
                "Accept-Encoding": "gzip, deflate, br",
                "Upgrade-Insecure-Requests": "1",
                "DNT": "1"
            }
        },
        {
            "name": "safari-macos",
            "headers": {
                "User-Agent": "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
                "Accept": "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                "Accept-Language": "en-US,en;q=0.9",
                "Accept-Encoding": "gzip, deflate, br",
                "DNT": null
            }
        }
    ]))
    .expect("built-in profiles are valid")
});

/// Accepts either a bare JSON array of profiles or the legacy
/// `{"profiles": [...]}` wrapper object.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ProfilesFile {
    Wrapped { profiles: Vec<BrowserProfile> },
    Bare(Vec<BrowserProfile>),
}

/// Immutable pool of browser profiles shared by all sessions.
pub struct ProfilePool {
    profiles: Vec<BrowserProfile>,
}

impl ProfilePool {
    /// Load profiles from a JSON file. Missing or malformed input is fatal.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let pool = Self::from_json(&content)?;
        info!("Loaded {} browser profiles from {}", pool.len(), path.display());
        Ok(pool)
    }

    /// Parse profiles from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let profiles = match serde_json::from_str::<ProfilesFile>(content)? {
            ProfilesFile::Wrapped { profiles } => profiles,
            ProfilesFile::Bare(profiles) => profiles,
        };
        if profiles.is_empty() {
            return Err(ConfigError::Invalid("profiles must not be empty".into()));
        }
        Ok(Self { profiles })
    }

    /// The built-in default profile set.
    pub fn builtin() -> Self {
        Self {
            profiles: BUILTIN_PROFILES.clone(),
        }
    }

    /// Pick a profile uniformly at random, with replacement.
    ///
    /// The caller clones the returned profile and keeps it for the whole
    /// session; the pool itself is never mutated.
    pub fn assign<R: Rng>(&self, rng: &mut R) -> &BrowserProfile {
        &self.profiles[rng.gen_range(0..self.profiles.len())]
    }

    /// Number of profiles in the pool
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the pool is empty (never true for a loaded pool)
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
