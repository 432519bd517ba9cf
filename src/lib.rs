//! web-noise
//!
//! Generates realistic random web traffic to obfuscate browsing patterns.
//! Multiple concurrent simulated users each browse from a random root URL
//! with a fixed browser profile, following links with human-looking delays.

pub mod browser;
pub mod links;
pub mod orchestrator;
pub mod session;
pub mod stats;
pub mod timing;

use std::path::{Path, PathBuf};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::info;

/// Errors raised while loading configuration or browser profiles.
///
/// All of these are fatal at startup: they are reported once and the
/// process exits before any session spawns.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Noise generation configuration
///
/// Loaded once from a JSON file before any session starts and shared
/// read-only across all sessions afterwards.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NoiseConfig {
    /// Maximum number of link-following hops per session
    pub max_depth: u32,
    /// Minimum inter-request delay in seconds
    pub min_sleep: f64,
    /// Maximum inter-request delay in seconds
    pub max_sleep: f64,
    /// Global time budget in seconds; JSON `false`, `0` or absent means unbounded
    #[serde(default, deserialize_with = "deserialize_timeout")]
    pub timeout: Option<u64>,
    /// Root URLs sessions start browsing from
    pub root_urls: Vec<String>,
    /// Substring patterns matched case-insensitively against candidate URLs
    #[serde(default)]
    pub blacklisted_urls: Vec<String>,
    /// User-Agent strings sessions pick from; empty falls back to the profile's own
    #[serde(default)]
    pub user_agents: Vec<String>,
}

/// Accepts `false` (unbounded) or a number of seconds in the `timeout` field.
fn deserialize_timeout<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum RawTimeout {
        Seconds(u64),
        Flag(bool),
    }

    match Option::<RawTimeout>::deserialize(deserializer)? {
        None | Some(RawTimeout::Flag(false)) | Some(RawTimeout::Seconds(0)) => Ok(None),
        Some(RawTimeout::Flag(true)) => Err(serde::de::Error::custom(
            "timeout must be a number of seconds, or false for unbounded",
        )),
        Some(RawTimeout::Seconds(secs)) => Ok(Some(secs)),
    }
}

impl NoiseConfig {
    /// Load and validate config from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: NoiseConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Check the invariants the sessions rely on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be positive".into()));
        }
        if self.min_sleep < 0.0 || self.max_sleep < 0.0 {
            return Err(ConfigError::Invalid(
                "min_sleep and max_sleep must be non-negative".into(),
            ));
        }
        if self.min_sleep > self.max_sleep {
            return Err(ConfigError::Invalid(
                "min_sleep must not exceed max_sleep".into(),
            ));
        }
        if self.root_urls.is_empty() {
            return Err(ConfigError::Invalid("root_urls must not be empty".into()));
        }
        Ok(())
    }
}

/// Get log directory path (shared across modules)
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("web-noise").join("logs"))
}

/// Initialize logging with the given CLI level (`debug|info|warning|error`).
///
/// Installs a console layer plus, when a log directory is available, a
/// daily-rolling file layer. Returns the appender guard that must be kept
/// alive for the duration of the process.
pub fn init_logging(level: &str) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let level = match level {
        "debug" => tracing::Level::DEBUG,
        "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(level.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    if let Some(log_dir) = log_dir() {
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "web-noise.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json(timeout: &str) -> String {
        format!(
            r#"{{
                "max_depth": 10,
                "min_sleep": 1,
                "max_sleep": 5,
                "timeout": {timeout},
                "root_urls": ["https://example.com"],
                "blacklisted_urls": [".css"],
                "user_agents": ["agent/1.0"]
            }}"#
        )
    }

    #[test]
    fn test_timeout_false_means_unbounded() {
        let config: NoiseConfig = serde_json::from_str(&minimal_json("false")).unwrap();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_timeout_zero_means_unbounded() {
        let config: NoiseConfig = serde_json::from_str(&minimal_json("0")).unwrap();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_timeout_seconds() {
        let config: NoiseConfig = serde_json::from_str(&minimal_json("300")).unwrap();
        assert_eq!(config.timeout, Some(300));
    }

    #[test]
    fn test_timeout_true_is_rejected() {
        assert!(serde_json::from_str::<NoiseConfig>(&minimal_json("true")).is_err());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let config: NoiseConfig = serde_json::from_str(
            r#"{"max_depth": 3, "min_sleep": 0, "max_sleep": 0, "root_urls": ["http://a.test"]}"#,
        )
        .unwrap();
        assert_eq!(config.timeout, None);
        assert!(config.blacklisted_urls.is_empty());
        assert!(config.user_agents.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let mut config: NoiseConfig = serde_json::from_str(&minimal_json("false")).unwrap();
        config.max_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_sleep_bounds() {
        let mut config: NoiseConfig = serde_json::from_str(&minimal_json("false")).unwrap();
        config.min_sleep = 10.0;
        config.max_sleep = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_roots() {
        let mut config: NoiseConfig = serde_json::from_str(&minimal_json("false")).unwrap();
        config.root_urls.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        let err = NoiseConfig::load(Path::new("/nonexistent/config.json"));
        assert!(matches!(err, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, minimal_json("60")).unwrap();

        let config = NoiseConfig::load(&path).unwrap();
        assert_eq!(config.timeout, Some(60));
        assert_eq!(config.root_urls, vec!["https://example.com"]);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"max_depth": 0, "min_sleep": 1, "max_sleep": 2, "root_urls": ["http://a.test"]}"#,
        )
        .unwrap();

        assert!(matches!(
            NoiseConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
