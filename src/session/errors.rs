//! Session error types

use thiserror::Error;

/// Errors a session can hit while fetching a page.
///
/// These feed the bounded retry policy; once retries are exhausted only
/// the owning session terminates. Nothing here escapes to other sessions.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(reqwest::StatusCode),
}
