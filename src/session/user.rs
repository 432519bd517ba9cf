//! Simulated user session
//!
//! One session = one browser profile + one cookie store + a traversal
//! loop: fetch a page, extract and filter its links, hop to one of them,
//! sleep a human-looking delay, repeat. The session terminates when its
//! depth budget is spent, the trail goes cold, fetch retries run out, or
//! the orchestrator cancels the run.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::FetchError;
use crate::browser::{BrowserProfile, ProfilePool};
use crate::links::{extract_links, should_accept};
use crate::orchestrator::{SessionRegistry, SessionStatus};
use crate::stats::GlobalStats;
use crate::timing::{sleep_cancellable, TimingModel};
use crate::NoiseConfig;

/// Fetch retries after the first attempt.
const FETCH_RETRIES: u32 = 2;
/// Base delay for retry backoff.
const RETRY_BASE_MS: u64 = 500;
/// Cap for retry backoff.
const RETRY_MAX_MS: u64 = 5_000;
/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Cap on the body size fed to the link extractor.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Why a session reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// The depth budget was spent following links
    DepthExhausted,
    /// No link on the current page passed the filter
    NoCandidates,
    /// Fetch retries were exhausted
    FetchFailed,
    /// The orchestrator (or an interrupt) cancelled the run
    Cancelled,
    /// The global time budget elapsed
    Timeout,
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminalReason::DepthExhausted => "depth_exhausted",
            TerminalReason::NoCandidates => "no_candidates",
            TerminalReason::FetchFailed => "fetch_failed",
            TerminalReason::Cancelled => "cancelled",
            TerminalReason::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Terminal report for one session.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionOutcome {
    pub session_id: String,
    pub user: usize,
    pub reason: TerminalReason,
    pub depth: u32,
    pub pages_fetched: u64,
    pub fetch_errors: u64,
}

/// A single simulated user.
///
/// Owns its cookie store (the per-session HTTP client's jar), its random
/// generator and its depth counter exclusively; shares only the read-only
/// config/profile pool and the cancellation flag.
pub struct UserSession {
    pub id: String,
    user: usize,
    config: Arc<NoiseConfig>,
    profile: BrowserProfile,
    client: reqwest::Client,
    rng: StdRng,
    timing: TimingModel,
    depth: u32,
    pages_fetched: u64,
    fetch_errors: u64,
    stats: Arc<GlobalStats>,
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
    registry: SessionRegistry,
}

impl UserSession {
    /// Create a session: assign a profile and User-Agent, build the HTTP
    /// client with its own cookie jar.
    ///
    /// `seed` makes the session deterministic for tests; `None` seeds from
    /// entropy.
    pub fn new(
        user: usize,
        config: Arc<NoiseConfig>,
        profiles: &ProfilePool,
        stats: Arc<GlobalStats>,
        cancel: Arc<AtomicBool>,
        deadline: Option<Instant>,
        registry: SessionRegistry,
        seed: Option<u64>,
    ) -> Result<Self, FetchError> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Pick a random browser profile and stick with it.
        let profile = profiles.assign(&mut rng).clone();
        let user_agent = if config.user_agents.is_empty() {
            profile.user_agent().map(str::to_owned)
        } else {
            Some(config.user_agents[rng.gen_range(0..config.user_agents.len())].clone())
        };

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .default_headers(profile.request_headers(user_agent.as_deref()))
            .build()?;

        let id = format!("{}-{}", &Uuid::new_v4().to_string()[..8], user);
        info!("User-{} session {} using profile: {}", user, id, profile.name);

        Ok(Self {
            id,
            user,
            timing: TimingModel::new(config.min_sleep, config.max_sleep),
            config,
            profile,
            client,
            rng,
            depth: 0,
            pages_fetched: 0,
            fetch_errors: 0,
            stats,
            cancel,
            deadline,
            registry,
        })
    }

    /// The profile bound to this session.
    pub fn profile(&self) -> &BrowserProfile {
        &self.profile
    }

    /// Run the session to its terminal state.
    pub async fn run(mut self) -> SessionOutcome {
        self.registry
            .set_status(&self.id, SessionStatus::Running { depth: 0 })
            .await;

        let reason = self.traverse().await;

        self.registry
            .set_status(&self.id, SessionStatus::Terminated { reason })
            .await;
        info!(
            "User-{} session {} terminated: {} (depth {}, pages {}, errors {})",
            self.user, self.id, reason, self.depth, self.pages_fetched, self.fetch_errors
        );

        SessionOutcome {
            session_id: self.id,
            user: self.user,
            reason,
            depth: self.depth,
            pages_fetched: self.pages_fetched,
            fetch_errors: self.fetch_errors,
        }
    }

    /// The traversal loop: FETCH -> EXTRACT -> SELECT -> SLEEP -> FETCH.
    async fn traverse(&mut self) -> TerminalReason {
        let root = &self.config.root_urls[self.rng.gen_range(0..self.config.root_urls.len())];
        let mut current = root.clone();
        info!("User-{} starting from root: {}", self.user, current);

        loop {
            if let Some(reason) = self.check_interrupt() {
                return reason;
            }

            let body = match self.fetch_with_retry(&current).await {
                Ok(body) => body,
                Err(e) => {
                    if let Some(reason) = self.check_interrupt() {
                        return reason;
                    }
                    warn!(
                        "User-{} giving up on {}: {}",
                        self.user,
                        truncate(&current, 80),
                        e
                    );
                    return TerminalReason::FetchFailed;
                }
            };

            let candidates = extract_links(&body, &current);
            let passing: Vec<&String> = candidates
                .iter()
                .filter(|c| should_accept(c, &self.config.blacklisted_urls, &current))
                .collect();

            if passing.is_empty() {
                info!(
                    "User-{} dead end at {} ({} links, none passed the filter)",
                    self.user,
                    truncate(&current, 80),
                    candidates.len()
                );
                return TerminalReason::NoCandidates;
            }

            let next = passing[self.rng.gen_range(0..passing.len())].to_string();
            self.depth += 1;
            self.registry
                .set_status(&self.id, SessionStatus::Running { depth: self.depth })
                .await;
            debug!(
                "User-{} visiting (depth {}): {}",
                self.user,
                self.depth,
                truncate(&next, 80)
            );

            if self.depth >= self.config.max_depth {
                return TerminalReason::DepthExhausted;
            }

            let delay = self.timing.sample(&mut self.rng);
            if !sleep_cancellable(delay, &self.cancel, self.deadline).await {
                return self.interrupt_reason();
            }
            current = next;
        }
    }

    /// Fetch with a bounded retry policy.
    ///
    /// Transport errors and non-success statuses are retried with
    /// exponential backoff and jitter; exhaustion returns the last error
    /// and terminates only this session.
    async fn fetch_with_retry(&mut self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.fetch(url).await {
                Ok(body) => {
                    self.pages_fetched += 1;
                    return Ok(body);
                }
                Err(e) => {
                    self.stats.record_error();
                    self.fetch_errors += 1;
                    attempt += 1;
                    if attempt > FETCH_RETRIES {
                        return Err(e);
                    }
                    let backoff = self.retry_backoff(attempt);
                    debug!(
                        "User-{} fetch error on {} ({}), retry {}/{} in {:?}",
                        self.user,
                        truncate(url, 60),
                        e,
                        attempt,
                        FETCH_RETRIES,
                        backoff
                    );
                    if !sleep_cancellable(backoff, &self.cancel, self.deadline).await {
                        return Err(e);
                    }
                }
            }
        }
    }

    /// One GET through the session's client. Cookies set by the response
    /// land in this session's jar only.
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let started = std::time::Instant::now();
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() >= MAX_BODY_BYTES {
                body.extend_from_slice(&chunk[..MAX_BODY_BYTES - body.len()]);
                debug!(
                    "User-{} body capped at {} bytes for {}",
                    self.user,
                    MAX_BODY_BYTES,
                    truncate(url, 60)
                );
                break;
            }
            body.extend_from_slice(&chunk);
        }

        self.stats
            .record_request(started.elapsed().as_millis() as u64);
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Exponential backoff with jitter, driven by the session's own RNG.
    fn retry_backoff(&mut self, attempt: u32) -> Duration {
        let base = RETRY_BASE_MS * 2u64.pow(attempt.saturating_sub(1).min(5));
        let capped = base.min(RETRY_MAX_MS);

        let jitter_range = capped / 5;
        let jitter = if jitter_range > 0 {
            self.rng.gen_range(0..jitter_range * 2) as i64 - jitter_range as i64
        } else {
            0
        };

        Duration::from_millis((capped as i64 + jitter).max(0) as u64)
    }

    /// Deadline beats the cancel flag: a run that hit its global budget
    /// reports `timeout`, an externally stopped one reports `cancelled`.
    fn check_interrupt(&self) -> Option<TerminalReason> {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(TerminalReason::Timeout);
        }
        if self.cancel.load(Ordering::Relaxed) {
            return Some(TerminalReason::Cancelled);
        }
        None
    }

    fn interrupt_reason(&self) -> TerminalReason {
        self.check_interrupt().unwrap_or(TerminalReason::Cancelled)
    }
}

/// Truncate for log lines without splitting a UTF-8 character.
fn truncate(url: &str, max: usize) -> &str {
    url.char_indices()
        .nth(max)
        .map_or(url, |(i, _)| &url[..i])
}
