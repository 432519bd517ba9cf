//! Lock-free statistics using atomic operations
//!
//! Aggregates request counts across all sessions without mutex contention.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Global statistics aggregated across all sessions
#[derive(Debug, Default)]
pub struct GlobalStats {
    pub total_requests: AtomicU64,
    pub total_success: AtomicU64,
    pub total_errors: AtomicU64,
    pub total_latency_ms: AtomicU64,
    pub active_sessions: AtomicU64,
    pub start_time: AtomicU64,
}

impl GlobalStats {
    /// Create new global stats
    pub fn new() -> Self {
        Self {
            start_time: AtomicU64::new(now_secs()),
            ..Default::default()
        }
    }

    /// Record a successful page fetch
    pub fn record_request(&self, latency_ms: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_success.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    /// Record a failed fetch attempt
    pub fn record_error(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment active sessions
    pub fn add_session(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement active sessions
    pub fn remove_session(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get active session count
    pub fn active_sessions(&self) -> u64 {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Correct the active session counter (e.g. after a force-stop)
    pub fn set_active_sessions(&self, count: u64) {
        self.active_sessions.store(count, Ordering::Relaxed);
    }

    /// Get average fetch latency in milliseconds
    pub fn average_latency_ms(&self) -> f64 {
        let success = self.total_success.load(Ordering::Relaxed);
        if success == 0 {
            return 0.0;
        }
        self.total_latency_ms.load(Ordering::Relaxed) as f64 / success as f64
    }

    /// Get requests per minute since start
    pub fn requests_per_minute(&self) -> f64 {
        let elapsed_mins = (now_secs().saturating_sub(self.start_time.load(Ordering::Relaxed)))
            as f64
            / 60.0;
        if elapsed_mins < 0.001 {
            return 0.0;
        }
        self.total_requests.load(Ordering::Relaxed) as f64 / elapsed_mins
    }

    /// Get snapshot for serialization
    pub fn snapshot(&self) -> GlobalStatsSnapshot {
        GlobalStatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_success: self.total_success.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            average_latency_ms: self.average_latency_ms(),
            requests_per_minute: self.requests_per_minute(),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Serializable snapshot of global stats
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStatsSnapshot {
    pub total_requests: u64,
    pub total_success: u64,
    pub total_errors: u64,
    pub average_latency_ms: f64,
    pub requests_per_minute: f64,
    pub active_sessions: u64,
}
