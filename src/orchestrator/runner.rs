//! Run orchestration
//!
//! Spawns one task per simulated user with staggered starts, enforces the
//! global time budget, broadcasts cooperative cancellation, waits out a
//! bounded grace period and force-stops whatever is left.

use std::collections::{BTreeMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{SessionRegistry, SessionStatus};
use crate::browser::ProfilePool;
use crate::session::{SessionOutcome, TerminalReason, UserSession};
use crate::stats::{GlobalStats, GlobalStatsSnapshot};
use crate::timing::sleep_cancellable;
use crate::NoiseConfig;

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of concurrent simulated users
    pub users: usize,
    /// Staggered start window in seconds (uniform per session)
    pub stagger: (f64, f64),
    /// How long to wait for sessions to wind down after cancellation
    pub grace_period: Duration,
    /// Base seed for deterministic runs; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            users: 1,
            stagger: (2.0, 5.0),
            grace_period: Duration::from_secs(10),
            seed: None,
        }
    }
}

/// Aggregated result of a whole run.
#[derive(Debug, serde::Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<SessionOutcome>,
    pub stats: GlobalStatsSnapshot,
}

/// Spawns and supervises the simulated users.
pub struct Orchestrator {
    config: Arc<NoiseConfig>,
    profiles: Arc<ProfilePool>,
    run_config: OrchestratorConfig,
    stats: Arc<GlobalStats>,
    cancel: Arc<AtomicBool>,
    registry: SessionRegistry,
}

impl Orchestrator {
    pub fn new(
        config: Arc<NoiseConfig>,
        profiles: Arc<ProfilePool>,
        run_config: OrchestratorConfig,
    ) -> Self {
        Self {
            config,
            profiles,
            run_config,
            stats: Arc::new(GlobalStats::new()),
            cancel: Arc::new(AtomicBool::new(false)),
            registry: SessionRegistry::new(),
        }
    }

    /// Shared cancellation flag; store `true` (e.g. from a ctrl-c handler)
    /// to wind all sessions down cooperatively.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Global statistics handle
    pub fn stats(&self) -> Arc<GlobalStats> {
        self.stats.clone()
    }

    /// Run all sessions to completion (or to the global time budget) and
    /// collect their terminal outcomes.
    pub async fn run(&self) -> RunReport {
        let started_at = Utc::now();
        let deadline = self
            .config
            .timeout
            .map(|secs| Instant::now() + Duration::from_secs(secs));

        match self.config.timeout {
            Some(secs) => info!(
                "Starting {} simulated user(s), time budget {}s",
                self.run_config.users, secs
            ),
            None => info!(
                "Starting {} simulated user(s), no time budget",
                self.run_config.users
            ),
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<SessionOutcome>();
        let mut stagger_rng = match self.run_config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let total = self.run_config.users;
        let mut handles = Vec::with_capacity(total);

        for user in 0..total {
            let offset = Duration::from_secs_f64(
                stagger_rng.gen_range(self.run_config.stagger.0..=self.run_config.stagger.1),
            );
            let seed = self
                .run_config
                .seed
                .map(|base| base.wrapping_add(user as u64 + 1));

            let session = match UserSession::new(
                user,
                self.config.clone(),
                &self.profiles,
                self.stats.clone(),
                self.cancel.clone(),
                deadline,
                self.registry.clone(),
                seed,
            ) {
                Ok(session) => session,
                Err(e) => {
                    // Client construction failing is a local defect; the
                    // other users still run.
                    error!("User-{} failed to initialize: {}", user, e);
                    let _ = tx.send(SessionOutcome {
                        session_id: format!("init-failed-{user}"),
                        user,
                        reason: TerminalReason::FetchFailed,
                        depth: 0,
                        pages_fetched: 0,
                        fetch_errors: 1,
                    });
                    continue;
                }
            };

            self.registry.insert(&session.id, user).await;

            let session_id = session.id.clone();
            let cancel = self.cancel.clone();
            let stats = self.stats.clone();
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                stats.add_session();
                debug!("User-{} staggering start by {:?}", user, offset);
                let _ = sleep_cancellable(offset, &cancel, deadline).await;

                // Panic safety: a panicking session becomes an outcome,
                // not a dead slot the run waits on forever.
                let outcome = match AssertUnwindSafe(session.run()).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        error!(
                            "User-{} session {} panicked: {}",
                            user,
                            session_id,
                            panic_message(&panic)
                        );
                        SessionOutcome {
                            session_id,
                            user,
                            reason: TerminalReason::FetchFailed,
                            depth: 0,
                            pages_fetched: 0,
                            fetch_errors: 0,
                        }
                    }
                };

                stats.remove_session();
                let _ = tx.send(outcome);
            }));
        }
        drop(tx);

        let mut outcomes: Vec<SessionOutcome> = Vec::with_capacity(total);
        let mut grace_deadline: Option<Instant> = None;
        let mut timed_out = false;

        while outcomes.len() < total {
            tokio::select! {
                maybe = rx.recv() => {
                    match maybe {
                        Some(outcome) => outcomes.push(outcome),
                        None => break,
                    }
                }
                _ = sleep_until_opt(deadline), if deadline.is_some() && !timed_out => {
                    timed_out = true;
                    info!(
                        "Global time budget reached, cancelling {} active session(s)",
                        total - outcomes.len()
                    );
                    self.cancel.store(true, Ordering::Relaxed);
                    grace_deadline = Some(Instant::now() + self.run_config.grace_period);
                }
                _ = sleep_until_opt(grace_deadline), if grace_deadline.is_some() => {
                    warn!(
                        "Grace period elapsed, force-stopping {} straggler(s)",
                        total - outcomes.len()
                    );
                    for handle in &handles {
                        handle.abort();
                    }
                    break;
                }
            }
        }

        // Outcomes that raced the force-stop are still in the channel.
        while let Ok(outcome) = rx.try_recv() {
            outcomes.push(outcome);
        }

        if outcomes.len() < total {
            self.synthesize_missing(&mut outcomes).await;
            self.stats.set_active_sessions(0);
        }

        outcomes.sort_by_key(|o| o.user);

        let mut reason_counts: BTreeMap<TerminalReason, usize> = BTreeMap::new();
        for outcome in &outcomes {
            *reason_counts.entry(outcome.reason).or_default() += 1;
        }
        let summary = reason_counts
            .iter()
            .map(|(reason, count)| format!("{count} {reason}"))
            .collect::<Vec<_>>()
            .join(", ");
        info!("Run complete: {} session(s) ({})", outcomes.len(), summary);

        RunReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
            stats: self.stats.snapshot(),
        }
    }

    /// Fill in outcomes for force-stopped sessions from their last known
    /// registry state.
    async fn synthesize_missing(&self, outcomes: &mut Vec<SessionOutcome>) {
        let reported: HashSet<String> =
            outcomes.iter().map(|o| o.session_id.clone()).collect();

        for (id, entry) in self.registry.snapshot().await {
            if reported.contains(&id) {
                continue;
            }
            let (reason, depth) = match entry.status {
                SessionStatus::Terminated { reason } => (reason, 0),
                SessionStatus::Running { depth } => (TerminalReason::Cancelled, depth),
                SessionStatus::Starting => (TerminalReason::Cancelled, 0),
            };
            warn!(
                "Session {} force-stopped, last known state: {:?}",
                id, entry.status
            );
            outcomes.push(SessionOutcome {
                session_id: id,
                user: entry.user,
                reason,
                depth,
                pages_fetched: 0,
                fetch_errors: 0,
            });
        }
    }
}

/// Sleep until the given instant; pend forever when there is none.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Arc<NoiseConfig> {
        Arc::new(NoiseConfig {
            max_depth: 1,
            min_sleep: 0.0,
            max_sleep: 0.0,
            timeout: None,
            root_urls: vec!["http://a.test/".to_string()],
            blacklisted_urls: vec![],
            user_agents: vec![],
        })
    }

    #[tokio::test]
    async fn test_zero_users_completes_immediately() {
        let orchestrator = Orchestrator::new(
            config(),
            Arc::new(ProfilePool::builtin()),
            OrchestratorConfig {
                users: 0,
                ..Default::default()
            },
        );
        let report = orchestrator.run().await;
        assert!(report.outcomes.is_empty());
        assert_eq!(report.stats.total_requests, 0);
    }

    #[test]
    fn test_default_stagger_window() {
        let defaults = OrchestratorConfig::default();
        assert_eq!(defaults.stagger, (2.0, 5.0));
        assert_eq!(defaults.users, 1);
    }
}
