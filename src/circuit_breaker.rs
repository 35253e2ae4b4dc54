//! Per-source circuit breaking for the aggregation fan-out.
//!
//! A dead indexer should not cost every search a full fetch timeout.
//! The breaker counts consecutive failures per provider source and,
//! once a source trips, the aggregator skips it (recording a
//! `CircuitOpen` failure) instead of calling the provider. After a
//! cooldown one probe fetch is let through: if it succeeds the source
//! is healthy again, if it fails the circuit re-trips for another
//! cooldown.
//!
//! Sources are keyed by name because the provider set is open-ended;
//! any string a [`crate::Provider::source`] returns gets its own
//! independent circuit. Only real fetch outcomes move the state:
//! deadline abandons and cancellations record nothing, so a cut-short
//! pass cannot trip circuits for sources that were never tried.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

/// Where a source's circuit currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Fetches flow normally.
    Closed,
    /// Too many consecutive failures; fetches are skipped until the
    /// cooldown runs out.
    Open,
    /// Cooldown is over; the next fetch is a probe that decides between
    /// `Closed` and `Open`.
    HalfOpen,
}

/// What the breaker knows about one source.
#[derive(Debug, Clone)]
pub struct SourceHealth {
    pub state: CircuitState,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
    pub last_success_at: Option<Instant>,
}

impl Default for SourceHealth {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            last_success_at: None,
        }
    }
}

/// Breaker thresholds. Part of [`crate::EngineConfig`]; validation
/// rejects a zero `failure_threshold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that trip a source open.
    pub failure_threshold: u32,
    /// Seconds an open source waits before its probe fetch.
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 60,
        }
    }
}

/// Tracks fetch health per source and answers whether a fetch is worth
/// attempting.
///
/// The aggregator asks [`should_attempt`](Self::should_attempt) right
/// before each fetch and reports back through
/// [`record_success`](Self::record_success) /
/// [`record_failure`](Self::record_failure).
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    sources: HashMap<String, SourceHealth>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            sources: HashMap::new(),
        }
    }

    /// Swaps in new thresholds without touching per-source state. Each
    /// aggregation pass pushes its config here, so the shared breaker
    /// follows whatever the caller currently runs with.
    pub fn set_config(&mut self, config: BreakerConfig) {
        self.config = config;
    }

    /// A fetch from this source succeeded. Any state, including a
    /// half-open probe, collapses back to `Closed` and the failure
    /// count restarts.
    pub fn record_success(&mut self, source: &str) {
        let health = self.sources.entry(source.to_string()).or_default();
        health.state = CircuitState::Closed;
        health.consecutive_failures = 0;
        health.last_success_at = Some(Instant::now());
    }

    /// A fetch from this source failed or timed out. Reaching the
    /// failure threshold trips the circuit open; a failed half-open
    /// probe re-trips it for another cooldown.
    pub fn record_failure(&mut self, source: &str) {
        let health = self.sources.entry(source.to_string()).or_default();
        health.consecutive_failures += 1;
        health.last_failure_at = Some(Instant::now());

        if health.consecutive_failures >= self.config.failure_threshold {
            health.state = CircuitState::Open;
        }
    }

    /// Whether the aggregator should bother fetching from this source.
    ///
    /// An open circuit whose cooldown has elapsed flips to `HalfOpen`
    /// here and admits the caller as the probe.
    pub fn should_attempt(&mut self, source: &str) -> bool {
        let health = self.sources.entry(source.to_string()).or_default();

        match health.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = health
                    .last_failure_at
                    .is_none_or(|t| t.elapsed().as_secs() >= self.config.cooldown_secs);
                if cooled_down {
                    health.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Current circuit state for a source. Unseen sources are `Closed`.
    pub fn source_status(&self, source: &str) -> CircuitState {
        self.sources
            .get(source)
            .map_or(CircuitState::Closed, |h| h.state)
    }

    /// One `(source, state, consecutive_failures)` entry per source the
    /// breaker has seen, for host dashboards.
    pub fn health_report(&self) -> Vec<(String, CircuitState, u32)> {
        self.sources
            .iter()
            .map(|(source, health)| (source.clone(), health.state, health.consecutive_failures))
            .collect()
    }

    /// Forgets all per-source state.
    pub fn reset(&mut self) {
        self.sources.clear();
    }
}

static GLOBAL_BREAKER: OnceLock<Mutex<CircuitBreaker>> = OnceLock::new();

/// The process-wide breaker shared by every [`crate::search`] call, so
/// a source that keeps failing is skipped across searches, not just
/// within one. Lazily built with default thresholds; each aggregation
/// pass overwrites them from its own config.
pub fn global_breaker() -> &'static Mutex<CircuitBreaker> {
    GLOBAL_BREAKER.get_or_init(|| Mutex::new(CircuitBreaker::new(BreakerConfig::default())))
}
