//! Concurrent multi-source candidate aggregation.
//!
//! Fans each expanded query variant out to every admitted provider,
//! bounds the in-flight fetch count, deduplicates what comes back, and
//! reports per-fetch failures instead of aborting on them. The fan-in
//! stops early when the total deadline passes or the caller cancels,
//! returning whatever arrived so far flagged as partial.

pub mod dedup;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::provider::{FailureReason, FetchFailure, Provider};
use crate::types::{Candidate, Query, QueryVariant};

/// Everything one aggregation pass produced.
#[derive(Debug)]
pub struct AggregateOutcome {
    /// Deduplicated candidates from all fetches that succeeded.
    pub candidates: Vec<Candidate>,
    /// One record per fetch that contributed nothing.
    pub failures: Vec<FetchFailure>,
    /// True when the deadline or cancellation cut the fan-in short.
    pub partial: bool,
}

enum FetchResult {
    Candidates(Vec<Candidate>),
    Failed(FailureReason),
}

struct FetchOutcome {
    pair_id: usize,
    source: String,
    variant_tag: String,
    variant_index: usize,
    result: FetchResult,
}

/// Aggregates candidates for a query across all providers.
///
/// # Pipeline
///
/// 1. Build one fetch per (variant, provider) pair the query's source
///    filter admits
/// 2. Run fetches concurrently, bounded by `max_in_flight` permits
/// 3. Consult the per-source circuit breaker at dispatch time; skipped
///    fetches become `CircuitOpen` failures without touching the provider
/// 4. Wrap each fetch in `fetch_timeout_secs`; feed the outcome back to
///    the breaker
/// 5. Fan in until done, the `total_timeout_secs` deadline passes, or
///    `cancel` fires; early fan-in records the outstanding fetches as
///    `Cancelled` and flags the outcome partial
/// 6. Deduplicate survivors by `(source, id)`, earliest variant wins
///
/// # Errors
///
/// Returns [`EngineError::AllProvidersFailed`] only when the fan-in ran
/// to completion, every fetch failed, and no candidates arrived. A
/// cut-short fan-in is never an error; callers get the partial flag
/// instead.
pub async fn aggregate(
    query: &Query,
    variants: &[QueryVariant],
    providers: &[Arc<dyn Provider>],
    config: &EngineConfig,
    breaker: &Mutex<CircuitBreaker>,
    cancel: &CancellationToken,
) -> crate::error::Result<AggregateOutcome> {
    lock(breaker).set_config(config.breaker.clone());

    let semaphore = Arc::new(Semaphore::new(config.aggregate.max_in_flight));
    let fetch_timeout = Duration::from_secs(config.aggregate.fetch_timeout_secs);

    // pair id -> (source, variant tag), drained as fetches complete so
    // early fan-in knows what was still outstanding.
    let mut outstanding: HashMap<usize, (String, String)> = HashMap::new();
    let mut fetches = FuturesUnordered::new();

    for (variant_index, variant) in variants.iter().enumerate() {
        for provider in providers {
            if !query.allows_source(provider.source()) {
                continue;
            }
            let pair_id = outstanding.len();
            outstanding.insert(
                pair_id,
                (
                    provider.source().to_string(),
                    variant.strategy.tag().to_string(),
                ),
            );
            fetches.push(run_fetch(
                pair_id,
                variant_index,
                variant,
                query,
                Arc::clone(provider),
                Arc::clone(&semaphore),
                fetch_timeout,
                breaker,
            ));
        }
    }

    let deadline = tokio::time::sleep(Duration::from_secs(config.aggregate.total_timeout_secs));
    tokio::pin!(deadline);

    let mut collected: Vec<(usize, Candidate)> = Vec::new();
    let mut failures: Vec<FetchFailure> = Vec::new();
    let mut partial = false;

    while !fetches.is_empty() {
        tokio::select! {
            Some(outcome) = fetches.next() => {
                outstanding.remove(&outcome.pair_id);
                match outcome.result {
                    FetchResult::Candidates(candidates) => {
                        tracing::debug!(
                            source = %outcome.source,
                            variant = %outcome.variant_tag,
                            count = candidates.len(),
                            "provider returned candidates"
                        );
                        lock(breaker).record_success(&outcome.source);
                        collected.extend(
                            candidates
                                .into_iter()
                                .map(|candidate| (outcome.variant_index, candidate)),
                        );
                    }
                    FetchResult::Failed(reason) => {
                        tracing::warn!(
                            source = %outcome.source,
                            variant = %outcome.variant_tag,
                            reason = %reason,
                            "fetch contributed nothing"
                        );
                        if matches!(reason, FailureReason::Timeout | FailureReason::Provider(_)) {
                            lock(breaker).record_failure(&outcome.source);
                        }
                        failures.push(FetchFailure {
                            source: outcome.source,
                            variant_tag: outcome.variant_tag,
                            reason,
                        });
                    }
                }
            }
            () = cancel.cancelled() => {
                tracing::info!(outstanding = outstanding.len(), "search cancelled, finishing early");
                partial = true;
                break;
            }
            () = &mut deadline => {
                tracing::warn!(outstanding = outstanding.len(), "aggregation deadline reached, finishing early");
                partial = true;
                break;
            }
        }
    }
    // Dropping the set cancels every outstanding fetch.
    drop(fetches);

    if partial {
        for (source, variant_tag) in outstanding.into_values() {
            failures.push(FetchFailure {
                source,
                variant_tag,
                reason: FailureReason::Cancelled,
            });
        }
    }

    if !partial && collected.is_empty() && !failures.is_empty() {
        let detail = failures
            .iter()
            .map(|f| format!("{}/{}: {}", f.source, f.variant_tag, f.reason))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(EngineError::AllProvidersFailed(detail));
    }

    let candidates = dedup::dedup(collected);
    tracing::debug!(
        candidates = candidates.len(),
        failures = failures.len(),
        partial,
        "aggregation complete"
    );
    Ok(AggregateOutcome {
        candidates,
        failures,
        partial,
    })
}

/// Runs one bounded, breaker-guarded, timed fetch.
#[allow(clippy::too_many_arguments)]
async fn run_fetch(
    pair_id: usize,
    variant_index: usize,
    variant: &QueryVariant,
    query: &Query,
    provider: Arc<dyn Provider>,
    semaphore: Arc<Semaphore>,
    fetch_timeout: Duration,
    breaker: &Mutex<CircuitBreaker>,
) -> FetchOutcome {
    let source = provider.source().to_string();
    let variant_tag = variant.strategy.tag().to_string();
    let outcome = |result| FetchOutcome {
        pair_id,
        source: source.clone(),
        variant_tag: variant_tag.clone(),
        variant_index,
        result,
    };

    let _permit = match Arc::clone(&semaphore).acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return outcome(FetchResult::Failed(FailureReason::Cancelled)),
    };

    // Checked at dispatch time, not build time, so a source opened by an
    // earlier fetch in the same call is skipped too.
    if !lock(breaker).should_attempt(&source) {
        tracing::debug!(source = %source, "circuit open, skipping fetch");
        return outcome(FetchResult::Failed(FailureReason::CircuitOpen));
    }

    match tokio::time::timeout(fetch_timeout, provider.fetch(variant, query)).await {
        Ok(Ok(candidates)) => outcome(FetchResult::Candidates(candidates)),
        Ok(Err(err)) => outcome(FetchResult::Failed(FailureReason::Provider(err.to_string()))),
        Err(_) => outcome(FetchResult::Failed(FailureReason::Timeout)),
    }
}

fn lock(breaker: &Mutex<CircuitBreaker>) -> MutexGuard<'_, CircuitBreaker> {
    breaker.lock().unwrap_or_else(PoisonError::into_inner)
}
