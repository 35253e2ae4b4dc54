//! # seine
//!
//! Media discovery and subscription matching engine.
//!
//! Seine turns a free-form search phrase into ranked media candidates
//! and turns user-defined rules into triggered actions. It owns the
//! pipeline between the two: query expansion, concurrent multi-source
//! aggregation, relevance ranking, rule evaluation, and idempotent
//! dispatch. Providers, action execution, and history persistence are
//! injected by the host.
//!
//! ## Design
//!
//! - Expands CJK-aware query variants (year stripping, simplified and
//!   traditional forms, pinyin, media suffixes) before fanning out
//! - Queries all providers concurrently with bounded in-flight fetches,
//!   per-fetch timeouts, a global deadline, and per-source circuit
//!   breaking
//! - Partial failures degrade the result instead of failing it; the
//!   outcome says exactly which fetches contributed nothing
//! - Ranking is deterministic: identical inputs always produce the same
//!   order
//! - Rules are validated when defined and evaluated leniently, so a
//!   heterogeneous candidate can never error a scan
//! - Matches dispatch exactly once per (rule, candidate) pair, backed
//!   by a swappable history store

pub mod aggregate;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod expand;
pub mod provider;
pub mod rank;
pub mod rules;
pub mod similarity;
pub mod types;

use std::sync::Arc;

pub use tokio_util::sync::CancellationToken;

pub use aggregate::AggregateOutcome;
pub use circuit_breaker::{BreakerConfig, CircuitState};
pub use config::{AggregateConfig, EngineConfig, ExpansionConfig, ScoringConfig};
pub use dispatch::{ActionExecutor, HistoryStore, MemoryHistory};
pub use error::{EngineError, ProviderError, Result, RuleError};
pub use provider::{FailureReason, FetchFailure, Provider};
pub use rank::Ranking;
pub use rules::{Action, Condition, ConditionOperator, Rule};
pub use types::{
    Candidate, CandidateMetadata, MediaType, Query, QueryVariant, ScoredCandidate, SearchOutcome,
    VariantStrategy,
};

/// Searches all providers for a query and returns ranked candidates.
///
/// # Pipeline
///
/// 1. Validate `config`
/// 2. Serve from the result cache when a complete answer is fresh
/// 3. Expand the query into variants
/// 4. Aggregate candidates across providers (see [`aggregate::aggregate`])
/// 5. Rank deterministically and truncate to `config.max_results`
/// 6. Cache the results, unless the pass was partial
///
/// A blank query returns an empty outcome without touching any provider.
///
/// # Errors
///
/// Returns [`EngineError::Config`] for an invalid configuration and
/// [`EngineError::AllProvidersFailed`] when every fetch failed and
/// nothing was collected. Individual fetch failures do not error; they
/// ride along in [`SearchOutcome::failures`].
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # async fn example(providers: Vec<Arc<dyn seine::Provider>>) -> seine::Result<()> {
/// let query = seine::Query::new("流浪地球 2023").with_type_hint(seine::MediaType::Movie);
/// let config = seine::EngineConfig::default();
///
/// let outcome = seine::search(&query, &providers, &config).await?;
/// for item in &outcome.results {
///     println!("#{} {} ({:.1})", item.rank, item.candidate.title, item.relevance_score);
/// }
/// if outcome.partial {
///     eprintln!("degraded: {} fetches contributed nothing", outcome.failures.len());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search(
    query: &Query,
    providers: &[Arc<dyn Provider>],
    config: &EngineConfig,
) -> Result<SearchOutcome> {
    search_with_cancellation(query, providers, config, &CancellationToken::new()).await
}

/// [`search`] with caller-held cancellation.
///
/// When `cancel` fires mid-flight, the fan-out stops issuing fetches,
/// abandons the ones still running, and whatever was collected so far
/// is ranked and returned with `partial` set. Cancellation is never an
/// error.
pub async fn search_with_cancellation(
    query: &Query,
    providers: &[Arc<dyn Provider>],
    config: &EngineConfig,
    cancel: &CancellationToken,
) -> Result<SearchOutcome> {
    config.validate()?;

    let sources: Vec<&str> = providers
        .iter()
        .map(|p| p.source())
        .filter(|s| query.allows_source(s))
        .collect();

    let cache_key = cache::CacheKey::new(&query.raw_text, query.type_hint, &sources);
    if config.cache_ttl_seconds > 0 {
        if let Some(results) = cache::get(&cache_key, config.cache_ttl_seconds).await {
            tracing::debug!(results = results.len(), "serving search from cache");
            return Ok(SearchOutcome {
                results,
                partial: false,
                failures: Vec::new(),
            });
        }
    }

    let variants = expand::expand(query, &config.expansion);
    if variants.is_empty() {
        tracing::debug!("blank query, nothing to search");
        return Ok(SearchOutcome {
            results: Vec::new(),
            partial: false,
            failures: Vec::new(),
        });
    }
    tracing::debug!(
        query = %query.raw_text,
        variants = variants.len(),
        providers = sources.len(),
        "starting search"
    );

    let aggregated = aggregate::aggregate(
        query,
        &variants,
        providers,
        config,
        circuit_breaker::global_breaker(),
        cancel,
    )
    .await?;

    let mut ranking = rank::rank(aggregated.candidates, query, &config.scoring);
    ranking.truncate(config.max_results);
    let results = ranking.into_results();

    if !aggregated.partial && config.cache_ttl_seconds > 0 {
        cache::insert(cache_key, results.clone(), config.cache_ttl_seconds).await;
    }

    Ok(SearchOutcome {
        results,
        partial: aggregated.partial,
        failures: aggregated.failures,
    })
}

/// Evaluates rules against candidates and dispatches every new match.
///
/// Each candidate is checked against every enabled rule; matches
/// dispatch in rule priority order. The history store suppresses pairs
/// that already fired in an earlier scan, so rescanning the same feed
/// is safe. Returns every action emitted during this scan.
///
/// # Errors
///
/// Returns [`RuleError`] (via [`EngineError::Rule`]) when a rule
/// definition is malformed. Definitions are checked up front so a bad
/// rule is reported instead of silently matching nothing. Per-candidate
/// evaluation never errors.
///
/// # Examples
///
/// ```no_run
/// # async fn example(candidates: Vec<seine::Candidate>) -> seine::Result<()> {
/// use seine::{ConditionOperator, MemoryHistory, Rule};
/// use serde_json::json;
///
/// struct Collector;
/// impl seine::ActionExecutor for Collector {
///     fn submit(&self, action: seine::Action) {
///         println!("triggered: {}", action.kind);
///     }
/// }
///
/// let rule = Rule::new("good movies")
///     .with_condition("type", ConditionOperator::Equals, json!("movie"))
///     .with_condition("rating", ConditionOperator::GreaterThan, json!(7.5))
///     .with_action("download", json!({ "dir": "/media/movies" }));
///
/// let history = MemoryHistory::new();
/// let actions = seine::scan_candidates(&candidates, &[rule], &history, &Collector).await?;
/// println!("{} actions emitted", actions.len());
/// # Ok(())
/// # }
/// ```
pub async fn scan_candidates(
    candidates: &[Candidate],
    rules: &[Rule],
    history: &dyn HistoryStore,
    executor: &dyn ActionExecutor,
) -> Result<Vec<Action>> {
    for rule in rules {
        rule.validate()?;
    }

    let mut emitted = Vec::new();
    for candidate in candidates {
        let matched = rules::evaluate_all(rules, candidate);
        if matched.is_empty() {
            continue;
        }
        let pairs: Vec<(&Rule, &Candidate)> =
            matched.into_iter().map(|rule| (rule, candidate)).collect();
        emitted.extend(dispatch::dispatch(&pairs, history, executor).await);
    }

    tracing::debug!(
        candidates = candidates.len(),
        rules = rules.len(),
        actions = emitted.len(),
        "scan complete"
    );
    Ok(emitted)
}
