//! Trait definition for pluggable media source providers.
//!
//! Each discovery source (a metadata API, an indexer, an RSS feed)
//! implements [`Provider`] to expose a uniform fetch interface. The
//! aggregator treats every provider identically: fan out, bound, time
//! out, record failures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::types::{Candidate, Query, QueryVariant};

/// A pluggable media discovery source.
///
/// Implementors talk to one upstream source and map its responses into
/// [`Candidate`] values. Each provider handles its own:
///
/// - request construction and authentication
/// - response decoding into candidate metadata
/// - source-specific quirks (pagination, rate limits)
///
/// Implementations must be `Send + Sync`; the aggregator shares them
/// across concurrent fetches behind `Arc<dyn Provider>`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable source name, e.g. `tmdb` or `douban`.
    ///
    /// Used for circuit breaking, source weighting, candidate identity,
    /// and the query's source filter, so it must not change between
    /// calls.
    fn source(&self) -> &str;

    /// Fetches candidates for one expanded query variant.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the upstream cannot be reached,
    /// rejects the request, or responds with something undecodable. The
    /// aggregator recovers these into [`FetchFailure`] records; they
    /// never abort the overall search.
    async fn fetch(
        &self,
        variant: &QueryVariant,
        query: &Query,
    ) -> Result<Vec<Candidate>, ProviderError>;
}

/// Why a single fetch produced no candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The fetch exceeded the per-fetch timeout.
    Timeout,
    /// The source's circuit breaker was open; the provider was not called.
    CircuitOpen,
    /// The search was cancelled before this fetch completed.
    Cancelled,
    /// The provider returned an error.
    Provider(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::CircuitOpen => write!(f, "circuit open"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Provider(msg) => write!(f, "provider: {msg}"),
        }
    }
}

/// Record of one fetch that contributed nothing to the result set.
///
/// Failures ride along on the search outcome so callers can tell a
/// complete answer from a degraded one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    /// Source that failed.
    pub source: String,
    /// Strategy tag of the query variant being fetched, e.g. `raw`.
    pub variant_tag: String,
    /// What went wrong.
    pub reason: FailureReason,
}

impl FetchFailure {
    pub fn new(source: impl Into<String>, variant: &QueryVariant, reason: FailureReason) -> Self {
        Self {
            source: source.into(),
            variant_tag: variant.strategy.tag().to_string(),
            reason,
        }
    }
}
