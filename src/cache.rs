//! In-memory cache for complete search results.
//!
//! Caches the final ranked result set keyed by the (normalised query,
//! type hint, effective source set) triple. Uses [`moka`] for
//! async-friendly caching with TTL and automatic eviction. Partial
//! results are never inserted; a degraded pass must not mask a later
//! healthy one.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use std::time::Duration;

use moka::future::Cache;

use crate::types::{MediaType, ScoredCandidate};

/// Maximum number of cached result sets.
const MAX_CACHE_ENTRIES: u64 = 100;

/// Global process-wide result cache.
///
/// Lazily initialised on first access. TTL is set when first created
/// and cannot be changed after initialisation.
static CACHE: OnceLock<Cache<CacheKey, Vec<ScoredCandidate>>> = OnceLock::new();

/// Composite cache key: normalised query + type hint + source set hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Lowercased, trimmed query text.
    query: String,
    /// Media type hint tag, empty when the query carries none.
    type_tag: &'static str,
    /// Hash of the sorted effective source set, so the same query
    /// against different providers caches separately.
    source_hash: u64,
}

impl CacheKey {
    /// Builds a deterministic cache key.
    ///
    /// The query text is lowercased and trimmed. `sources` should be the
    /// effective set the search will actually consult (providers admitted
    /// by the query's source filter); it is sorted before hashing so
    /// provider registration order does not matter.
    pub fn new(raw_text: &str, type_hint: Option<MediaType>, sources: &[&str]) -> Self {
        Self {
            query: raw_text.trim().to_lowercase(),
            type_tag: type_hint.map_or("", |t| t.name()),
            source_hash: hash_sources(sources),
        }
    }
}

fn get_or_init_cache(ttl_seconds: u64) -> &'static Cache<CacheKey, Vec<ScoredCandidate>> {
    CACHE.get_or_init(|| {
        Cache::builder()
            .max_capacity(MAX_CACHE_ENTRIES)
            .time_to_live(Duration::from_secs(ttl_seconds))
            .build()
    })
}

/// Looks up cached results for the given key.
pub async fn get(key: &CacheKey, ttl_seconds: u64) -> Option<Vec<ScoredCandidate>> {
    let cache = get_or_init_cache(ttl_seconds);
    cache.get(key).await
}

/// Inserts ranked results into the cache.
pub async fn insert(key: CacheKey, results: Vec<ScoredCandidate>, ttl_seconds: u64) {
    let cache = get_or_init_cache(ttl_seconds);
    cache.insert(key, results).await;
}

/// Deterministic hash of a source name set, order independent.
fn hash_sources(sources: &[&str]) -> u64 {
    let mut sorted: Vec<&str> = sources.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut hasher = DefaultHasher::new();
    for source in sorted {
        source.hash(&mut hasher);
    }
    hasher.finish()
}
