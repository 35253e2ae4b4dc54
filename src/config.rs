//! Engine configuration with sensible defaults.
//!
//! [`EngineConfig`] controls query expansion, relevance scoring weights,
//! aggregation concurrency and timeouts, caching, and the per-source
//! circuit breaker. Every struct deserializes from a partial document,
//! filling missing fields from defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::circuit_breaker::BreakerConfig;
use crate::error::EngineError;
use crate::types::MediaType;

/// Top-level configuration for the discovery engine.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Query expansion strategy toggles and limits.
    pub expansion: ExpansionConfig,
    /// Relevance scoring bonuses and weight tables.
    pub scoring: ScoringConfig,
    /// Fan-out concurrency and timeout limits.
    pub aggregate: AggregateConfig,
    /// Per-source circuit breaker thresholds.
    pub breaker: BreakerConfig,
    /// Maximum number of results returned after ranking.
    pub max_results: usize,
    /// How long to cache complete search outcomes, in seconds.
    /// Set to 0 to disable caching.
    pub cache_ttl_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            expansion: ExpansionConfig::default(),
            scoring: ScoringConfig::default(),
            aggregate: AggregateConfig::default(),
            breaker: BreakerConfig::default(),
            max_results: 50,
            cache_ttl_seconds: 600,
        }
    }
}

impl EngineConfig {
    /// Validates this configuration, returning an error if any field is
    /// invalid.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_results == 0 {
            return Err(EngineError::Config(
                "max_results must be greater than 0".into(),
            ));
        }
        if self.expansion.max_variants == 0 {
            return Err(EngineError::Config(
                "max_variants must be greater than 0".into(),
            ));
        }
        if self.aggregate.max_in_flight == 0 {
            return Err(EngineError::Config(
                "max_in_flight must be greater than 0".into(),
            ));
        }
        if self.aggregate.fetch_timeout_secs == 0 || self.aggregate.total_timeout_secs == 0 {
            return Err(EngineError::Config(
                "timeouts must be greater than 0".into(),
            ));
        }
        if self.aggregate.fetch_timeout_secs >= self.aggregate.total_timeout_secs {
            return Err(EngineError::Config(
                "fetch_timeout_secs must be less than total_timeout_secs".into(),
            ));
        }
        if !(self.scoring.fuzzy_threshold > 0.0 && self.scoring.fuzzy_threshold <= 1.0) {
            return Err(EngineError::Config(
                "fuzzy_threshold must be within (0, 1]".into(),
            ));
        }
        if self.scoring.fuzzy_bonus < 0.0
            || self.scoring.substring_bonus < self.scoring.fuzzy_bonus
            || self.scoring.exact_bonus < self.scoring.substring_bonus
        {
            return Err(EngineError::Config(
                "title bonuses must satisfy exact >= substring >= fuzzy >= 0".into(),
            ));
        }
        if self.scoring.default_source_weight < 0.0 {
            return Err(EngineError::Config(
                "default_source_weight must not be negative".into(),
            ));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(EngineError::Config(
                "failure_threshold must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Controls which expansion strategies run and how many variants survive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Strip a trailing release-year token from the phrase.
    pub strip_year: bool,
    /// Append a media-type suffix to short Han phrases.
    pub media_suffixes: bool,
    /// Convert between simplified and traditional Han forms.
    pub transliterate: bool,
    /// Add a latin phonetic spelling for Han phrases.
    pub phonetic: bool,
    /// Hard cap on the number of variants per query.
    pub max_variants: usize,
    /// Phrases at or under this many characters count as short for the
    /// suffix strategy.
    pub short_phrase_chars: usize,
    /// Suffix appended per media type name, e.g. `movie` to `剧场版`.
    pub suffixes: HashMap<String, String>,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            strip_year: true,
            media_suffixes: true,
            transliterate: true,
            phonetic: true,
            max_variants: 6,
            short_phrase_chars: 5,
            suffixes: HashMap::from([
                ("movie".to_string(), "剧场版".to_string()),
                ("tv".to_string(), "动画版".to_string()),
                ("anime".to_string(), "动画版".to_string()),
            ]),
        }
    }
}

impl ExpansionConfig {
    /// The configured suffix for a media type, if any.
    pub fn suffix_for(&self, media: MediaType) -> Option<&str> {
        self.suffixes.get(media.name()).map(String::as_str)
    }
}

/// Relevance scoring bonuses and weight tables. Magnitudes are tunable;
/// validation only enforces that exact beats substring beats fuzzy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Bonus for an exact case-insensitive title match.
    pub exact_bonus: f64,
    /// Bonus when one title contains the other.
    pub substring_bonus: f64,
    /// Bonus when title similarity reaches `fuzzy_threshold`.
    pub fuzzy_bonus: f64,
    /// Minimum normalized similarity for the fuzzy bonus.
    pub fuzzy_threshold: f64,
    /// Per-source priority weights.
    pub source_weights: HashMap<String, f64>,
    /// Weight for sources missing from `source_weights`. Kept low so
    /// unknown sources rank below configured ones.
    pub default_source_weight: f64,
    /// Per-quality-tag weights, keyed lowercase.
    pub quality_weights: HashMap<String, f64>,
    /// Multiplier applied to a candidate's numeric rating.
    pub rating_factor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            exact_bonus: 10.0,
            substring_bonus: 5.0,
            fuzzy_bonus: 2.0,
            fuzzy_threshold: 0.7,
            source_weights: HashMap::from([
                ("tmdb".to_string(), 1.2),
                ("douban".to_string(), 1.0),
                ("bangumi".to_string(), 1.0),
                ("rss".to_string(), 0.8),
            ]),
            default_source_weight: 0.5,
            quality_weights: HashMap::from([
                ("remux".to_string(), 1.5),
                ("bluray".to_string(), 1.2),
                ("web-dl".to_string(), 1.0),
                ("hdtv".to_string(), 0.6),
            ]),
            rating_factor: 0.1,
        }
    }
}

impl ScoringConfig {
    /// The priority weight for a source, falling back to the default for
    /// sources not in the table.
    pub fn source_weight(&self, source: &str) -> f64 {
        self.source_weights
            .get(source)
            .copied()
            .unwrap_or(self.default_source_weight)
    }

    /// The weight for a quality tag. Lookup is case-insensitive; unknown
    /// tags contribute nothing.
    pub fn quality_weight(&self, tag: &str) -> f64 {
        self.quality_weights
            .get(&tag.to_lowercase())
            .copied()
            .unwrap_or(0.0)
    }
}

/// Fan-out limits for the aggregation phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Maximum concurrent provider fetches.
    pub max_in_flight: usize,
    /// Timeout for a single provider fetch, in seconds.
    pub fetch_timeout_secs: u64,
    /// Deadline for the whole fan-out, in seconds. When it fires the
    /// outcome is returned with whatever has been collected, flagged
    /// partial.
    pub total_timeout_secs: u64,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            fetch_timeout_secs: 8,
            total_timeout_secs: 30,
        }
    }
}
