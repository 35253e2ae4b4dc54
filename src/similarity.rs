//! Title similarity and candidate relevance scoring.
//!
//! Similarity is Levenshtein distance normalized over character counts,
//! so Han titles compare as naturally as latin ones. Relevance is an
//! additive sum:
//!
//! ```text
//! relevance = tier_bonus + source_weight + quality_weight + rating_factor * rating
//! ```
//!
//! where `tier_bonus` depends on how the candidate title matches the
//! query phrase: exact beats substring beats fuzzy beats none. The
//! magnitudes all come from [`ScoringConfig`]; only the tier ordering is
//! fixed.

use crate::config::ScoringConfig;
use crate::types::{Candidate, Query};

/// Normalized similarity between two strings in `[0, 1]`.
///
/// Case-insensitive Levenshtein distance divided by the longer character
/// count. Two empty strings are identical by convention.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Which title-match tier a candidate hit, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Title equals the query phrase, ignoring case.
    Exact,
    /// One of title and phrase contains the other.
    Substring,
    /// Similarity reached the configured fuzzy threshold.
    Fuzzy,
    /// No meaningful match.
    None,
}

/// Classify how a candidate title matches the query phrase.
///
/// Comparison is case-insensitive over trimmed input. An empty side
/// never matches a non-empty one; substring containment counts in both
/// directions.
pub fn match_tier(title: &str, phrase: &str, config: &ScoringConfig) -> MatchTier {
    let title = title.trim().to_lowercase();
    let phrase = phrase.trim().to_lowercase();

    if title.is_empty() || phrase.is_empty() {
        return if title == phrase {
            MatchTier::Exact
        } else {
            MatchTier::None
        };
    }
    if title == phrase {
        return MatchTier::Exact;
    }
    if title.contains(&phrase) || phrase.contains(&title) {
        return MatchTier::Substring;
    }
    if similarity(&title, &phrase) >= config.fuzzy_threshold {
        return MatchTier::Fuzzy;
    }
    MatchTier::None
}

fn tier_bonus(tier: MatchTier, config: &ScoringConfig) -> f64 {
    match tier {
        MatchTier::Exact => config.exact_bonus,
        MatchTier::Substring => config.substring_bonus,
        MatchTier::Fuzzy => config.fuzzy_bonus,
        MatchTier::None => 0.0,
    }
}

/// Compute the relevance of a candidate for a query. Always zero or
/// higher.
///
/// The title is compared against the query's raw phrase, not the variant
/// that fetched the candidate; variants only widen discovery.
pub fn relevance(candidate: &Candidate, query: &Query, config: &ScoringConfig) -> f64 {
    let tier = match_tier(&candidate.title, &query.raw_text, config);
    let mut score = tier_bonus(tier, config);

    score += config.source_weight(&candidate.source);
    if let Some(quality) = &candidate.metadata.quality {
        score += config.quality_weight(quality);
    }
    if let Some(rating) = candidate.metadata.rating {
        score += config.rating_factor * rating;
    }

    score.max(0.0)
}
