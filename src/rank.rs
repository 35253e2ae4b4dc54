//! Deterministic relevance ranking.
//!
//! Scores every candidate against the original query, then sorts with a
//! fixed tie-break chain so equal inputs always produce the same order:
//! relevance score, then source weight, then fetch recency, then title.
//! Comparisons use `total_cmp`, so ordering is total even if a scoring
//! input smuggles in a non-finite value.

use std::cmp::Ordering;

use crate::config::ScoringConfig;
use crate::similarity;
use crate::types::{Candidate, Query, ScoredCandidate};

/// An ordered result set with stable, 1-based ranks.
#[derive(Debug, Clone)]
pub struct Ranking {
    /// Candidates sorted best-first, each carrying its global rank.
    pub results: Vec<ScoredCandidate>,
}

impl Ranking {
    /// One page of results. Ranks are assigned before pagination, so an
    /// entry keeps the same rank no matter which page it lands on.
    ///
    /// An `offset` past the end returns an empty slice.
    pub fn page(&self, limit: usize, offset: usize) -> &[ScoredCandidate] {
        let start = offset.min(self.results.len());
        let end = start.saturating_add(limit).min(self.results.len());
        &self.results[start..end]
    }

    /// Keeps only the first `max` results. Ranks stay contiguous.
    pub fn truncate(&mut self, max: usize) {
        self.results.truncate(max);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_results(self) -> Vec<ScoredCandidate> {
        self.results
    }
}

/// Scores and orders candidates for a query.
///
/// # Ordering
///
/// 1. Relevance score, descending
/// 2. Source weight, descending
/// 3. Fetch time, newest first
/// 4. Title, ascending
pub fn rank(candidates: Vec<Candidate>, query: &Query, config: &ScoringConfig) -> Ranking {
    let mut results: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|candidate| {
            let relevance_score = similarity::relevance(&candidate, query, config);
            ScoredCandidate {
                candidate,
                relevance_score,
                rank: 0,
            }
        })
        .collect();

    results.sort_by(|a, b| compare(a, b, config));

    for (index, entry) in results.iter_mut().enumerate() {
        entry.rank = (index + 1) as u32;
    }

    Ranking { results }
}

fn compare(a: &ScoredCandidate, b: &ScoredCandidate, config: &ScoringConfig) -> Ordering {
    b.relevance_score
        .total_cmp(&a.relevance_score)
        .then_with(|| {
            config
                .source_weight(&b.candidate.source)
                .total_cmp(&config.source_weight(&a.candidate.source))
        })
        .then_with(|| b.candidate.fetched_at.cmp(&a.candidate.fetched_at))
        .then_with(|| a.candidate.title.cmp(&b.candidate.title))
}
