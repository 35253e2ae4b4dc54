//! Core types for media queries, source candidates, and scored results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::provider::FetchFailure;

/// Broad media categories a query can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Feature films.
    Movie,
    /// Television series.
    Tv,
    /// Animated series and films.
    Anime,
}

impl MediaType {
    /// Returns the lowercase name of this media type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
            Self::Anime => "anime",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A user search request. Immutable once created; expansion derives
/// [`QueryVariant`]s from it without modifying the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// The search phrase as the user typed it.
    pub raw_text: String,
    /// Optional media category used to pick expansion suffixes and filter
    /// scoring context.
    pub type_hint: Option<MediaType>,
    /// Restrict the search to these provider sources. Empty means all.
    pub source_filter: Vec<String>,
}

impl Query {
    /// Creates a query for the given phrase with no type hint and no
    /// source restriction.
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            type_hint: None,
            source_filter: Vec::new(),
        }
    }

    /// Sets the media category hint.
    pub fn with_type_hint(mut self, hint: MediaType) -> Self {
        self.type_hint = Some(hint);
        self
    }

    /// Restricts the search to the named provider sources.
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_filter = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a provider source passes this query's source filter.
    /// An empty filter admits every source.
    pub fn allows_source(&self, source: &str) -> bool {
        self.source_filter.is_empty() || self.source_filter.iter().any(|s| s == source)
    }
}

/// How a query variant was derived from the raw phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStrategy {
    /// The raw phrase itself, always first.
    Raw,
    /// Trailing release-year token removed.
    StripYear,
    /// Disambiguating media suffix appended.
    SuffixAdded,
    /// Simplified Han text converted to traditional form.
    TraditionalForm,
    /// Traditional Han text converted to simplified form.
    SimplifiedForm,
    /// Phonetic latin spelling of Han text.
    Pinyin,
}

impl VariantStrategy {
    /// Returns the stable tag for this strategy, used in logs and
    /// failure records.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::StripYear => "strip_year",
            Self::SuffixAdded => "suffix_added",
            Self::TraditionalForm => "traditional_form",
            Self::SimplifiedForm => "simplified_form",
            Self::Pinyin => "pinyin",
        }
    }
}

impl fmt::Display for VariantStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One expanded form of a query phrase. Variants are ordered most
/// specific first; the position in that order decides which duplicate
/// wins during aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryVariant {
    /// The text sent to providers.
    pub text: String,
    /// How this variant was derived.
    pub strategy: VariantStrategy,
}

impl QueryVariant {
    pub fn new(text: impl Into<String>, strategy: VariantStrategy) -> Self {
        Self {
            text: text.into(),
            strategy,
        }
    }
}

/// Well-known descriptive fields a source may report for a candidate.
/// Everything is optional; heterogeneous sources fill what they have.
/// Fields a source invents beyond these land in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateMetadata {
    /// Release quality tag, e.g. "REMUX", "BluRay", "WEB-DL".
    pub quality: Option<String>,
    /// Release year.
    pub year: Option<i32>,
    /// Aggregate rating on the source's own scale.
    pub rating: Option<f64>,
    /// Primary genre.
    pub genre: Option<String>,
    /// Director name.
    pub director: Option<String>,
    /// Cast names.
    pub actors: Vec<String>,
    /// Video resolution tag, e.g. "1080p", "2160p".
    pub resolution: Option<String>,
    /// Season number for episodic media.
    pub season: Option<u32>,
    /// Source-specific extension fields that have no well-known slot.
    pub extra: HashMap<String, serde_json::Value>,
}

/// A media item returned by a source provider for one query variant.
/// Never mutated after creation; scoring attaches to a derived
/// [`ScoredCandidate`] view instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Source-scoped identifier. `(source, id)` is the external identity.
    pub id: String,
    /// Title as reported by the source.
    pub title: String,
    /// Media category, when the source knows it.
    pub media_type: Option<MediaType>,
    /// Which provider source produced this candidate.
    pub source: String,
    /// Descriptive fields reported by the source.
    pub metadata: CandidateMetadata,
    /// The source's own relevance score, if it reports one.
    pub raw_score: f64,
    /// When the candidate was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl Candidate {
    /// Creates a candidate with empty metadata, a zero raw score, and the
    /// current time as its fetch timestamp.
    pub fn new(
        source: impl Into<String>,
        id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            media_type: None,
            source: source.into(),
            metadata: CandidateMetadata::default(),
            raw_score: 0.0,
            fetched_at: Utc::now(),
        }
    }
}

/// A candidate with its computed relevance and final position. Read-only
/// view produced by ranking; the underlying candidate is unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    /// Computed relevance, zero or higher.
    pub relevance_score: f64,
    /// 1-based position in the ranking.
    pub rank: u32,
}

/// The outcome of a full search pass. `partial` is set whenever the
/// aggregation deadline or a caller cancellation cut the fan-out short;
/// the results present are still fully ranked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Ranked candidates, best first.
    pub results: Vec<ScoredCandidate>,
    /// True when some fetches never completed.
    pub partial: bool,
    /// One record per fetch that produced no candidates.
    pub failures: Vec<FetchFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_defaults_admit_every_source() {
        let query = Query::new("dune");
        assert!(query.type_hint.is_none());
        assert!(query.allows_source("tmdb"));
        assert!(query.allows_source("anything"));
    }

    #[test]
    fn query_source_filter_restricts() {
        let query = Query::new("dune").with_sources(["tmdb", "douban"]);
        assert!(query.allows_source("tmdb"));
        assert!(query.allows_source("douban"));
        assert!(!query.allows_source("rss"));
    }

    #[test]
    fn query_builder_sets_type_hint() {
        let query = Query::new("dune").with_type_hint(MediaType::Movie);
        assert_eq!(query.type_hint, Some(MediaType::Movie));
    }

    #[test]
    fn media_type_display_matches_name() {
        assert_eq!(MediaType::Movie.to_string(), "movie");
        assert_eq!(MediaType::Tv.to_string(), "tv");
        assert_eq!(MediaType::Anime.to_string(), "anime");
    }

    #[test]
    fn media_type_serde_is_lowercase() {
        let json = serde_json::to_string(&MediaType::Movie).expect("serialize");
        assert_eq!(json, "\"movie\"");
        let decoded: MediaType = serde_json::from_str("\"anime\"").expect("deserialize");
        assert_eq!(decoded, MediaType::Anime);
    }

    #[test]
    fn variant_strategy_tags_are_stable() {
        assert_eq!(VariantStrategy::Raw.tag(), "raw");
        assert_eq!(VariantStrategy::StripYear.tag(), "strip_year");
        assert_eq!(VariantStrategy::SuffixAdded.tag(), "suffix_added");
        assert_eq!(VariantStrategy::TraditionalForm.tag(), "traditional_form");
        assert_eq!(VariantStrategy::SimplifiedForm.tag(), "simplified_form");
        assert_eq!(VariantStrategy::Pinyin.tag(), "pinyin");
    }

    #[test]
    fn candidate_new_fills_defaults() {
        let candidate = Candidate::new("tmdb", "603", "The Matrix");
        assert_eq!(candidate.source, "tmdb");
        assert_eq!(candidate.id, "603");
        assert_eq!(candidate.title, "The Matrix");
        assert!(candidate.metadata.quality.is_none());
        assert!(candidate.metadata.extra.is_empty());
        assert!((candidate.raw_score - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn candidate_serde_round_trip() {
        let mut candidate = Candidate::new("douban", "1292052", "肖申克的救赎");
        candidate.metadata.rating = Some(9.7);
        candidate.metadata.year = Some(1994);
        candidate
            .metadata
            .extra
            .insert("imdb_id".into(), serde_json::json!("tt0111161"));
        let json = serde_json::to_string(&candidate).expect("serialize");
        let decoded: Candidate = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded.id, "1292052");
        assert_eq!(decoded.metadata.year, Some(1994));
        assert_eq!(
            decoded.metadata.extra.get("imdb_id"),
            Some(&serde_json::json!("tt0111161"))
        );
    }

    #[test]
    fn candidate_metadata_deserializes_sparse_documents() {
        let decoded: CandidateMetadata =
            serde_json::from_str(r#"{"rating": 8.1}"#).expect("deserialize");
        assert_eq!(decoded.rating, Some(8.1));
        assert!(decoded.quality.is_none());
        assert!(decoded.actors.is_empty());
    }
}
