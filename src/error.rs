//! Error types for the discovery engine.
//!
//! Per-fetch provider failures and condition coercion failures are
//! recovered locally and never surface through these types; callers only
//! see configuration errors, rule definition errors, and total
//! aggregation failure.

/// Errors surfaced by the engine's entry points.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Every fetch in an aggregation pass failed and nothing was collected.
    #[error("all providers failed: {0}")]
    AllProvidersFailed(String),

    /// Invalid engine configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A rule was rejected at definition time.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Why a rule definition was rejected. Each variant names the condition
/// field it concerns so a host can point at the broken condition.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// A regex condition carries a pattern that does not compile.
    #[error("condition on `{field}`: invalid regex: {reason}")]
    InvalidRegex { field: String, reason: String },

    /// A condition's field path is empty or contains empty segments.
    #[error("condition on `{field}`: malformed field path")]
    InvalidFieldPath { field: String },

    /// A condition's value has the wrong shape for its operator.
    #[error("condition on `{field}`: expected {expected} value")]
    InvalidValue {
        field: String,
        expected: &'static str,
    },
}

/// Errors a source provider can return from a single fetch. These are
/// recorded per fetch and folded into the aggregation outcome rather
/// than propagated.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The source did not answer in time.
    #[error("request timed out")]
    Timeout,

    /// The source refused or could not be reached.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The source answered with something unreadable.
    #[error("malformed response: {0}")]
    Decode(String),

    /// Anything else the provider wants to report.
    #[error("{0}")]
    Other(String),
}
