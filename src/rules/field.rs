//! Field path resolution over candidates.
//!
//! Rules address candidate data through dotted paths. Resolution checks
//! the candidate's fixed fields first, then the well-known metadata
//! fields (addressable bare or behind a `metadata.` prefix), then the
//! source-specific extension map with dotted descent into nested
//! documents. A path that resolves to nothing yields `None`; the engine
//! turns that into a non-match rather than an error.

use serde_json::Value;

use crate::error::RuleError;
use crate::types::Candidate;

/// Checks that a field path is syntactically usable: non-empty and
/// without empty segments.
pub(crate) fn validate_path(field: &str) -> Result<(), RuleError> {
    if field.trim().is_empty() || field.split('.').any(|segment| segment.trim().is_empty()) {
        return Err(RuleError::InvalidFieldPath {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Resolves a dotted field path against a candidate.
pub(crate) fn resolve(candidate: &Candidate, path: &str) -> Option<Value> {
    match path {
        "id" => return Some(Value::String(candidate.id.clone())),
        "title" => return Some(Value::String(candidate.title.clone())),
        "source" => return Some(Value::String(candidate.source.clone())),
        "type" | "media_type" => {
            return candidate
                .media_type
                .map(|t| Value::String(t.name().to_string()));
        }
        "raw_score" => return number(candidate.raw_score),
        _ => {}
    }

    let name = path.strip_prefix("metadata.").unwrap_or(path);
    if let Some(value) = metadata_field(candidate, name) {
        return Some(value);
    }
    extra_field(candidate, name)
}

fn metadata_field(candidate: &Candidate, name: &str) -> Option<Value> {
    let meta = &candidate.metadata;
    match name {
        "quality" => meta.quality.clone().map(Value::String),
        "year" => meta.year.map(|y| Value::Number(y.into())),
        "rating" => meta.rating.and_then(number),
        "genre" => meta.genre.clone().map(Value::String),
        "director" => meta.director.clone().map(Value::String),
        "actors" => {
            if meta.actors.is_empty() {
                None
            } else {
                Some(Value::Array(
                    meta.actors.iter().cloned().map(Value::String).collect(),
                ))
            }
        }
        "resolution" => meta.resolution.clone().map(Value::String),
        "season" => meta.season.map(|s| Value::Number(s.into())),
        _ => None,
    }
}

/// Looks the first segment up in the extension map, then descends into
/// nested documents segment by segment.
fn extra_field(candidate: &Candidate, name: &str) -> Option<Value> {
    let mut segments = name.split('.');
    let mut value = candidate.metadata.extra.get(segments.next()?)?;
    for segment in segments {
        value = value.get(segment)?;
    }
    Some(value.clone())
}

fn number(value: impl Into<f64>) -> Option<Value> {
    serde_json::Number::from_f64(value.into()).map(Value::Number)
}
