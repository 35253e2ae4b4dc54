//! Condition evaluation against candidates.
//!
//! Evaluation never fails. Heterogeneous sources legitimately omit
//! fields and disagree on types, so a missing field or an uncoercible
//! value makes the condition false instead of erroring the scan. Strict
//! checking happens once, at definition time (see [`Rule::validate`]).
//!
//! Coercion is directional: the candidate's field is bent toward the
//! shape of the rule's comparison value, never the other way around.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use serde_json::Value;
use tracing::warn;

use super::{field, Condition, ConditionOperator, Rule};
use crate::types::Candidate;

const REGEX_CACHE_MAX: usize = 256;

static REGEX_CACHE: OnceLock<RwLock<HashMap<String, regex::Regex>>> = OnceLock::new();

/// Evaluates a rule against a candidate. True only when the rule has at
/// least one condition and every condition holds.
pub fn evaluate(rule: &Rule, candidate: &Candidate) -> bool {
    if rule.conditions.is_empty() {
        return false;
    }
    rule.conditions
        .iter()
        .all(|condition| evaluate_condition(condition, candidate))
}

/// Returns every enabled rule that matches the candidate, highest
/// priority first. Rules with equal priority keep their input order.
///
/// Each rule is evaluated independently; one match never short-circuits
/// the rest, so a candidate can trigger several rules at once.
pub fn evaluate_all<'a>(rules: &'a [Rule], candidate: &Candidate) -> Vec<&'a Rule> {
    let mut matched: Vec<&Rule> = rules
        .iter()
        .filter(|rule| rule.enabled && evaluate(rule, candidate))
        .collect();
    matched.sort_by_key(|rule| std::cmp::Reverse(rule.priority));
    matched
}

fn evaluate_condition(condition: &Condition, candidate: &Candidate) -> bool {
    let Some(actual) = field::resolve(candidate, &condition.field) else {
        return false;
    };
    match condition.operator {
        ConditionOperator::Equals => values_equal(&actual, &condition.value),
        ConditionOperator::Contains => contains(&actual, &condition.value),
        ConditionOperator::Regex => regex_matches(&actual, condition),
        ConditionOperator::GreaterThan => compare_numeric(&actual, &condition.value, |a, b| a > b),
        ConditionOperator::LessThan => compare_numeric(&actual, &condition.value, |a, b| a < b),
        ConditionOperator::InList => in_list(&actual, &condition.value),
    }
}

/// Numeric comparisons go through f64 whenever either side is a number,
/// so an integer condition value matches a float field (serde_json keeps
/// `8` and `8.0` as distinct numbers). Everything else compares exactly
/// within its own type, with a boolean coercion fallback for
/// "true"/"false" strings.
fn values_equal(actual: &Value, expected: &Value) -> bool {
    if actual.is_number() || expected.is_number() {
        if let (Some(a), Some(b)) = (as_f64(actual), as_f64(expected)) {
            return a == b;
        }
    }
    if std::mem::discriminant(actual) == std::mem::discriminant(expected) {
        return actual == expected;
    }
    if let (Some(a), Some(b)) = (as_bool(actual), as_bool(expected)) {
        return a == b;
    }
    false
}

fn contains(actual: &Value, expected: &Value) -> bool {
    let (Some(haystack), Some(needle)) = (as_text(actual), as_text(expected)) else {
        return false;
    };
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn regex_matches(actual: &Value, condition: &Condition) -> bool {
    let Some(pattern) = condition.value.as_str() else {
        return false;
    };
    let Some(re) = cached_regex(pattern) else {
        // Reachable only for rules that bypassed definition-time
        // validation, e.g. loaded from an older store.
        warn!(
            field = %condition.field,
            pattern = %pattern,
            "skipping condition with invalid regex"
        );
        return false;
    };
    match as_text(actual) {
        Some(text) => re.is_match(&text),
        None => false,
    }
}

fn compare_numeric(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (as_f64(actual), as_f64(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn in_list(actual: &Value, expected: &Value) -> bool {
    let Some(items) = expected.as_array() else {
        return false;
    };
    items.iter().any(|item| values_equal(actual, item))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Renders a value as matchable text. Arrays are comma-joined so
/// substring and regex conditions can address list fields like actors.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(as_text).collect();
            Some(parts.join(","))
        }
        Value::Null | Value::Object(_) => None,
    }
}

/// Fetches a compiled regex from the process-wide cache, compiling and
/// inserting on miss. Returns `None` when the pattern does not compile.
///
/// The cache is cleared wholesale once it reaches [`REGEX_CACHE_MAX`]
/// entries; rule sets small enough to matter never get near the bound.
fn cached_regex(pattern: &str) -> Option<regex::Regex> {
    let cache = REGEX_CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    if let Ok(guard) = cache.read() {
        if let Some(re) = guard.get(pattern) {
            return Some(re.clone());
        }
    }

    let compiled = regex::Regex::new(pattern).ok()?;

    if let Ok(mut guard) = cache.write() {
        if guard.len() >= REGEX_CACHE_MAX {
            guard.clear();
        }
        guard
            .entry(pattern.to_string())
            .or_insert_with(|| compiled.clone());
    }
    Some(compiled)
}
