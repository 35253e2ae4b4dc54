//! User-defined subscription rules.
//!
//! A rule pairs a conjunction of field conditions with the actions to
//! fire when a candidate satisfies all of them. Definitions are
//! validated strictly when created or edited; evaluation against
//! candidates is deliberately lenient and never fails (see [`engine`]).
//!
//! # Design
//!
//! - Conditions are AND-combined. A rule with no conditions never
//!   matches, so an accidentally empty rule cannot fire on everything.
//! - The operator set is a closed enum. Unknown operators are rejected
//!   when a rule is deserialized, not discovered at evaluation time.
//! - `priority` orders dispatch when several rules match the same
//!   candidate; higher fires first.

mod engine;
mod field;

pub use engine::{evaluate, evaluate_all};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RuleError;

/// Comparison operator for a rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Equal after coercion (number vs numeric string, bool vs "true"/"false").
    Equals,
    /// Case-insensitive substring match. Array fields are joined with commas.
    Contains,
    /// Regular expression match over the field rendered as text.
    Regex,
    /// Numeric greater-than.
    GreaterThan,
    /// Numeric less-than.
    LessThan,
    /// Field equals at least one element of a list value.
    InList,
}

/// A single condition on a candidate field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Field path, e.g. `title`, `rating`, or `metadata.torrent.seeders`.
    pub field: String,
    /// How the field is compared.
    pub operator: ConditionOperator,
    /// Comparison value from the rule definition.
    pub value: serde_json::Value,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: serde_json::Value,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Validates the condition definition against its operator.
    ///
    /// Catches what would otherwise silently evaluate to false forever:
    /// malformed field paths, regexes that do not compile, comparison
    /// values of the wrong shape.
    pub fn validate(&self) -> Result<(), RuleError> {
        field::validate_path(&self.field)?;
        match self.operator {
            ConditionOperator::Regex => {
                let Some(pattern) = self.value.as_str() else {
                    return Err(RuleError::InvalidValue {
                        field: self.field.clone(),
                        expected: "string pattern",
                    });
                };
                regex::Regex::new(pattern).map_err(|e| RuleError::InvalidRegex {
                    field: self.field.clone(),
                    reason: e.to_string(),
                })?;
            }
            ConditionOperator::GreaterThan | ConditionOperator::LessThan => {
                if !self.value.is_number() {
                    return Err(RuleError::InvalidValue {
                        field: self.field.clone(),
                        expected: "number",
                    });
                }
            }
            ConditionOperator::InList => {
                if !self.value.is_array() {
                    return Err(RuleError::InvalidValue {
                        field: self.field.clone(),
                        expected: "array",
                    });
                }
            }
            ConditionOperator::Equals | ConditionOperator::Contains => {}
        }
        Ok(())
    }
}

/// An action fired when a rule matches a candidate.
///
/// The engine treats actions as opaque payloads; the host's executor
/// decides what `download`, `notify`, etc. actually do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action kind understood by the host, e.g. `download` or `notify`.
    pub kind: String,
    /// Free-form parameters forwarded to the executor untouched.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Action {
    pub fn new(kind: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }
}

/// A user-defined subscription rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: Uuid,
    pub name: String,
    /// All conditions must hold for the rule to match. Empty never matches.
    pub conditions: Vec<Condition>,
    /// Actions dispatched when the rule matches.
    pub actions: Vec<Action>,
    /// Disabled rules are skipped during evaluation.
    pub enabled: bool,
    /// Higher-priority rules dispatch first when several match.
    pub priority: i32,
}

impl Rule {
    /// Creates an enabled rule with a fresh id, no conditions, and
    /// priority zero.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            conditions: Vec::new(),
            actions: Vec::new(),
            enabled: true,
            priority: 0,
        }
    }

    pub fn with_condition(
        mut self,
        field: impl Into<String>,
        operator: ConditionOperator,
        value: serde_json::Value,
    ) -> Self {
        self.conditions.push(Condition::new(field, operator, value));
        self
    }

    pub fn with_action(mut self, kind: impl Into<String>, params: serde_json::Value) -> Self {
        self.actions.push(Action::new(kind, params));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Validates every condition in the rule.
    ///
    /// Call when a rule is created or edited. Evaluation assumes
    /// definitions passed through here and degrades softly otherwise.
    pub fn validate(&self) -> Result<(), RuleError> {
        for condition in &self.conditions {
            condition.validate()?;
        }
        Ok(())
    }
}
