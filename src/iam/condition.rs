//! Condition evaluation for statements
//!
//! A condition block maps operator names to `{ path: expected }` entries:
//!
//! ```json
//! { "greaterThan": { "user.age": 18 }, "stringEquals": { "user.team": ["red", "blue"] } }
//! ```
//!
//! Every operator and every path must hold. A list of expected values holds
//! when any element does. Operators are looked up by name in a
//! [`ConditionResolvers`] registry; an operator with no resolver fails the
//! block.

use super::path::resolve_path;
use super::pattern::matches_one;
use ahash::AHashMap;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Operator name -> (attribute path -> expected value or list of values)
pub type ConditionBlock = BTreeMap<String, BTreeMap<String, Value>>;

/// Predicate called as `resolver(actual, expected)`
pub type Resolver = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Registry of condition operators
#[derive(Clone, Default)]
pub struct ConditionResolvers {
    resolvers: AHashMap<String, Resolver>,
}

impl ConditionResolvers {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the standard string, numeric, date and bool operators
    ///
    /// | Operator | Holds when |
    /// |---|---|
    /// | `stringEquals` / `stringNotEquals` | both strings, equal / different |
    /// | `stringLike` | actual string matches the expected glob |
    /// | `numericEquals`, `numericLessThan`, `numericLessThanEquals`, `numericGreaterThan`, `numericGreaterThanEquals` | both numbers, compared as `actual <op> expected` |
    /// | `dateLessThan` / `dateGreaterThan` | both dates (RFC 3339 or `YYYY-MM-DD`) |
    /// | `bool` | both booleans, equal |
    pub fn builtin() -> Self {
        Self::new()
            .with("stringEquals", |actual, expected| {
                both_str(actual, expected).is_some_and(|(a, e)| a == e)
            })
            .with("stringNotEquals", |actual, expected| {
                both_str(actual, expected).is_some_and(|(a, e)| a != e)
            })
            .with("stringLike", |actual, expected| {
                both_str(actual, expected).is_some_and(|(a, e)| matches_one(a, e, None))
            })
            .with("numericEquals", |actual, expected| {
                both_f64(actual, expected).is_some_and(|(a, e)| (a - e).abs() < f64::EPSILON)
            })
            .with("numericLessThan", |actual, expected| {
                both_f64(actual, expected).is_some_and(|(a, e)| a < e)
            })
            .with("numericLessThanEquals", |actual, expected| {
                both_f64(actual, expected).is_some_and(|(a, e)| a <= e)
            })
            .with("numericGreaterThan", |actual, expected| {
                both_f64(actual, expected).is_some_and(|(a, e)| a > e)
            })
            .with("numericGreaterThanEquals", |actual, expected| {
                both_f64(actual, expected).is_some_and(|(a, e)| a >= e)
            })
            .with("dateLessThan", |actual, expected| {
                compare_dates(actual, expected).is_some_and(|o| o.is_lt())
            })
            .with("dateGreaterThan", |actual, expected| {
                compare_dates(actual, expected).is_some_and(|o| o.is_gt())
            })
            .with("bool", |actual, expected| match (actual.as_bool(), expected.as_bool()) {
                (Some(a), Some(e)) => a == e,
                _ => false,
            })
    }

    /// Register a resolver, returning the one it replaced
    pub fn register<F>(&mut self, operator: impl Into<String>, resolver: F) -> Option<Resolver>
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.resolvers.insert(operator.into(), Arc::new(resolver))
    }

    /// Builder form of [`register`](Self::register)
    pub fn with<F>(mut self, operator: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.register(operator, resolver);
        self
    }

    pub fn unregister(&mut self, operator: &str) -> Option<Resolver> {
        self.resolvers.remove(operator)
    }

    pub fn contains(&self, operator: &str) -> bool {
        self.resolvers.contains_key(operator)
    }

    pub fn get(&self, operator: &str) -> Option<&Resolver> {
        self.resolvers.get(operator)
    }

    /// Registered operator names, sorted
    pub fn operators(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resolvers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl fmt::Debug for ConditionResolvers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionResolvers")
            .field("operators", &self.operators())
            .finish()
    }
}

/// Evaluate a condition block against a context
///
/// An absent or empty block holds. Missing context paths are passed to the
/// resolver as `null`.
pub fn evaluate_conditions(
    block: Option<&ConditionBlock>,
    context: Option<&Value>,
    resolvers: &ConditionResolvers,
) -> bool {
    let Some(block) = block else {
        return true;
    };
    let root = context.unwrap_or(&Value::Null);

    block.iter().all(|(operator, entries)| {
        let Some(resolver) = resolvers.get(operator) else {
            debug!("No resolver registered for condition operator '{}'", operator);
            return false;
        };

        entries.iter().all(|(path, expected)| {
            let actual = resolve_path(root, path.as_str(), None).unwrap_or(&Value::Null);
            match expected {
                Value::Array(options) => options.iter().any(|e| resolver(actual, e)),
                expected => resolver(actual, expected),
            }
        })
    })
}

fn both_str<'v>(actual: &'v Value, expected: &'v Value) -> Option<(&'v str, &'v str)> {
    Some((actual.as_str()?, expected.as_str()?))
}

fn both_f64(actual: &Value, expected: &Value) -> Option<(f64, f64)> {
    Some((actual.as_f64()?, expected.as_f64()?))
}

/// Compare as timestamps; holds for neither order unless both sides parse
fn compare_dates(actual: &Value, expected: &Value) -> Option<std::cmp::Ordering> {
    let (actual, expected) = both_str(actual, expected)?;
    Some(parse_date(actual)?.cmp(&parse_date(expected)?))
}

/// RFC 3339 timestamp, or a `YYYY-MM-DD` date taken as midnight UTC
fn parse_date(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp);
    }
    let midnight = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0)?;
    Some(midnight.and_utc().fixed_offset())
}
