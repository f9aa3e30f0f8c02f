//! `${path}` interpolation of patterns against a request context
//!
//! Interpolation is single-pass: a substituted value is never scanned for
//! further tokens. Patterns are first split into fragments so the matcher can
//! keep interpolated text literal while `*` in the pattern itself stays a
//! wildcard.

use super::path::resolve_path;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("token regex is valid"));

/// A piece of a pattern after interpolation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fragment<'s> {
    /// Pattern text; `*` keeps its wildcard meaning
    Glob(&'s str),
    /// Substituted (or dead) text, matched literally
    Text(String),
    /// Substituted list value, matches any one element literally
    Choice(Vec<String>),
}

/// Whether `pattern` contains at least one `${path}` token
pub(crate) fn has_tokens(pattern: &str) -> bool {
    TOKEN.is_match(pattern)
}

/// Split `pattern` into fragments, resolving tokens against `context`
///
/// Without a context every token is kept as dead literal text.
pub(crate) fn interpolate<'s>(pattern: &'s str, context: Option<&Value>) -> Vec<Fragment<'s>> {
    let mut fragments = Vec::new();
    let mut last = 0;

    for captures in TOKEN.captures_iter(pattern) {
        let (Some(token), Some(path)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if token.start() > last {
            fragments.push(Fragment::Glob(&pattern[last..token.start()]));
        }
        fragments.push(match context {
            Some(context) => render(resolve_path(context, path.as_str(), None)),
            None => Fragment::Text(token.as_str().to_string()),
        });
        last = token.end();
    }

    if last < pattern.len() {
        fragments.push(Fragment::Glob(&pattern[last..]));
    }

    fragments
}

fn render(value: Option<&Value>) -> Fragment<'static> {
    match value {
        Some(Value::Array(items)) => Fragment::Choice(items.iter().filter_map(scalar_text).collect()),
        Some(value) => Fragment::Text(scalar_text(value).unwrap_or_default()),
        None => Fragment::Text(String::new()),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Substitute every `${path}` token in `pattern` with its value in `context`
///
/// Missing paths, `null` and objects become empty text; lists render as
/// `{a,b,c}`. Without a context the pattern is returned unchanged.
///
/// # Examples
/// ```
/// use iam_engine::iam::apply_context;
/// use serde_json::json;
///
/// let ctx = json!({ "user": { "id": 123, "friends": [4, 5] } });
/// assert_eq!(apply_context("secrets:${user.id}:*", Some(&ctx)), "secrets:123:*");
/// assert_eq!(apply_context("${user.friends}", Some(&ctx)), "{4,5}");
/// assert_eq!(apply_context("secrets:${user.id}", None), "secrets:${user.id}");
/// ```
pub fn apply_context(pattern: &str, context: Option<&Value>) -> String {
    let mut out = String::with_capacity(pattern.len());
    for fragment in interpolate(pattern, context) {
        match fragment {
            Fragment::Glob(text) => out.push_str(text),
            Fragment::Text(text) => out.push_str(&text),
            Fragment::Choice(items) => {
                out.push('{');
                out.push_str(&items.join(","));
                out.push('}');
            }
        }
    }
    out
}
