//! Attribute path resolution against a context tree
//!
//! Paths use dot/bracket notation:
//! - `user.id` - nested object keys
//! - `groups[0].name` - array index
//! - `tags['team.name']` - quoted key containing a dot
//!
//! Resolution is total: a missing key, a scalar in the middle of the walk, or
//! an empty path all yield the supplied default instead of an error.

use serde_json::Value;
use std::borrow::Cow;

/// A path into a context tree, either unparsed or already split into segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributePath<'p> {
    /// Dot/bracket notation, tokenized on use
    Dotted(&'p str),
    /// Pre-split segments, used as-is
    Segments(Vec<Cow<'p, str>>),
}

impl<'p> AttributePath<'p> {
    /// Split into key segments
    pub fn segments(&self) -> Vec<Cow<'p, str>> {
        match self {
            AttributePath::Dotted(path) => cast_path(path).into_iter().map(Cow::Owned).collect(),
            AttributePath::Segments(segments) => segments.clone(),
        }
    }
}

impl<'p> From<&'p str> for AttributePath<'p> {
    fn from(path: &'p str) -> Self {
        AttributePath::Dotted(path)
    }
}

impl<'p> From<&'p String> for AttributePath<'p> {
    fn from(path: &'p String) -> Self {
        AttributePath::Dotted(path.as_str())
    }
}

impl<'p> From<&'p [&'p str]> for AttributePath<'p> {
    fn from(segments: &'p [&'p str]) -> Self {
        AttributePath::Segments(segments.iter().map(|s| Cow::Borrowed(*s)).collect())
    }
}

impl<'p, const N: usize> From<[&'p str; N]> for AttributePath<'p> {
    fn from(segments: [&'p str; N]) -> Self {
        AttributePath::Segments(segments.into_iter().map(Cow::Borrowed).collect())
    }
}

impl From<Vec<String>> for AttributePath<'static> {
    fn from(segments: Vec<String>) -> Self {
        AttributePath::Segments(segments.into_iter().map(Cow::Owned).collect())
    }
}

/// Tokenize a dot/bracket path into key segments
///
/// A single leading `.` refers to the root and is dropped. Bracketed keys
/// may be bare (`[0]`) or quoted (`['a.b']`, `["a.b"]`).
///
/// # Examples
/// ```
/// use iam_engine::iam::cast_path;
///
/// assert_eq!(cast_path("a[0].b.c"), vec!["a", "0", "b", "c"]);
/// assert_eq!(cast_path("a['x.y']"), vec!["a", "x.y"]);
/// ```
pub fn cast_path(path: &str) -> Vec<String> {
    let path = path.strip_prefix('.').unwrap_or(path);
    if path.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    // Set right after `]` so that `a[0].b` does not produce an empty segment
    let mut after_bracket = false;
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if after_bracket {
                    after_bracket = false;
                } else {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let mut inner = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    inner.push(c);
                }
                segments.push(unquote(&inner));
                after_bracket = true;
            }
            _ => {
                after_bracket = false;
                current.push(c);
            }
        }
    }

    if !after_bracket {
        segments.push(current);
    }

    segments
}

/// Strip matching quotes from a bracketed key and drop escape backslashes
fn unquote(key: &str) -> String {
    let quoted = key.len() >= 2
        && ((key.starts_with('\'') && key.ends_with('\''))
            || (key.starts_with('"') && key.ends_with('"')));
    if !quoted {
        return key.to_string();
    }

    let mut out = String::with_capacity(key.len() - 2);
    let mut chars = key[1..key.len() - 1].chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Walk `root` segment by segment
///
/// Objects are indexed by key and arrays by numeric segment. Returns `None`
/// as soon as a step cannot be taken, and for an empty segment list.
pub fn base_get<'a, S: AsRef<str>>(root: &'a Value, segments: &[S]) -> Option<&'a Value> {
    if segments.is_empty() {
        return None;
    }

    let mut current = root;
    for segment in segments {
        let segment = segment.as_ref();
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve `path` against `root`, falling back to `default`
///
/// A dotted path that is itself a key of the root object wins over the
/// tokenized walk, so `{"a.b": 1}` resolves `"a.b"` to `1`.
///
/// # Examples
/// ```
/// use iam_engine::iam::resolve_path;
/// use serde_json::json;
///
/// let root = json!({ "a": [{ "b": { "c": 3 } }] });
/// assert_eq!(resolve_path(&root, "a[0].b.c", None), Some(&json!(3)));
/// assert_eq!(resolve_path(&root, ["a", "0", "b", "c"], None), Some(&json!(3)));
///
/// let fallback = json!("default");
/// assert_eq!(resolve_path(&root, "a.b.c", Some(&fallback)), Some(&fallback));
/// ```
pub fn resolve_path<'a, 'p>(
    root: &'a Value,
    path: impl Into<AttributePath<'p>>,
    default: Option<&'a Value>,
) -> Option<&'a Value> {
    let path = path.into();

    if let (AttributePath::Dotted(key), Value::Object(map)) = (&path, root) {
        if let Some(value) = map.get(*key) {
            return Some(value);
        }
    }

    base_get(root, &path.segments()).or(default)
}
