//! Glob pattern matching for statement fields
//!
//! `*` is the only wildcard and matches any run of characters, including an
//! empty one and across `:` or `/`. Everything else matches literally and the
//! whole candidate must match. Patterns may embed `${path}` tokens which are
//! interpolated from the request context before matching.

use super::context::{has_tokens, interpolate, Fragment};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One pattern or a list of patterns, as written in a statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Patterns {
    One(String),
    Many(Vec<String>),
}

impl Patterns {
    /// Iterate over the individual pattern strings
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: &[String] = match self {
            Patterns::One(pattern) => std::slice::from_ref(pattern),
            Patterns::Many(patterns) => patterns,
        };
        items.iter().map(String::as_str)
    }
}

impl From<&str> for Patterns {
    fn from(pattern: &str) -> Self {
        Patterns::One(pattern.to_string())
    }
}

impl From<String> for Patterns {
    fn from(pattern: String) -> Self {
        Patterns::One(pattern)
    }
}

impl From<Vec<String>> for Patterns {
    fn from(patterns: Vec<String>) -> Self {
        Patterns::Many(patterns)
    }
}

impl From<Vec<&str>> for Patterns {
    fn from(patterns: Vec<&str>) -> Self {
        Patterns::Many(patterns.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Patterns {
    fn from(patterns: [&str; N]) -> Self {
        Patterns::Many(patterns.into_iter().map(String::from).collect())
    }
}

#[derive(Debug, Clone)]
enum Compiled {
    /// No wildcard and no token: plain equality
    Exact,
    /// Static glob split once
    Glob(Vec<Piece<'static>>),
    /// Contains `${path}` tokens, split per evaluation
    Dynamic,
}

/// A single glob pattern, precompiled when it has no `${path}` tokens
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    compiled: Compiled,
}

impl GlobPattern {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let compiled = if has_tokens(&source) {
            Compiled::Dynamic
        } else if !source.contains('*') {
            Compiled::Exact
        } else {
            Compiled::Glob(static_pieces(&source))
        };

        GlobPattern { source, compiled }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the pattern depends on the request context
    pub fn is_dynamic(&self) -> bool {
        matches!(self.compiled, Compiled::Dynamic)
    }

    /// Check if `candidate` matches after interpolating `context`
    pub fn matches(&self, candidate: &str, context: Option<&Value>) -> bool {
        match &self.compiled {
            Compiled::Exact => self.source == candidate,
            Compiled::Glob(pieces) => matches_pieces(candidate, pieces),
            Compiled::Dynamic => {
                let fragments = interpolate(&self.source, context);
                matches_pieces(candidate, &fragment_pieces(&fragments))
            }
        }
    }
}

/// Compiled form of [`Patterns`]
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<GlobPattern>,
}

impl PatternSet {
    pub fn new(patterns: &Patterns) -> Self {
        PatternSet {
            patterns: patterns.iter().map(GlobPattern::new).collect(),
        }
    }

    pub fn patterns(&self) -> &[GlobPattern] {
        &self.patterns
    }

    /// True if any pattern matches
    pub fn matches_any(&self, candidate: &str, context: Option<&Value>) -> bool {
        self.patterns.iter().any(|p| p.matches(candidate, context))
    }

    /// True if no pattern matches
    pub fn not_matches_any(&self, candidate: &str, context: Option<&Value>) -> bool {
        !self.matches_any(candidate, context)
    }
}

impl From<&Patterns> for PatternSet {
    fn from(patterns: &Patterns) -> Self {
        PatternSet::new(patterns)
    }
}

/// Check a candidate against a single pattern
///
/// # Examples
/// ```
/// use iam_engine::iam::matches_one;
/// use serde_json::json;
///
/// assert!(matches_one("books:horror:It", "books:horror:*", None));
/// assert!(!matches_one("books:fantasy:Eragon", "books:horror:*", None));
///
/// let ctx = json!({ "user": { "id": 7 } });
/// assert!(matches_one("secrets:7:key", "secrets:${user.id}:*", Some(&ctx)));
/// ```
pub fn matches_one(candidate: &str, pattern: &str, context: Option<&Value>) -> bool {
    GlobPattern::new(pattern).matches(candidate, context)
}

/// Check a candidate against one pattern or any of a list
pub fn matches_any(candidate: &str, patterns: &Patterns, context: Option<&Value>) -> bool {
    patterns.iter().any(|p| matches_one(candidate, p, context))
}

/// True if the candidate matches none of the patterns
pub fn not_matches_any(candidate: &str, patterns: &Patterns, context: Option<&Value>) -> bool {
    !matches_any(candidate, patterns, context)
}

/// Piece of a glob after splitting on `*` and merging adjacent literal text
#[derive(Debug, Clone)]
enum Piece<'f> {
    Literal(String),
    Star,
    /// Interpolated list value: any one element, literally
    Choice(&'f [String]),
}

fn push_glob(text: &str, pieces: &mut Vec<Piece<'_>>, literal: &mut String) {
    let mut parts = text.split('*');
    if let Some(first) = parts.next() {
        literal.push_str(first);
    }
    for part in parts {
        flush_literal(pieces, literal);
        if !matches!(pieces.last(), Some(Piece::Star)) {
            pieces.push(Piece::Star);
        }
        literal.push_str(part);
    }
}

fn flush_literal(pieces: &mut Vec<Piece<'_>>, literal: &mut String) {
    if !literal.is_empty() {
        pieces.push(Piece::Literal(std::mem::take(literal)));
    }
}

fn static_pieces(source: &str) -> Vec<Piece<'static>> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    push_glob(source, &mut pieces, &mut literal);
    flush_literal(&mut pieces, &mut literal);
    pieces
}

fn fragment_pieces<'f>(fragments: &'f [Fragment<'_>]) -> Vec<Piece<'f>> {
    let mut pieces = Vec::new();
    let mut literal = String::new();

    for fragment in fragments {
        match fragment {
            Fragment::Glob(text) => push_glob(text, &mut pieces, &mut literal),
            Fragment::Text(text) => literal.push_str(text),
            Fragment::Choice(items) => {
                flush_literal(&mut pieces, &mut literal);
                pieces.push(Piece::Choice(items.as_slice()));
            }
        }
    }
    flush_literal(&mut pieces, &mut literal);

    pieces
}

/// Candidate byte offsets reachable after matching a prefix of the pieces
enum Reach {
    /// Every offset from here to the end
    From(usize),
    /// Exactly these offsets, ascending
    At(Vec<usize>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Want {
    All,
    /// Next piece is `*`: only the earliest end matters
    Earliest,
    /// Last piece: only an end at the candidate's end matters
    End,
}

/// Match the whole candidate against pieces
///
/// Tracks the set of reachable offsets instead of backtracking, so the cost
/// is bounded by candidate length times pattern size.
fn matches_pieces(candidate: &str, pieces: &[Piece<'_>]) -> bool {
    let text = candidate.as_bytes();
    let mut reach = Reach::At(vec![0]);

    for (i, piece) in pieces.iter().enumerate() {
        let want = match pieces.get(i + 1) {
            None => Want::End,
            Some(Piece::Star) => Want::Earliest,
            Some(_) => Want::All,
        };

        reach = match piece {
            Piece::Star => match reach {
                Reach::At(offsets) => match offsets.first() {
                    Some(&first) => Reach::From(first),
                    None => return false,
                },
                from => from,
            },
            Piece::Literal(literal) => advance(text, &reach, std::slice::from_ref(literal), want),
            Piece::Choice(items) => advance(text, &reach, items, want),
        };

        if matches!(&reach, Reach::At(offsets) if offsets.is_empty()) {
            return false;
        }
    }

    match reach {
        Reach::From(_) => true,
        Reach::At(offsets) => offsets.last() == Some(&text.len()),
    }
}

/// Offsets reached by matching one of `items` at a reachable offset
fn advance(text: &[u8], reach: &Reach, items: &[String], want: Want) -> Reach {
    let reachable = |start: usize| match reach {
        Reach::From(min) => start >= *min,
        Reach::At(offsets) => offsets.binary_search(&start).is_ok(),
    };

    if want == Want::End {
        let hit = items.iter().any(|item| {
            text.len()
                .checked_sub(item.len())
                .is_some_and(|start| reachable(start) && &text[start..] == item.as_bytes())
        });
        return Reach::At(if hit { vec![text.len()] } else { Vec::new() });
    }

    let mut range;
    let mut listed;
    let starts: &mut dyn Iterator<Item = usize> = match reach {
        Reach::From(min) => {
            range = *min..=text.len();
            &mut range
        }
        Reach::At(offsets) => {
            listed = offsets.iter().copied();
            &mut listed
        }
    };

    let mut ends = Vec::new();
    for start in starts {
        for item in items {
            if text[start..].starts_with(item.as_bytes()) {
                ends.push(start + item.len());
            }
        }
        // With a single item the earliest start gives the earliest end
        if want == Want::Earliest && items.len() == 1 && !ends.is_empty() {
            break;
        }
    }

    if want == Want::Earliest {
        return Reach::At(ends.into_iter().min().into_iter().collect());
    }
    ends.sort_unstable();
    ends.dedup();
    Reach::At(ends)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exact_match() {
        assert!(matches_one("read", "read", None));
        assert!(!matches_one("reads", "read", None));
        assert!(!matches_one("Read", "read", None));
        assert!(!matches_one("", "read", None));
    }

    #[test]
    fn test_trailing_wildcard() {
        assert!(matches_one("books:horror:The Call of Cthulhu", "books:horror:*", None));
        assert!(matches_one("books:horror:", "books:horror:*", None));
        assert!(!matches_one("books:fantasy:Brisingr", "books:horror:*", None));
    }

    #[test]
    fn test_wildcard_positions() {
        assert!(matches_one("anything", "*", None));
        assert!(matches_one("", "*", None));
        assert!(matches_one("unittest", "*test", None));
        assert!(matches_one("aXXbYYc", "a*b*c", None));
        assert!(matches_one("abc", "a*b*c", None));
        assert!(!matches_one("acb", "a*b*c", None));
        assert!(!matches_one("aba", "ab*ba", None));
    }

    #[test]
    fn test_wildcard_crosses_separators() {
        assert!(matches_one("secrets:1:2:3", "secrets:*", None));
        assert!(matches_one("a/b/c\nd", "a/*", None));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(matches_one("a.b", "a.b", None));
        assert!(!matches_one("axb", "a.b", None));
        assert!(matches_one("(x)+[y]?", "(x)+*?", None));
        assert!(!matches_one("ab", "a?", None));
    }

    #[test]
    fn test_any_and_not_any() {
        let patterns = Patterns::from(["read", "write"]);
        assert!(matches_any("read", &patterns, None));
        assert!(matches_any("write", &patterns, None));
        assert!(!matches_any("delete", &patterns, None));
        assert!(not_matches_any("delete", &patterns, None));
        assert!(!not_matches_any("read", &patterns, None));

        let single = Patterns::from("read");
        assert!(matches_any("read", &single, None));
    }

    #[test]
    fn test_interpolated_pattern() {
        let ctx = json!({ "user": { "id": 123 } });
        assert!(matches_one("secrets:123:sshhh", "secrets:${user.id}:*", Some(&ctx)));
        assert!(!matches_one("secrets:456:sshhh", "secrets:${user.id}:*", Some(&ctx)));
        assert!(!matches_one("secrets:123:sshhh", "secrets:${user.id}:*", None));
    }

    #[test]
    fn test_interpolated_value_is_literal() {
        let ctx = json!({ "prefix": "*" });
        assert!(matches_one("*:x", "${prefix}:x", Some(&ctx)));
        assert!(!matches_one("anything:x", "${prefix}:x", Some(&ctx)));
    }

    #[test]
    fn test_dead_token_matches_literally() {
        assert!(matches_one("${user.id}", "${user.id}", None));
    }

    #[test]
    fn test_list_interpolation() {
        let ctx = json!({ "user": { "bestfriends": [123, 563, 1211] } });
        let pattern = "secrets:${user.bestfriends}:*";
        assert!(matches_one("secrets:563:sshhh", pattern, Some(&ctx)));
        assert!(matches_one("secrets:1211:x", pattern, Some(&ctx)));
        assert!(!matches_one("secrets:999:x", pattern, Some(&ctx)));

        let empty = json!({ "user": { "bestfriends": [] } });
        assert!(!matches_one("secrets::x", pattern, Some(&empty)));
    }

    #[test]
    fn test_many_wildcards() {
        let pattern = "a*".repeat(20_000);
        assert!(matches_one(&"a".repeat(20_000), &pattern, None));
        assert!(!matches_one(&"a".repeat(19_999), &pattern, None));
        assert!(matches_one(&"ab".repeat(20_000), &pattern, None));
    }

    #[test]
    fn test_wildcard_backtracks() {
        assert!(matches_one("xaaab", "*a*ab", None));
        assert!(matches_one("abcabd", "*abd", None));
        assert!(!matches_one("abcabd", "*abc", None));
        assert!(matches_one("ab:ab:c", "*ab*:c", None));
    }

    #[test]
    fn test_multibyte_candidates() {
        assert!(matches_one("日本語", "日*語", None));
        assert!(matches_one("日本語", "*本*", None));
        assert!(!matches_one("日本語", "*本", None));
    }

    #[test]
    fn test_large_list_interpolation() {
        let ids: Vec<String> = (0..50_000).map(|i| format!("user-{:08}", i)).collect();
        let ctx = json!({ "blocked": ids });
        let pattern = "secrets:${blocked}:*";

        assert!(matches_one("secrets:user-00000007:key", pattern, Some(&ctx)));
        assert!(matches_one("secrets:user-00049999:key", pattern, Some(&ctx)));
        assert!(!matches_one("secrets:user-00050000:key", pattern, Some(&ctx)));
    }

    #[test]
    fn test_list_elements_of_different_lengths() {
        let ctx = json!({ "ids": ["1", "12", "123"] });
        assert!(matches_one("1:x", "${ids}:*", Some(&ctx)));
        assert!(matches_one("12:x", "${ids}:*", Some(&ctx)));
        assert!(matches_one("a-123", "*${ids}", Some(&ctx)));
        assert!(!matches_one("1234", "${ids}", Some(&ctx)));
        assert!(matches_one("12-12", "${ids}*${ids}", Some(&ctx)));
    }

    #[test]
    fn test_precompiled_kinds() {
        assert!(!GlobPattern::new("books:*").is_dynamic());
        assert!(GlobPattern::new("books:${user.id}").is_dynamic());
        assert_eq!(GlobPattern::new("books:*").source(), "books:*");
    }

    #[test]
    fn test_patterns_deserialize() {
        let one: Patterns = serde_json::from_value(json!("read")).unwrap();
        let many: Patterns = serde_json::from_value(json!(["read", "write"])).unwrap();
        assert_eq!(one, Patterns::from("read"));
        assert_eq!(many.iter().collect::<Vec<_>>(), vec!["read", "write"]);
    }
}
