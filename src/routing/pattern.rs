//! Route pattern compilation and matching.

use std::borrow::Cow;
use std::fmt;

/// Marker that turns a pattern segment into a named parameter.
pub const PARAM_MARKER: char = ':';

/// Segment that matches any single path segment without binding it.
pub const WILDCARD: &str = "*";

/// One compiled segment of a route pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the path segment byte for byte.
    Literal(String),
    /// Binds exactly one path segment under this name.
    Param(String),
    /// Matches exactly one path segment, binds nothing.
    Wildcard,
}

/// Ordered parameter bindings produced by a successful match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    /// Create an empty binding list.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value bound to `name` (first binding wins when a name repeats).
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Bindings in pattern order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: &str, value: Cow<'_, str>) {
        self.entries.push((name.to_string(), value.into_owned()));
    }
}

/// Compiled route pattern.
///
/// Patterns and request paths are split on `/` with empty segments dropped,
/// so `/users/`, `users` and `//users` are all the one-segment pattern
/// `users`, and `/` is the zero-segment pattern. Matching never looks at
/// prefixes: segment counts must be equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile a pattern such as `/users/:id/posts/:postId`.
    ///
    /// A lone `:` has no name and is kept as a literal.
    pub fn compile(pattern: &str) -> Self {
        let segments = split_segments(pattern)
            .map(|seg| {
                if seg == WILDCARD {
                    Segment::Wildcard
                } else {
                    match seg.strip_prefix(PARAM_MARKER) {
                        Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                        _ => Segment::Literal(seg.to_string()),
                    }
                }
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// The pattern as written at registration.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Compiled segments.
    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of the parameters in pattern order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|seg| match seg {
            Segment::Param(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Match a request path, returning the parameter bindings on success.
    ///
    /// Literals compare against the raw path; bound values are percent-decoded.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let mut params = Params::new();
        let mut parts = split_segments(path);

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) => {
                    if lit.as_bytes() != part.as_bytes() {
                        return None;
                    }
                }
                Segment::Param(name) => params.push(name, decode(part)),
                Segment::Wildcard => {}
            }
        }

        // Extra path segments mean the counts differ.
        if parts.next().is_some() {
            return None;
        }

        Some(params)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split on `/`, dropping empty segments from leading, trailing or repeated separators.
#[inline]
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[inline]
fn decode(s: &str) -> Cow<'_, str> {
    if s.contains('%') {
        percent_encoding::percent_decode_str(s).decode_utf8_lossy()
    } else {
        Cow::Borrowed(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_segments() {
        let p = Pattern::compile("/users/:id/posts/:postId");
        assert_eq!(
            p.segments(),
            &[
                Segment::Literal("users".into()),
                Segment::Param("id".into()),
                Segment::Literal("posts".into()),
                Segment::Param("postId".into()),
            ]
        );
        assert_eq!(p.param_names().collect::<Vec<_>>(), vec!["id", "postId"]);
        assert_eq!(p.to_string(), "/users/:id/posts/:postId");
    }

    #[test]
    fn test_params_in_pattern_order() {
        let p = Pattern::compile("/users/:id/posts/:postId");
        let params = p.matches("/users/42/posts/7").unwrap();

        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("postId"), Some("7"));
        assert_eq!(
            params.iter().collect::<Vec<_>>(),
            vec![("id", "42"), ("postId", "7")]
        );
    }

    #[test]
    fn test_root_matches_zero_segments() {
        let root = Pattern::compile("/");
        assert!(root.segments().is_empty());
        assert!(root.matches("/").is_some());
        assert!(root.matches("").is_some());
        assert!(root.matches("/a").is_none());
    }

    #[test]
    fn test_segment_count_must_match() {
        let p = Pattern::compile("/users/:id");
        assert!(p.matches("/users").is_none());
        assert!(p.matches("/users/1/extra").is_none());
        assert!(p.matches("/users/1").is_some());
    }

    #[test]
    fn test_empty_segments_collapse_both_sides() {
        let p = Pattern::compile("//api//items/");
        assert!(p.matches("/api/items").is_some());
        assert!(p.matches("/api/items/").is_some());
        assert!(p.matches("api//items").is_some());
    }

    #[test]
    fn test_literal_is_byte_exact() {
        let p = Pattern::compile("/Users");
        assert!(p.matches("/users").is_none());
        assert!(p.matches("/Users").is_some());

        // No partial-segment matching
        assert!(Pattern::compile("/user").matches("/users").is_none());
    }

    #[test]
    fn test_param_values_are_decoded() {
        let p = Pattern::compile("/files/:name");
        let params = p.matches("/files/hello%20world").unwrap();
        assert_eq!(params.get("name"), Some("hello world"));
    }

    #[test]
    fn test_wildcard_binds_nothing() {
        let p = Pattern::compile("/assets/*/logo");
        assert_eq!(p.segments()[1], Segment::Wildcard);

        let params = p.matches("/assets/v2/logo").unwrap();
        assert!(params.is_empty());
        assert!(p.matches("/assets/logo").is_none());
    }

    #[test]
    fn test_bare_marker_is_literal() {
        let p = Pattern::compile("/a/:");
        assert_eq!(p.segments()[1], Segment::Literal(":".into()));
        assert!(p.matches("/a/:").is_some());
        assert!(p.matches("/a/b").is_none());
    }
}
