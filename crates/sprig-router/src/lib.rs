//! sprig-router: segment trie pattern matcher
//!
//! One [`PatternMatcher`] holds the routes of a single HTTP method. Each trie
//! node stands for one `/`-delimited segment; a node only counts as a match
//! when a registered pattern terminates on it.
//!
//! ## Path Syntax
//! - `users` - Static segment (matched literally)
//! - `:name` - Named parameter (captures one segment)
//! - `*name` - Catch-all (captures the remaining path, joined with `/`)
//! - `*` - Anonymous catch-all (matches the remainder, captures nothing)
//!
//! Empty segments are dropped, so `/users/`, `users` and `//users` are the same
//! pattern. Parsing stops at the first `*` segment; whatever follows it is
//! ignored.
//!
//! ## Priority
//! There is no specificity ranking. Children are tried in insertion order and
//! the first subtree that yields a registered endpoint wins. A static route
//! registered after a parameter route at the same level shares the parameter's
//! node during insertion, so register the static one first if it must win.
//!
//! ## Example
//! ```
//! use sprig_router::PatternMatcher;
//!
//! let mut matcher = PatternMatcher::new();
//! matcher.insert("/users").unwrap();
//! matcher.insert("/users/:id").unwrap();
//! matcher.insert("/files/*path").unwrap();
//!
//! let m = matcher.find("/users/123").unwrap();
//! assert_eq!(m.pattern, "/users/:id");
//! assert_eq!(m.param("id"), Some("123"));
//!
//! let m = matcher.find("/files/docs/readme.md").unwrap();
//! assert_eq!(m.param("path"), Some("docs/readme.md"));
//! ```

use std::collections::HashMap;
use thiserror::Error;

/// Two patterns terminate on the same trie node.
///
/// `/p/:a` and `/p/:b` normalize to the same node chain, so registering both
/// is a conflict even though the strings differ.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("route conflict: `{pattern}` collides with already registered `{existing}`")]
pub struct RouteConflict {
    /// Pattern that already owns the node
    pub existing: String,
    /// Pattern whose insertion was rejected
    pub pattern: String,
}

/// Split a pattern or request path into its segments.
///
/// Empty segments are skipped and parsing stops after the first segment that
/// starts with `*`.
///
/// ```
/// use sprig_router::parse_pattern;
///
/// assert_eq!(parse_pattern("/p/:name"), vec!["p", ":name"]);
/// assert_eq!(parse_pattern("/p/*name/*"), vec!["p", "*name"]);
/// ```
pub fn parse_pattern(pattern: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        segments.push(segment);
        if segment.starts_with('*') {
            break;
        }
    }
    segments
}

/// Successful lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Match<'a> {
    /// The registered pattern that matched, exactly as it was inserted
    pub pattern: &'a str,
    /// Captured parameters by name
    pub params: HashMap<String, String>,
}

impl Match<'_> {
    /// Get a captured parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }
}

/// Trie node, one per path segment
#[derive(Debug, Default)]
struct Node {
    /// Literal segment text (empty for the root)
    segment: String,
    /// Full pattern if a route terminates here
    pattern: Option<String>,
    /// Children in insertion order
    children: Vec<Node>,
    /// Segment starts with `:` or `*`
    is_wild: bool,
}

impl Node {
    fn new(segment: &str) -> Self {
        Self {
            segment: segment.to_string(),
            pattern: None,
            children: Vec::new(),
            is_wild: segment.starts_with([':', '*']),
        }
    }

    #[inline]
    fn accepts(&self, segment: &str) -> bool {
        self.is_wild || self.segment == segment
    }

    fn insert(&mut self, pattern: &str, segments: &[&str], depth: usize) -> Result<(), RouteConflict> {
        if depth == segments.len() {
            if let Some(existing) = &self.pattern {
                return Err(RouteConflict {
                    existing: existing.clone(),
                    pattern: pattern.to_string(),
                });
            }
            self.pattern = Some(pattern.to_string());
            return Ok(());
        }

        let segment = segments[depth];
        // First literal-or-wildcard child absorbs the segment
        let index = match self.children.iter().position(|child| child.accepts(segment)) {
            Some(index) => index,
            None => {
                self.children.push(Node::new(segment));
                self.children.len() - 1
            }
        };

        self.children[index].insert(pattern, segments, depth + 1)
    }

    fn search(&self, segments: &[&str], depth: usize) -> Option<&Node> {
        if depth == segments.len() || self.segment.starts_with('*') {
            return self.pattern.as_ref().map(|_| self);
        }

        let segment = segments[depth];
        self.children
            .iter()
            .filter(|child| child.accepts(segment))
            .find_map(|child| child.search(segments, depth + 1))
    }
}

/// Bind the wildcard segments of `pattern` against the concrete path segments.
fn extract_params(pattern: &str, segments: &[&str]) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (index, part) in parse_pattern(pattern).into_iter().enumerate() {
        if let Some(name) = part.strip_prefix(':') {
            if let Some(value) = segments.get(index) {
                params.insert(name.to_string(), value.to_string());
            }
        } else if let Some(name) = part.strip_prefix('*') {
            if !name.is_empty() {
                let rest = segments.get(index..).unwrap_or_default();
                params.insert(name.to_string(), rest.join("/"));
            }
        }
    }
    params
}

/// Segment trie for the patterns of one HTTP method
///
/// Built during startup, read-only afterwards. Lookups take `&self` and the
/// type holds no interior mutability, so a finished matcher can be shared
/// across threads freely.
#[derive(Debug, Default)]
pub struct PatternMatcher {
    root: Node,
    len: usize,
}

impl PatternMatcher {
    /// Create an empty matcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pattern
    ///
    /// Fails with [`RouteConflict`] when another pattern already terminates on
    /// the same node.
    ///
    /// # Example
    /// ```
    /// use sprig_router::PatternMatcher;
    ///
    /// let mut matcher = PatternMatcher::new();
    /// matcher.insert("/p/:a").unwrap();
    /// assert!(matcher.insert("/p/:b").is_err());
    /// ```
    pub fn insert(&mut self, pattern: &str) -> Result<(), RouteConflict> {
        let segments = parse_pattern(pattern);
        self.root.insert(pattern, &segments, 0)?;
        self.len += 1;
        Ok(())
    }

    /// Find the pattern matching a concrete path and capture its parameters
    ///
    /// Returns `None` when traversal never reaches a node that a pattern
    /// terminates on.
    pub fn find(&self, path: &str) -> Option<Match<'_>> {
        let segments = parse_pattern(path);
        let node = self.root.search(&segments, 0)?;
        let pattern = node.pattern.as_deref()?;
        Some(Match {
            pattern,
            params: extract_params(pattern, &segments),
        })
    }

    /// Number of registered patterns
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no pattern has been registered
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
