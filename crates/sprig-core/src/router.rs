//! Per-method route table
//!
//! Wraps one [`PatternMatcher`] per HTTP method and keeps the registered value
//! for every exact `(method, pattern)` pair. Resolution is two steps: the trie
//! yields the matched pattern, the pattern selects the value.

use crate::{Method, Result};
use sprig_router::{Match, PatternMatcher};
use std::collections::HashMap;

/// Route match result
#[derive(Debug, Clone)]
pub struct RouteMatch<'a, T> {
    /// The matched handler/value
    pub value: &'a T,
    /// The registered pattern that matched
    pub pattern: &'a str,
    /// Captured path parameters
    pub params: HashMap<String, String>,
}

/// Routes of one method
struct MethodRoutes<T> {
    matcher: PatternMatcher,
    values: HashMap<String, T>,
}

impl<T> MethodRoutes<T> {
    fn new() -> Self {
        Self {
            matcher: PatternMatcher::new(),
            values: HashMap::new(),
        }
    }
}

/// Route table
///
/// Routes are organized by HTTP method for O(1) method dispatch, then matched
/// segment by segment in that method's trie.
pub struct RouteTable<T> {
    methods: HashMap<Method, MethodRoutes<T>>,
}

impl<T> RouteTable<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Register a value under `method` and `pattern`
    ///
    /// The method's trie is created on first use. On a route conflict the
    /// table is left unchanged.
    pub fn register(&mut self, method: Method, pattern: &str, value: T) -> Result<()> {
        let routes = self.methods.entry(method).or_insert_with(MethodRoutes::new);
        routes.matcher.insert(pattern)?;
        routes.values.insert(pattern.to_string(), value);
        Ok(())
    }

    /// Match a concrete path, yielding the registered pattern and parameters
    pub fn resolve(&self, method: Method, path: &str) -> Option<Match<'_>> {
        self.methods.get(&method)?.matcher.find(path)
    }

    /// Value registered under the exact `(method, pattern)` key
    pub fn handler(&self, method: Method, pattern: &str) -> Option<&T> {
        self.methods.get(&method)?.values.get(pattern)
    }

    /// Resolve a path and fetch its value in one go
    pub fn lookup(&self, method: Method, path: &str) -> Option<RouteMatch<'_, T>> {
        let matched = self.resolve(method, path)?;
        let value = self.handler(method, matched.pattern)?;
        Some(RouteMatch {
            value,
            pattern: matched.pattern,
            params: matched.params,
        })
    }

    /// Check if a method has any routes registered
    pub fn has_method(&self, method: Method) -> bool {
        self.methods.contains_key(&method)
    }

    /// Get all registered methods
    pub fn methods(&self) -> Vec<Method> {
        self.methods.keys().copied().collect()
    }

    /// Total number of registered routes
    pub fn len(&self) -> usize {
        self.methods.values().map(|r| r.matcher.len()).sum()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_static_routes() {
        let mut table: RouteTable<&str> = RouteTable::new();
        table.register(Method::Get, "/", "home").unwrap();
        table.register(Method::Get, "/users", "users").unwrap();
        table.register(Method::Post, "/users", "create_user").unwrap();

        assert_eq!(*table.lookup(Method::Get, "/").unwrap().value, "home");
        assert_eq!(*table.lookup(Method::Get, "/users").unwrap().value, "users");
        assert_eq!(*table.lookup(Method::Post, "/users").unwrap().value, "create_user");
        assert!(table.lookup(Method::Delete, "/users").is_none());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_dynamic_routes() {
        let mut table: RouteTable<&str> = RouteTable::new();
        table.register(Method::Get, "/users/:id", "get_user").unwrap();
        table.register(Method::Get, "/users/:id/posts/:post_id", "get_post").unwrap();

        let m = table.lookup(Method::Get, "/users/123").unwrap();
        assert_eq!(*m.value, "get_user");
        assert_eq!(m.pattern, "/users/:id");
        assert_eq!(m.params.get("id"), Some(&"123".to_string()));

        let m = table.lookup(Method::Get, "/users/456/posts/789").unwrap();
        assert_eq!(*m.value, "get_post");
        assert_eq!(m.params.get("id"), Some(&"456".to_string()));
        assert_eq!(m.params.get("post_id"), Some(&"789".to_string()));
    }

    #[test]
    fn test_resolve_then_handler() {
        let mut table: RouteTable<u32> = RouteTable::new();
        table.register(Method::Get, "/assets/*filepath", 7).unwrap();

        let matched = table.resolve(Method::Get, "/assets/css/a.css").unwrap();
        assert_eq!(matched.pattern, "/assets/*filepath");
        assert_eq!(matched.param("filepath"), Some("css/a.css"));
        assert_eq!(table.handler(Method::Get, matched.pattern), Some(&7));
        assert_eq!(table.handler(Method::Get, "/assets/css/a.css"), None);
    }

    #[test]
    fn test_conflict_keeps_first_value() {
        let mut table: RouteTable<&str> = RouteTable::new();
        table.register(Method::Get, "/p/:a", "first").unwrap();

        let err = table.register(Method::Get, "/p/:b", "second").unwrap_err();
        assert!(matches!(err, Error::RouteConflict(_)));
        assert!(table.handler(Method::Get, "/p/:b").is_none());
        assert_eq!(*table.lookup(Method::Get, "/p/x").unwrap().value, "first");
    }

    #[test]
    fn test_same_pattern_on_other_method() {
        let mut table: RouteTable<&str> = RouteTable::new();
        table.register(Method::Get, "/p/:a", "get").unwrap();
        table.register(Method::Post, "/p/:b", "post").unwrap();

        let m = table.lookup(Method::Post, "/p/x").unwrap();
        assert_eq!(*m.value, "post");
        assert_eq!(m.params.get("b"), Some(&"x".to_string()));
    }

    #[test]
    fn test_methods() {
        let mut table: RouteTable<u32> = RouteTable::new();
        assert!(table.is_empty());
        table.register(Method::Get, "/users", 1).unwrap();
        table.register(Method::Delete, "/users/:id", 2).unwrap();

        assert!(table.has_method(Method::Get));
        assert!(table.has_method(Method::Delete));
        assert!(!table.has_method(Method::Put));
        assert!(table.resolve(Method::Put, "/users").is_none());

        let methods = table.methods();
        assert_eq!(methods.len(), 2);
        assert!(methods.contains(&Method::Get));
    }
}
