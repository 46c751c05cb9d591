//! Per-method route table.

use std::collections::HashMap;

use http::Method;

use super::pattern::{Params, Pattern};

/// A registered route.
#[derive(Debug)]
pub struct Route<H> {
    method: Method,
    pattern: Pattern,
    handler: H,
}

impl<H> Route<H> {
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    #[inline]
    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// Successful resolution: the route plus its parameter bindings.
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
    pub route: &'a Route<H>,
    pub params: Params,
}

impl<'a, H> RouteMatch<'a, H> {
    /// Handler of the matched route.
    #[inline]
    pub fn handler(&self) -> &'a H {
        &self.route.handler
    }
}

/// Route table keyed by HTTP method.
///
/// Each method keeps its routes in registration order. Resolution returns
/// the first route whose pattern matches; nothing is deduplicated or
/// reordered, so overlapping routes must be registered most specific first.
#[derive(Debug)]
pub struct Router<H> {
    routes: HashMap<Method, Vec<Route<H>>>,
}

impl<H> Router<H> {
    /// Create an empty router.
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Append a route to the method's list.
    pub fn register(&mut self, method: Method, pattern: &str, handler: H) {
        let route = Route {
            method: method.clone(),
            pattern: Pattern::compile(pattern),
            handler,
        };
        self.routes.entry(method).or_default().push(route);
    }

    /// Resolve a request to the first matching route.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, H>> {
        self.routes.get(method)?.iter().find_map(|route| {
            route
                .pattern
                .matches(path)
                .map(|params| RouteMatch { route, params })
        })
    }

    /// Total number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All routes, grouped by method, each group in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Route<H>> {
        self.routes.values().flatten()
    }
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_with_params() {
        let mut router = Router::new();
        router.register(Method::GET, "/users/:id/posts/:postId", "posts");

        let m = router.resolve(&Method::GET, "/users/42/posts/7").unwrap();
        assert_eq!(*m.handler(), "posts");
        assert_eq!(m.params.get("id"), Some("42"));
        assert_eq!(m.params.get("postId"), Some("7"));
        assert_eq!(m.route.pattern().as_str(), "/users/:id/posts/:postId");
    }

    #[test]
    fn test_first_registered_wins() {
        let mut router = Router::new();
        router.register(Method::GET, "/users/:id", "by-id");
        router.register(Method::GET, "/users/me", "me");

        let m = router.resolve(&Method::GET, "/users/me").unwrap();
        assert_eq!(*m.handler(), "by-id");
        assert_eq!(m.params.get("id"), Some("me"));
    }

    #[test]
    fn test_duplicate_registration_keeps_both() {
        let mut router = Router::new();
        router.register(Method::GET, "/ping", 1);
        router.register(Method::GET, "/ping", 2);

        assert_eq!(router.len(), 2);
        let m = router.resolve(&Method::GET, "/ping").unwrap();
        assert_eq!(*m.handler(), 1);
    }

    #[test]
    fn test_method_is_part_of_the_key() {
        let mut router = Router::new();
        router.register(Method::POST, "/users", "create");

        assert!(router.resolve(&Method::GET, "/users").is_none());
        assert!(router.resolve(&Method::POST, "/users").is_some());
    }

    #[test]
    fn test_unresolved() {
        let mut router: Router<()> = Router::new();
        assert!(router.is_empty());
        router.register(Method::GET, "/a", ());
        assert!(router.resolve(&Method::GET, "/b").is_none());
        assert_eq!(router.routes().count(), 1);
    }
}
