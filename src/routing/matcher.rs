//! Route lookup tree.
//!
//! # Responsibilities
//! - Place compiled routes in a tree keyed by path segments
//! - Resolve a request to the single best route
//!
//! # Search Order
//! At every node, with the remaining request segments:
//! 1. no segments left: the node's own routes
//! 2. the literal child for the next segment
//! 3. the `:name` wildcard child, consuming one segment
//! 4. the `*name` free wildcard routes, consuming the rest
//!
//! A branch that matches structurally but whose routes all reject the
//! request reports no match, and the search backtracks to the next
//! alternative. Routes without a path are tried last, in order.
//!
//! # Design Decisions
//! - Built once, never patched; a change produces a new tree
//! - Routes at the same leaf keep table order, first accepting route wins
//! - Segment comparison is exact, no decoding or case folding

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;

use crate::routing::compiler::Route;
use crate::routing::path::{split_path, Params, Segment};

/// Result of a successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    /// Wildcard bindings of the route's path pattern.
    pub params: Params,
}

#[derive(Debug, Default)]
struct Node {
    exact: HashMap<String, Node>,
    wildcard: Option<Box<Node>>,
    free_wildcard: Vec<Arc<Route>>,
    routes: Vec<Arc<Route>>,
}

impl Node {
    fn insert(&mut self, segments: &[Segment], route: Arc<Route>) {
        let Some((first, rest)) = segments.split_first() else {
            self.routes.push(route);
            return;
        };

        match first {
            Segment::Literal(value) => self
                .exact
                .entry(value.clone())
                .or_default()
                .insert(rest, route),
            Segment::Wildcard(_) => self
                .wildcard
                .get_or_insert_with(Box::default)
                .insert(rest, route),
            // Pattern parsing guarantees the free wildcard is last.
            Segment::FreeWildcard(_) => self.free_wildcard.push(route),
        }
    }

    fn search(&self, segments: &[&str], req: &Request<Body>) -> Option<&Arc<Route>> {
        match segments.split_first() {
            None => {
                if let Some(route) = first_accepting(&self.routes, req) {
                    return Some(route);
                }
            }
            Some((first, rest)) => {
                if let Some(child) = self.exact.get(*first) {
                    if let Some(route) = child.search(rest, req) {
                        return Some(route);
                    }
                }

                if let Some(child) = &self.wildcard {
                    if let Some(route) = child.search(rest, req) {
                        return Some(route);
                    }
                }
            }
        }

        first_accepting(&self.free_wildcard, req)
    }

    fn count(&self) -> usize {
        self.routes.len()
            + self.free_wildcard.len()
            + self.exact.values().map(Node::count).sum::<usize>()
            + self.wildcard.as_ref().map(|w| w.count()).unwrap_or(0)
    }
}

fn first_accepting<'a>(routes: &'a [Arc<Route>], req: &Request<Body>) -> Option<&'a Arc<Route>> {
    routes.iter().find(|route| route.accepts(req))
}

/// Immutable lookup structure over a set of compiled routes.
#[derive(Debug, Default)]
pub struct Matcher {
    root: Node,
    fallback: Vec<Arc<Route>>,
    routes: Vec<Arc<Route>>,
}

impl Matcher {
    /// Builds the tree. Input order decides ties between routes that end
    /// at the same leaf.
    pub fn build<I>(routes: I) -> Self
    where
        I: IntoIterator<Item = Arc<Route>>,
    {
        let mut matcher = Matcher::default();

        for route in routes {
            match &route.path {
                Some(pattern) => matcher.root.insert(pattern.segments(), route.clone()),
                None => matcher.fallback.push(route.clone()),
            }
            matcher.routes.push(route);
        }

        matcher
    }

    /// Finds the route for a request, using its URI path.
    pub fn lookup(&self, req: &Request<Body>) -> Option<RouteMatch> {
        self.lookup_path(req.uri().path(), req)
    }

    /// Finds the route for an explicit, already normalized path.
    pub fn lookup_path(&self, path: &str, req: &Request<Body>) -> Option<RouteMatch> {
        let segments = split_path(path);

        if let Some(route) = self.root.search(&segments, req) {
            let params = route
                .path
                .as_ref()
                .map(|pattern| pattern.bind(&segments))
                .unwrap_or_default();
            return Some(RouteMatch {
                route: route.clone(),
                params,
            });
        }

        first_accepting(&self.fallback, req).map(|route| RouteMatch {
            route: route.clone(),
            params: Params::new(),
        })
    }

    /// All routes in table order.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Number of routes placed in the tree, as opposed to the fallback list.
    pub fn tree_len(&self) -> usize {
        self.root.count()
    }
}

impl From<Vec<Route>> for Matcher {
    fn from(routes: Vec<Route>) -> Self {
        Matcher::build(routes.into_iter().map(Arc::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::compiler::compile;
    use crate::routing::definition::RouteDefinition;
    use crate::routing::filters::FilterRegistry;
    use crate::routing::predicates::PredicateRegistry;

    fn matcher(definitions: Vec<RouteDefinition>) -> Matcher {
        let (routes, errors) = compile(
            &definitions,
            &PredicateRegistry::with_builtins(),
            &FilterRegistry::with_builtins(),
        );
        assert!(errors.is_empty(), "{:?}", errors);
        Matcher::from(routes)
    }

    fn request(path: &str) -> Request<Body> {
        Request::builder()
            .uri(format!("https://www.example.org{}", path))
            .body(Body::default())
            .unwrap()
    }

    fn matched_id(matcher: &Matcher, req: &Request<Body>) -> Option<String> {
        matcher.lookup(req).map(|m| m.route.id.clone())
    }

    #[test]
    fn test_literal_beats_wildcards() {
        let m = matcher(vec![
            RouteDefinition::new("free", "https://a.org").with_path("/foo/*rest"),
            RouteDefinition::new("wild", "https://a.org").with_path("/foo/:name"),
            RouteDefinition::new("literal", "https://a.org").with_path("/foo/bar"),
        ]);

        assert_eq!(matched_id(&m, &request("/foo/bar")).as_deref(), Some("literal"));
        assert_eq!(matched_id(&m, &request("/foo/baz")).as_deref(), Some("wild"));
        assert_eq!(matched_id(&m, &request("/foo/baz/qux")).as_deref(), Some("free"));
        assert_eq!(matched_id(&m, &request("/foo")).as_deref(), Some("free"));
        assert_eq!(matched_id(&m, &request("/other")), None);
    }

    #[test]
    fn test_backtracks_past_rejecting_leaf() {
        let m = matcher(vec![
            RouteDefinition::new("a", "https://foo.org").with_path("/foo/*_"),
            RouteDefinition::new("b", "https://bar.org")
                .with_path("/foo/bar")
                .with_predicate("Header", vec!["X-Custom-Predicate".into(), "custom1".into()]),
            RouteDefinition::new("z", "https://catch.all"),
        ]);

        assert_eq!(matched_id(&m, &request("/foo/bar")).as_deref(), Some("a"));

        let mut req = request("/foo/bar");
        req.headers_mut()
            .insert("X-Custom-Predicate", "custom1".parse().unwrap());
        assert_eq!(matched_id(&m, &req).as_deref(), Some("b"));

        assert_eq!(matched_id(&m, &request("/elsewhere")).as_deref(), Some("z"));
    }

    #[test]
    fn test_backtracks_across_wildcard_subtrees() {
        let m = matcher(vec![
            RouteDefinition::new("deep-literal", "https://a.org")
                .with_path("/users/me/profile")
                .with_predicate("Method", vec!["POST".into()]),
            RouteDefinition::new("deep-wild", "https://a.org").with_path("/users/:id/profile"),
        ]);

        assert_eq!(
            matched_id(&m, &request("/users/me/profile")).as_deref(),
            Some("deep-wild")
        );
    }

    #[test]
    fn test_leaf_order_is_tie_break() {
        let m = matcher(vec![
            RouteDefinition::new("first", "https://a.org").with_path("/x"),
            RouteDefinition::new("second", "https://a.org").with_path("/x"),
        ]);
        assert_eq!(matched_id(&m, &request("/x")).as_deref(), Some("first"));
    }

    #[test]
    fn test_params_are_bound() {
        let m = matcher(vec![
            RouteDefinition::new("files", "https://a.org").with_path("/u/:user/files/*path"),
        ]);

        let found = m.lookup(&request("/u/ada/files/a/b.txt")).unwrap();
        assert_eq!(found.params.get("user").map(String::as_str), Some("ada"));
        assert_eq!(found.params.get("path").map(String::as_str), Some("/a/b.txt"));
    }

    #[test]
    fn test_root_and_fallback() {
        let m = matcher(vec![
            RouteDefinition::new("catch-all", "https://a.org"),
            RouteDefinition::new("root", "https://a.org").with_path("/"),
        ]);

        assert_eq!(matched_id(&m, &request("/")).as_deref(), Some("root"));
        assert_eq!(matched_id(&m, &request("/x")).as_deref(), Some("catch-all"));
        assert_eq!(m.len(), 2);
        assert_eq!(m.tree_len(), 1);
    }

    #[test]
    fn test_trailing_slash_and_case() {
        let m = matcher(vec![RouteDefinition::new("p", "https://a.org").with_path("/Some/Path")]);

        assert_eq!(matched_id(&m, &request("/Some/Path/")).as_deref(), Some("p"));
        assert_eq!(matched_id(&m, &request("/some/path")), None);
    }

    #[test]
    fn test_empty_matcher() {
        let m = Matcher::default();
        assert!(m.is_empty());
        assert!(m.lookup(&request("/anything")).is_none());
    }
}
