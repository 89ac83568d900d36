//! Request predicates and their factories.
//!
//! # Responsibilities
//! - Define the `Predicate` instance trait evaluated at route leaves
//! - Define the `PredicateSpec` factory trait resolved by name
//! - Provide the built-in Host, HostRegexp, Method, Header and HeaderRegexp
//!
//! # Design Decisions
//! - Host matching is case-insensitive and ignores the port
//! - Header values and methods are compared exactly
//! - Factories validate their arguments once, at compile time

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{HeaderName, HOST};
use axum::http::{Method, Request};
use regex::Regex;
use thiserror::Error;

use crate::routing::definition::Arg;

/// A compiled condition over an incoming request.
pub trait Predicate: Send + Sync + fmt::Debug {
    /// Returns true if the request satisfies this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Factory creating predicate instances from literal arguments.
pub trait PredicateSpec: Send + Sync {
    /// Name used in route definitions.
    fn name(&self) -> &str;

    /// Validates the arguments and creates an instance.
    fn create(&self, args: &[Arg]) -> Result<Box<dyn Predicate>, ArgError>;
}

/// Argument rejection reported by a predicate or filter factory.
#[derive(Debug, Error)]
pub enum ArgError {
    #[error("expected {expected} argument(s), got {got}")]
    Count { expected: usize, got: usize },

    #[error("argument {index}: expected {expected}, got {got}")]
    Kind {
        index: usize,
        expected: &'static str,
        got: &'static str,
    },

    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Fails unless exactly `expected` arguments were given.
pub fn expect_count(args: &[Arg], expected: usize) -> Result<(), ArgError> {
    if args.len() != expected {
        return Err(ArgError::Count {
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

/// Returns argument `index` as a string.
pub fn string_arg(args: &[Arg], index: usize) -> Result<&str, ArgError> {
    let arg = args.get(index).ok_or(ArgError::Count {
        expected: index + 1,
        got: args.len(),
    })?;
    arg.as_str().ok_or(ArgError::Kind {
        index,
        expected: "string",
        got: arg.kind(),
    })
}

/// Name-keyed predicate factories. Registering a name twice replaces the
/// earlier factory.
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    specs: HashMap<String, Arc<dyn PredicateSpec>>,
}

impl PredicateRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in predicates.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(HostSpec));
        registry.register(Arc::new(HostRegexpSpec));
        registry.register(Arc::new(MethodSpec));
        registry.register(Arc::new(HeaderSpec));
        registry.register(Arc::new(HeaderRegexpSpec));
        registry
    }

    pub fn register(&mut self, spec: Arc<dyn PredicateSpec>) {
        self.specs.insert(spec.name().to_string(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn PredicateSpec>> {
        self.specs.get(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.specs.keys().collect();
        names.sort();
        f.debug_struct("PredicateRegistry").field("names", &names).finish()
    }
}

/// Host of the request without the port, from the Host header or, for
/// HTTP/2 requests, the URI authority.
fn request_host(req: &Request<Body>) -> Option<&str> {
    let host = req
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().host())?;
    Some(strip_port(host))
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.split_once(']').map(|(h, _)| &host[..=h.len()]).unwrap_or(host);
    }
    host.rsplit_once(':').map(|(h, _)| h).unwrap_or(host)
}

/// Matches the request host exactly, ignoring case.
#[derive(Debug, Clone)]
pub struct HostPredicate {
    expected_host: String,
}

impl HostPredicate {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl Predicate for HostPredicate {
    fn matches(&self, req: &Request<Body>) -> bool {
        request_host(req)
            .map(|h| h.eq_ignore_ascii_case(&self.expected_host))
            .unwrap_or(false)
    }
}

struct HostSpec;

impl PredicateSpec for HostSpec {
    fn name(&self) -> &str {
        "Host"
    }

    fn create(&self, args: &[Arg]) -> Result<Box<dyn Predicate>, ArgError> {
        expect_count(args, 1)?;
        Ok(Box::new(HostPredicate::new(string_arg(args, 0)?)))
    }
}

/// Matches the request host against a regular expression.
#[derive(Debug, Clone)]
pub struct HostRegexpPredicate {
    pattern: Regex,
}

impl Predicate for HostRegexpPredicate {
    fn matches(&self, req: &Request<Body>) -> bool {
        request_host(req)
            .map(|h| self.pattern.is_match(h))
            .unwrap_or(false)
    }
}

struct HostRegexpSpec;

impl PredicateSpec for HostRegexpSpec {
    fn name(&self) -> &str {
        "HostRegexp"
    }

    fn create(&self, args: &[Arg]) -> Result<Box<dyn Predicate>, ArgError> {
        expect_count(args, 1)?;
        let pattern = Regex::new(string_arg(args, 0)?)?;
        Ok(Box::new(HostRegexpPredicate { pattern }))
    }
}

/// Matches the request method.
#[derive(Debug, Clone)]
pub struct MethodPredicate {
    method: Method,
}

impl Predicate for MethodPredicate {
    fn matches(&self, req: &Request<Body>) -> bool {
        *req.method() == self.method
    }
}

struct MethodSpec;

impl PredicateSpec for MethodSpec {
    fn name(&self) -> &str {
        "Method"
    }

    fn create(&self, args: &[Arg]) -> Result<Box<dyn Predicate>, ArgError> {
        expect_count(args, 1)?;
        let method = string_arg(args, 0)?.to_uppercase();
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| ArgError::Invalid(format!("invalid method {:?}", method)))?;
        Ok(Box::new(MethodPredicate { method }))
    }
}

/// Matches a header value exactly.
#[derive(Debug, Clone)]
pub struct HeaderPredicate {
    name: HeaderName,
    value: String,
}

impl Predicate for HeaderPredicate {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.headers()
            .get_all(&self.name)
            .iter()
            .any(|v| v.as_bytes() == self.value.as_bytes())
    }
}

fn header_name(args: &[Arg]) -> Result<HeaderName, ArgError> {
    let name = string_arg(args, 0)?;
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ArgError::Invalid(format!("invalid header name {:?}", name)))
}

struct HeaderSpec;

impl PredicateSpec for HeaderSpec {
    fn name(&self) -> &str {
        "Header"
    }

    fn create(&self, args: &[Arg]) -> Result<Box<dyn Predicate>, ArgError> {
        expect_count(args, 2)?;
        Ok(Box::new(HeaderPredicate {
            name: header_name(args)?,
            value: string_arg(args, 1)?.to_string(),
        }))
    }
}

/// Matches any value of a header against a regular expression.
#[derive(Debug, Clone)]
pub struct HeaderRegexpPredicate {
    name: HeaderName,
    pattern: Regex,
}

impl Predicate for HeaderRegexpPredicate {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.headers()
            .get_all(&self.name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| self.pattern.is_match(v))
    }
}

struct HeaderRegexpSpec;

impl PredicateSpec for HeaderRegexpSpec {
    fn name(&self) -> &str {
        "HeaderRegexp"
    }

    fn create(&self, args: &[Arg]) -> Result<Box<dyn Predicate>, ArgError> {
        expect_count(args, 2)?;
        Ok(Box::new(HeaderRegexpPredicate {
            name: header_name(args)?,
            pattern: Regex::new(string_arg(args, 1)?)?,
        }))
    }
}
