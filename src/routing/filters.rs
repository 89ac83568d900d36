//! Filter factories.
//!
//! Filters are opaque to routing: a compiled route only carries them in
//! definition order for the proxy pipeline. Factories still validate their
//! arguments up front so that a bad filter call rejects the whole route.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::header::{HeaderName, HeaderValue};

use crate::routing::definition::Arg;
use crate::routing::predicates::{expect_count, string_arg, ArgError};

/// A compiled filter instance.
pub trait Filter: Send + Sync + fmt::Debug {
    /// Access to the concrete type for pipeline stages that know it.
    fn as_any(&self) -> &dyn Any;
}

/// Factory creating filter instances from literal arguments.
pub trait FilterSpec: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self, args: &[Arg]) -> Result<Box<dyn Filter>, ArgError>;
}

/// A filter as attached to a route.
#[derive(Debug)]
pub struct RouteFilter {
    /// Name the filter was created with.
    pub name: String,
    /// Position in the route's filter chain.
    pub index: usize,
    pub filter: Box<dyn Filter>,
}

/// Name-keyed filter factories.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    specs: HashMap<String, Arc<dyn FilterSpec>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in header filters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SetHeaderSpec {
            name: "setRequestHeader",
            target: HeaderTarget::Request,
        }));
        registry.register(Arc::new(SetHeaderSpec {
            name: "setResponseHeader",
            target: HeaderTarget::Response,
        }));
        registry.register(Arc::new(DropRequestHeaderSpec));
        registry
    }

    pub fn register(&mut self, spec: Arc<dyn FilterSpec>) {
        self.specs.insert(spec.name().to_string(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn FilterSpec>> {
        self.specs.get(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.specs.keys().collect();
        names.sort();
        f.debug_struct("FilterRegistry").field("names", &names).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderTarget {
    Request,
    Response,
}

/// Sets a request or response header.
#[derive(Debug, Clone)]
pub struct SetHeader {
    pub target: HeaderTarget,
    pub name: HeaderName,
    pub value: HeaderValue,
}

impl Filter for SetHeader {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct SetHeaderSpec {
    name: &'static str,
    target: HeaderTarget,
}

impl FilterSpec for SetHeaderSpec {
    fn name(&self) -> &str {
        self.name
    }

    fn create(&self, args: &[Arg]) -> Result<Box<dyn Filter>, ArgError> {
        expect_count(args, 2)?;
        let name = parse_header_name(string_arg(args, 0)?)?;
        let value = string_arg(args, 1)?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ArgError::Invalid(format!("invalid header value {:?}", value)))?;
        Ok(Box::new(SetHeader {
            target: self.target,
            name,
            value,
        }))
    }
}

/// Removes a request header before forwarding.
#[derive(Debug, Clone)]
pub struct DropRequestHeader {
    pub name: HeaderName,
}

impl Filter for DropRequestHeader {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct DropRequestHeaderSpec;

impl FilterSpec for DropRequestHeaderSpec {
    fn name(&self) -> &str {
        "dropRequestHeader"
    }

    fn create(&self, args: &[Arg]) -> Result<Box<dyn Filter>, ArgError> {
        expect_count(args, 1)?;
        Ok(Box::new(DropRequestHeader {
            name: parse_header_name(string_arg(args, 0)?)?,
        }))
    }
}

fn parse_header_name(name: &str) -> Result<HeaderName, ArgError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ArgError::Invalid(format!("invalid header name {:?}", name)))
}
