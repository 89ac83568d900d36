//! Route definitions as delivered by data sources.
//!
//! A definition is plain data: an id, the predicate and filter calls with
//! their literal arguments, and the backend string. Nothing here is
//! resolved yet; the compiler turns definitions into runnable routes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Name of the predicate that places a route in the lookup tree.
pub const PATH_PREDICATE: &str = "Path";

/// Literal argument of a predicate or filter call.
///
/// Regular expressions are passed as strings and compiled by the
/// predicates that accept them. Any other literal is kept as
/// `Unsupported` so that only the route using it is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Number(f64),
    String(String),
    List(Vec<String>),
    Unsupported(toml::Value),
}

impl Arg {
    /// Name of the argument kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Arg::Number(_) => "number",
            Arg::String(_) => "string",
            Arg::List(_) => "list",
            Arg::Unsupported(value) => value.type_str(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Arg::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::String(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::String(s)
    }
}

impl From<f64> for Arg {
    fn from(n: f64) -> Self {
        Arg::Number(n)
    }
}

impl From<Vec<String>> for Arg {
    fn from(list: Vec<String>) -> Self {
        Arg::List(list)
    }
}

/// A predicate call, e.g. `Header("X-Tenant", "acme")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateDef {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Arg>,
}

/// A filter call, e.g. `setRequestHeader("X-Gateway", "edge")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDef {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Arg>,
}

/// Raw route definition, immutable once handed to the routing core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Identifier, unique within its source.
    pub id: String,

    /// Predicate calls, evaluated with AND semantics.
    #[serde(default)]
    pub predicates: Vec<PredicateDef>,

    /// Filter chain, in application order.
    #[serde(default)]
    pub filters: Vec<FilterDef>,

    /// Backend target: an absolute URL or one of the special forms.
    pub backend: String,
}

impl RouteDefinition {
    pub fn new(id: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            predicates: Vec::new(),
            filters: Vec::new(),
            backend: backend.into(),
        }
    }

    /// Adds a `Path(pattern)` predicate.
    pub fn with_path(self, pattern: &str) -> Self {
        self.with_predicate(PATH_PREDICATE, vec![Arg::from(pattern)])
    }

    pub fn with_predicate(mut self, name: impl Into<String>, args: Vec<Arg>) -> Self {
        self.predicates.push(PredicateDef {
            name: name.into(),
            args,
        });
        self
    }

    pub fn with_filter(mut self, name: impl Into<String>, args: Vec<Arg>) -> Self {
        self.filters.push(FilterDef {
            name: name.into(),
            args,
        });
        self
    }
}

/// Backend target of a compiled route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Proxy to a network address.
    Network(Url),
    /// Respond from the gateway without contacting a backend.
    Shunt,
    /// Re-enter route lookup with the filtered request.
    Loopback,
    /// Backend chosen by filters at request time.
    Dynamic,
}

/// Why a backend string was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("unparsable url {input:?}: {reason}")]
    Url { input: String, reason: String },

    #[error("unsupported scheme {0:?}")]
    Scheme(String),

    #[error("missing host in {0:?}")]
    MissingHost(String),
}

impl FromStr for Backend {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let special = trimmed
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
            .unwrap_or(trimmed);

        match special {
            "shunt" => return Ok(Backend::Shunt),
            "loopback" => return Ok(Backend::Loopback),
            "dynamic" => return Ok(Backend::Dynamic),
            _ => {}
        }

        let url = Url::parse(trimmed).map_err(|e| BackendError::Url {
            input: s.to_string(),
            reason: e.to_string(),
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(BackendError::Scheme(url.scheme().to_string()));
        }

        match url.host_str() {
            Some(host) if !host.is_empty() => Ok(Backend::Network(url)),
            _ => Err(BackendError::MissingHost(s.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Network(url) => write!(f, "{}", url),
            Backend::Shunt => f.write_str("<shunt>"),
            Backend::Loopback => f.write_str("<loopback>"),
            Backend::Dynamic => f.write_str("<dynamic>"),
        }
    }
}
