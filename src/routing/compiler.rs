//! Route compilation.
//!
//! Turns raw definitions into runnable routes by resolving every predicate
//! and filter call through the registries and parsing the backend. The
//! `Path` predicate is pulled out for tree placement. A definition that
//! fails anywhere is dropped as a whole; its siblings are unaffected.

use axum::body::Body;
use axum::http::Request;
use thiserror::Error;

use crate::routing::definition::{Arg, Backend, BackendError, RouteDefinition, PATH_PREDICATE};
use crate::routing::filters::{FilterRegistry, RouteFilter};
use crate::routing::path::{PathError, PathPattern};
use crate::routing::predicates::{expect_count, string_arg, ArgError, Predicate, PredicateRegistry};

/// A definition resolved into runnable parts. Never mutated once built.
#[derive(Debug)]
pub struct Route {
    pub id: String,
    /// Tree placement; `None` makes this a root-level fallback route.
    pub path: Option<PathPattern>,
    /// Residual predicates, all of which must accept.
    pub predicates: Vec<Box<dyn Predicate>>,
    pub filters: Vec<RouteFilter>,
    pub backend: Backend,
    /// The definition this route was compiled from.
    pub definition: RouteDefinition,
}

impl Route {
    /// True if every residual predicate accepts the request.
    pub fn accepts(&self, req: &Request<Body>) -> bool {
        self.predicates.iter().all(|p| p.matches(req))
    }
}

/// A definition that could not be compiled.
#[derive(Debug, Error)]
#[error("route {route_id}: {kind}")]
pub struct CompileError {
    pub route_id: String,
    pub kind: CompileErrorKind,
}

#[derive(Debug, Error)]
pub enum CompileErrorKind {
    #[error("unknown predicate {0:?}")]
    UnknownPredicate(String),

    #[error("unknown filter {0:?}")]
    UnknownFilter(String),

    #[error("predicate {name}: {source}")]
    PredicateArgs { name: String, source: ArgError },

    #[error("filter {name}: {source}")]
    FilterArgs { name: String, source: ArgError },

    #[error("invalid backend: {0}")]
    InvalidBackend(#[from] BackendError),

    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    #[error("more than one Path predicate")]
    DuplicatePath,

    #[error("{name}: unsupported argument of kind {kind}")]
    UnsupportedArg { name: String, kind: &'static str },
}

/// Compiles definitions against a fixed set of factories.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'a> {
    predicates: &'a PredicateRegistry,
    filters: &'a FilterRegistry,
}

impl<'a> Compiler<'a> {
    pub fn new(predicates: &'a PredicateRegistry, filters: &'a FilterRegistry) -> Self {
        Self {
            predicates,
            filters,
        }
    }

    /// Compiles every definition, keeping input order for the routes that
    /// succeed and reporting one error per dropped definition.
    pub fn compile(&self, definitions: &[RouteDefinition]) -> (Vec<Route>, Vec<CompileError>) {
        let mut routes = Vec::with_capacity(definitions.len());
        let mut errors = Vec::new();

        for definition in definitions {
            match self.compile_route(definition) {
                Ok(route) => routes.push(route),
                Err(kind) => errors.push(CompileError {
                    route_id: definition.id.clone(),
                    kind,
                }),
            }
        }

        (routes, errors)
    }

    pub fn compile_route(&self, definition: &RouteDefinition) -> Result<Route, CompileErrorKind> {
        let mut path = None;
        let mut predicates = Vec::with_capacity(definition.predicates.len());

        for call in &definition.predicates {
            check_args(&call.name, &call.args)?;
            if call.name == PATH_PREDICATE {
                if path.is_some() {
                    return Err(CompileErrorKind::DuplicatePath);
                }
                path = Some(parse_path_args(&call.args)?);
                continue;
            }

            let spec = self
                .predicates
                .get(&call.name)
                .ok_or_else(|| CompileErrorKind::UnknownPredicate(call.name.clone()))?;
            let predicate = spec
                .create(&call.args)
                .map_err(|source| CompileErrorKind::PredicateArgs {
                    name: call.name.clone(),
                    source,
                })?;
            predicates.push(predicate);
        }

        let mut filters = Vec::with_capacity(definition.filters.len());
        for (index, call) in definition.filters.iter().enumerate() {
            check_args(&call.name, &call.args)?;
            let spec = self
                .filters
                .get(&call.name)
                .ok_or_else(|| CompileErrorKind::UnknownFilter(call.name.clone()))?;
            let filter = spec
                .create(&call.args)
                .map_err(|source| CompileErrorKind::FilterArgs {
                    name: call.name.clone(),
                    source,
                })?;
            filters.push(RouteFilter {
                name: call.name.clone(),
                index,
                filter,
            });
        }

        let backend = definition.backend.parse::<Backend>()?;

        Ok(Route {
            id: definition.id.clone(),
            path,
            predicates,
            filters,
            backend,
            definition: definition.clone(),
        })
    }
}

/// Rejects literals outside the supported argument kinds.
fn check_args(name: &str, args: &[Arg]) -> Result<(), CompileErrorKind> {
    match args.iter().find(|arg| matches!(arg, Arg::Unsupported(_))) {
        Some(arg) => Err(CompileErrorKind::UnsupportedArg {
            name: name.to_string(),
            kind: arg.kind(),
        }),
        None => Ok(()),
    }
}

fn parse_path_args(args: &[Arg]) -> Result<PathPattern, CompileErrorKind> {
    let pattern = expect_count(args, 1)
        .and_then(|_| string_arg(args, 0))
        .map_err(|source| CompileErrorKind::PredicateArgs {
            name: PATH_PREDICATE.to_string(),
            source,
        })?;
    Ok(PathPattern::parse(pattern)?)
}

/// Compiles definitions with the given registries.
pub fn compile(
    definitions: &[RouteDefinition],
    predicates: &PredicateRegistry,
    filters: &FilterRegistry,
) -> (Vec<Route>, Vec<CompileError>) {
    Compiler::new(predicates, filters).compile(definitions)
}
