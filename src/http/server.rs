//! Inspection HTTP server.
//!
//! # Responsibilities
//! - Create the Axum Router over a running routing controller
//! - Answer every request with the route it would be dispatched to
//! - List the routes of the current snapshot
//! - Bind server to listener, stop on shutdown
//!
//! # Design Decisions
//! - No upstream forwarding: the response describes the matched route
//! - Handlers read the published snapshot only, never the controller state

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::routing::{Params, Routing};

/// Path of the route listing endpoint.
pub const ROUTES_PATH: &str = "/__routes";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routing: Arc<Routing>,
}

/// Lookup result returned for matched requests.
#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub id: String,
    pub backend: String,
    pub params: Params,
}

/// One entry of the route listing.
#[derive(Debug, Serialize)]
pub struct RouteSummary {
    pub id: String,
    pub backend: String,
    pub path: Option<String>,
}

/// Route listing for the current snapshot.
#[derive(Debug, Serialize)]
pub struct RoutesResponse {
    pub generation: u64,
    pub routes: Vec<RouteSummary>,
}

/// HTTP server exposing the routing query API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(routing: Arc<Routing>) -> Self {
        Self {
            router: build_router(AppState { routing }),
        }
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(ROUTES_PATH, get(routes_handler))
        .fallback(lookup_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn routes_handler(State(state): State<AppState>) -> Json<RoutesResponse> {
    let snapshot = state.routing.table().snapshot();
    let routes = snapshot
        .matcher
        .routes()
        .iter()
        .map(|route| RouteSummary {
            id: route.id.clone(),
            backend: route.backend.to_string(),
            path: route.path.as_ref().map(|p| p.to_string()),
        })
        .collect();

    Json(RoutesResponse {
        generation: snapshot.generation,
        routes,
    })
}

async fn lookup_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    match state.routing.route(&request) {
        Some(found) => {
            tracing::debug!(
                method = %request.method(),
                path = %request.uri().path(),
                route_id = %found.route.id,
                "Route matched"
            );
            Json(MatchResponse {
                id: found.route.id.clone(),
                backend: found.route.backend.to_string(),
                params: found.params,
            })
            .into_response()
        }
        None => {
            tracing::debug!(path = %request.uri().path(), "No route matched");
            (StatusCode::NOT_FOUND, "No matching route found").into_response()
        }
    }
}
