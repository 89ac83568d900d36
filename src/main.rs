//! Route Engine
//!
//! Keeps a request routing table in sync with a set of route files and
//! answers lookups against it over HTTP.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                     ROUTE ENGINE                      │
//!                      │                                                       │
//!   route file A ──────┼─▶ FileSource ──┐                                      │
//!   route file B ──────┼─▶ FileSource ──┼─▶ aggregator ─▶ compile ─▶ Matcher   │
//!                      │   (one poller  │   (merge,                    │       │
//!                      │    per source) ┘    coalesce)                 ▼       │
//!                      │                                      ┌──────────────┐ │
//!   Client Request ────┼─▶ http server ─────── lookup ───────▶│  RouteTable  │ │
//!   Client Response ◀──┼── {id, backend, params} / 404 ◀──────│  (ArcSwap)   │ │
//!                      │                                      └──────────────┘ │
//!                      │  ┌─────────────────────────────────────────────────┐  │
//!                      │  │  config │ observability │ lifecycle (shutdown)  │  │
//!                      │  └─────────────────────────────────────────────────┘  │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use route_engine::config::{load_config, load_routes, FileSource, RouterConfig};
use route_engine::observability::{logging, metrics};
use route_engine::routing::{
    compile, DataClient, FilterRegistry, PredicateRegistry, Routing, RoutingOptions,
};
use route_engine::{HttpServer, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "route-engine", version, about = "Dynamic request routing engine")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "route-engine.toml")]
    config: PathBuf,

    /// Load and compile the configured route files, report errors and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    logging::init(&config.observability)?;

    tracing::info!(
        config = %args.config.display(),
        bind_address = %config.listener.bind_address,
        route_files = config.routing.route_files.len(),
        poll_interval_ms = config.routing.poll_interval_ms,
        "Configuration loaded"
    );

    if args.check {
        return check_routes(&config);
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let mut sources: Vec<Arc<dyn DataClient>> = Vec::new();
    for path in &config.routing.route_files {
        let source = if config.routing.watch_files {
            FileSource::watched(path)?
        } else {
            FileSource::new(path)
        };
        sources.push(Arc::new(source));
    }

    let routing = Arc::new(Routing::new(RoutingOptions {
        poll_interval: config.routing.poll_interval(),
        sources,
        ..RoutingOptions::default()
    }));
    routing.start();

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let mut stopped = shutdown.subscribe();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, initiating shutdown"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
        }
        signal.trigger();
    });

    let server = HttpServer::new(routing.clone());
    server
        .run(listener, async move {
            let _ = stopped.recv().await;
        })
        .await?;

    routing.close();
    routing.join().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Compiles every configured route file once with the built-in registries.
fn check_routes(config: &RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let predicates = PredicateRegistry::with_builtins();
    let filters = FilterRegistry::with_builtins();
    let mut failed = 0;

    for path in &config.routing.route_files {
        let definitions = load_routes(Path::new(path))?;
        let (routes, errors) = compile(&definitions, &predicates, &filters);
        for error in &errors {
            tracing::error!(file = %path, "{}", error);
        }
        tracing::info!(
            file = %path,
            routes = routes.len(),
            errors = errors.len(),
            "Route file checked"
        );
        failed += errors.len();
    }

    if failed > 0 {
        return Err(format!("{} route definition(s) failed to compile", failed).into());
    }
    Ok(())
}
