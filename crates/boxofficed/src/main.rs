//! boxofficed - Box Office Gateway Daemon
//!
//! REST front door for the catalog, media and search services.
//!
//! Usage:
//!   boxofficed [OPTIONS] [gateway.toml]
//!
//! If no config file is provided, the well-known local service ports are used.
//! Environment variables (`GATEWAY_PORT`, `FRONTEND_URL`, `<NAME>_TCP_PORT`, ...)
//! override the file.

mod config;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use boxoffice_api::{create_router, AppState};
use boxoffice_core::ServiceClient;
use boxoffice_gateway::ServiceRegistry;
use boxoffice_rpc::TcpClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::GatewayConfig;

/// Parsed command-line arguments
struct Args {
    /// Gateway config file (TOML)
    config_path: Option<String>,
    /// Overrides the configured HTTP port
    port: Option<u16>,
    /// Emit logs as JSON lines
    log_json: bool,
    /// Arguments that were not understood, reported once logging is up
    unknown: Vec<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut result = Args {
        config_path: None,
        port: None,
        log_json: false,
        unknown: Vec::new(),
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                match args.get(i + 1).and_then(|p| p.parse().ok()) {
                    Some(port) => result.port = Some(port),
                    None => result.unknown.push(args[i].clone()),
                }
                i += 2;
            }
            "--log-json" => {
                result.log_json = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                // Positional argument = config file
                result.config_path = Some(arg.to_string());
                i += 1;
            }
            _ => {
                result.unknown.push(args[i].clone());
                i += 1;
            }
        }
    }

    result
}

fn print_help() {
    eprintln!(
        r#"boxofficed - Box Office Gateway Daemon

Usage: boxofficed [OPTIONS] [gateway.toml]

Options:
  -p, --port <port>   HTTP port (overrides config and GATEWAY_PORT)
      --log-json      Emit logs as JSON lines
  -h, --help          Print this help message

Environment:
  GATEWAY_PORT        HTTP port (default 3000)
  FRONTEND_URL        Allowed CORS origin (default http://localhost:5173)
  REQUEST_TIMEOUT_MS  Bound on every downstream call (default 3000)
  <NAME>_TCP_HOST     Host of a downstream service, e.g. CATALOG_TCP_HOST
  <NAME>_TCP_PORT     Port of a downstream service, e.g. CATALOG_TCP_PORT

Examples:
  # Run against the default local services
  boxofficed

  # Run with config file and JSON logs
  boxofficed --log-json gateway.toml
"#
    );
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "boxofficed=info,boxoffice_api=info,boxoffice_gateway=info,boxoffice_rpc=info,tower_http=info"
            .into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args();
    init_tracing(args.log_json);

    for arg in &args.unknown {
        tracing::warn!("Unknown or incomplete argument: {}", arg);
    }

    tracing::info!("Starting boxofficed (Box Office Gateway)");

    if let Some(ref path) = args.config_path {
        tracing::info!("Loading config from: {}", path);
    }
    let mut config = GatewayConfig::resolve(args.config_path.as_deref().map(Path::new))
        .context("Failed to load gateway configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let clients: Vec<Arc<dyn ServiceClient>> = config
        .identities()
        .iter()
        .filter_map(TcpClient::from_identity)
        .map(|client| Arc::new(client) as Arc<dyn ServiceClient>)
        .collect();
    let registry = ServiceRegistry::with_clients(clients, config.request_timeout());

    let origin = HeaderValue::from_str(&config.cors_origin)
        .with_context(|| format!("Invalid CORS origin: {}", config.cors_origin))?;
    let state = AppState::new(&config.name, registry).with_cors_origin(origin);
    let app = create_router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        services = config.services.len(),
        timeout_ms = config.request_timeout_ms,
        "Listening on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
