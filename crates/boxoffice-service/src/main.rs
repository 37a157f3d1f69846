//! boxoffice-service - Downstream Service Daemon
//!
//! Runs one named downstream service (catalog, media, search, ...) that
//! answers `service.ping` over the socket transport.
//!
//! Usage:
//!   boxoffice-service --name <name> [--host <host>] [--port <port>]
//!
//! The port falls back to `<NAME>_TCP_PORT`, then to the service's well-known
//! default.

use anyhow::Context;
use boxoffice_core::{env_prefix, well_known_port};
use boxoffice_rpc::{ping, MessageRouter, TcpServer};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "boxoffice-service")]
#[command(about = "Downstream service daemon for the box office gateway")]
#[command(after_help = "Well-known ports:\n  catalog 4011, media 4012, search 4013")]
struct Args {
    /// Service name, e.g. catalog, media, search
    #[arg(short, long)]
    name: String,

    /// Bind host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Bind port (default <NAME>_TCP_PORT or the well-known port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

/// `--port`, then `<NAME>_TCP_PORT`, then the well-known default
fn resolve_port<F>(name: &str, flag: Option<u16>, lookup: F) -> anyhow::Result<u16>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = flag {
        return Ok(port);
    }

    let var = format!("{}_TCP_PORT", env_prefix(name));
    if let Some(value) = lookup(&var) {
        return value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {}", var, value));
    }

    well_known_port(name)
        .with_context(|| format!("No port given for {} (use --port or {})", name, var))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "boxoffice_service=info,boxoffice_rpc=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let port = resolve_port(&args.name, args.port, |var| std::env::var(var).ok())?;

    tracing::info!(service = %args.name, "Starting boxoffice-service");

    let router = ping::register(MessageRouter::new(&args.name));
    let server = TcpServer::bind((args.host.as_str(), port), router)
        .await
        .with_context(|| format!("Failed to bind {}:{}", args.host, port))?;

    server.serve_with_shutdown(shutdown_signal()).await?;

    tracing::info!(service = %args.name, "Service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
