//! Starling - strategy host CLI

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use starling::collaborators::spawn_drain;
use starling::{build_bus, launch, HostConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file layered over config/default.toml
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    init_tracing(&args.log_level, args.json_logs)?;
    info!(version = starling::VERSION, "starting strategy host");

    if let Some(addr) = args.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%addr, "metrics exporter listening");
    }

    let config = HostConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    let bus = build_bus(&config.bus);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let drain = spawn_drain(
        bus.clone(),
        Duration::from_millis(config.bus.drain_interval_ms),
        shutdown_rx,
    );

    let mut host = launch(&config, &bus).await;
    info!(actors = host.len(), "strategy actors spawned");

    wait_for_shutdown().await;

    info!("shutting down strategy actors");
    host.stop_all().await;
    let _ = shutdown_tx.send(true);
    match drain.await {
        Ok(stats) => info!(
            orders = stats.order_requests,
            risk_checks = stats.risk_checks,
            "collaborator channels drained"
        ),
        Err(err) => error!(error = %err, "drain task failed"),
    }
    info!("strategy host shut down");
    Ok(())
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .context("invalid log level")?;
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(true))
            .try_init()?;
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()?;
    }
    Ok(())
}

async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(err) => error!(error = %err, "failed to listen for shutdown signal"),
    }
}
