// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use clap::{Parser, Subcommand};
use ddnsync::{
    authority::{AuthorityResolver, SystemSoaLookup},
    catalog::ZoneCatalog,
    config::Config,
    constants::{METRICS_SERVER_PATH, TOKIO_WORKER_THREADS},
    dispatch::{HickoryUpdateTransport, UpdateDispatcher},
    jobs::TokioJobRunner,
    ledger::{DnsStatus, FileStatusStore, MemoryStatusStore, StatusLedger, StatusStore},
    metrics,
    model::{Binding, Direction, ResultCode},
    reconciler::{BindingEvent, DnsJobWorker, Reconciler},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "ddnsync", version, about = "Keep DNS in sync with IPAM address bindings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a configuration file and print the resulting zone catalog
    CheckConfig {
        /// Path to the YAML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Read newline-delimited JSON binding events from stdin and apply them
    Run {
        /// Path to the YAML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Create all records of one binding again
    Recreate {
        /// Path to the YAML configuration file
        #[arg(short, long)]
        config: PathBuf,
        /// The binding as JSON, e.g. '{"id":1,"address":"10.0.0.1","dnsName":"host.example.com"}'
        #[arg(short, long)]
        binding: String,
    },
    /// Print the status ledger
    Status {
        /// Path to the YAML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("ddnsync")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Respects RUST_LOG (default INFO) and RUST_LOG_FORMAT=json|text
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    match cli.command {
        Commands::CheckConfig { config } => check_config(&config),
        Commands::Run { config } => run(&config).await,
        Commands::Recreate { config, binding } => recreate(&config, &binding).await,
        Commands::Status { config } => status(&config).await,
    }
}

/// Everything needed to turn events into DNS updates.
struct Service {
    reconciler: Reconciler,
    runner: Arc<TokioJobRunner>,
    store: Arc<dyn StatusStore>,
}

async fn open_store(config: &Config) -> Result<Arc<dyn StatusStore>> {
    match &config.ledger.path {
        Some(path) => {
            let store = FileStatusStore::open(path)
                .await
                .with_context(|| format!("Failed to open status ledger {}", path.display()))?;
            debug!(path = %path.display(), "Using file status ledger");
            Ok(Arc::new(store))
        }
        None => {
            warn!("No ledger path configured, status is kept in memory only");
            Ok(Arc::new(MemoryStatusStore::new()))
        }
    }
}

async fn build_service(config: &Config) -> Result<Service> {
    let catalog = ZoneCatalog::from_config(config).context("Invalid configuration")?;
    let catalog = Arc::new(RwLock::new(catalog));

    let lookup = SystemSoaLookup::from_system_conf(&config.resolver)
        .context("Failed to initialize SOA resolver")?;
    let authority = AuthorityResolver::new(Arc::new(lookup));
    let transport = Arc::new(HickoryUpdateTransport::new(config.update.timeout()));
    let dispatcher = UpdateDispatcher::new(authority, transport);

    let store = open_store(config).await?;
    let ledger = StatusLedger::new(Arc::clone(&store));

    let worker = DnsJobWorker::new(Arc::clone(&catalog), dispatcher, ledger);
    let runner = Arc::new(TokioJobRunner::new(Arc::new(worker)));
    let reconciler = Reconciler::new(catalog, runner.clone());

    Ok(Service {
        reconciler,
        runner,
        store,
    })
}

fn check_config(path: &Path) -> Result<()> {
    let config = Config::load(path)?;
    let catalog = ZoneCatalog::from_config(&config).context("Invalid configuration")?;

    for zone in catalog.zones() {
        println!("zone {} ttl {} via {}", zone.name, zone.ttl, zone.server);
    }
    for zone in catalog.reverse_zones() {
        println!(
            "reverse zone {} ({}) ttl {} via {}",
            zone.name, zone.prefix, zone.ttl, zone.server
        );
    }
    info!(path = %path.display(), "Configuration is valid");
    Ok(())
}

async fn run(path: &Path) -> Result<()> {
    let config = Config::load(path)?;
    let service = build_service(&config).await?;

    if let Some(bind_address) = config.metrics.bind_address.clone() {
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(&bind_address).await {
                error!("Metrics server failed: {e:#}");
            }
        });
    }

    info!("Reading binding events from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read event stream")? {
                    Some(line) => handle_line(&service.reconciler, &line),
                    None => {
                        info!("Event stream closed");
                        break;
                    }
                }
            }
            () = &mut shutdown => {
                info!("Received shutdown signal, finishing queued jobs");
                break;
            }
        }
    }

    service.runner.wait_idle().await;
    info!("All jobs finished");
    Ok(())
}

fn handle_line(reconciler: &Reconciler, line: &str) {
    match parse_event(line) {
        Ok(Some(event)) => {
            let handles = reconciler.handle(&event);
            debug!(event = event.kind(), jobs = handles.len(), "Event handled");
        }
        Ok(None) => {}
        Err(e) => error!("Skipping malformed event: {e:#}"),
    }
}

/// Parse one line of the event stream. Blank lines are ignored.
fn parse_event(line: &str) -> Result<Option<BindingEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let event = serde_json::from_str(line).context("Invalid binding event")?;
    Ok(Some(event))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn serve_metrics(bind_address: &str) -> Result<()> {
    let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind metrics server to {bind_address}"))?;
    info!("Serving metrics on http://{bind_address}{METRICS_SERVER_PATH}");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            text,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; charset=utf-8")],
                format!("# Failed to encode metrics: {e}\n"),
            )
        }
    }
}

async fn recreate(path: &Path, binding: &str) -> Result<()> {
    let binding: Binding = serde_json::from_str(binding).context("Invalid binding JSON")?;
    let config = Config::load(path)?;
    let service = build_service(&config).await?;

    let names = service.reconciler.recreate_binding(&binding);
    if names.is_empty() {
        println!("Binding {} has no DNS names", binding.id);
        return Ok(());
    }

    service.runner.wait_idle().await;
    print_rows(&service.store).await
}

async fn status(path: &Path) -> Result<()> {
    let config = Config::load(path)?;
    let store = open_store(&config).await?;
    print_rows(&store).await
}

async fn print_rows(store: &Arc<dyn StatusStore>) -> Result<()> {
    let rows = store.list().await.context("Failed to read status ledger")?;
    for row in rows {
        println!("{}", format_row(&row));
    }
    Ok(())
}

/// One ledger row as a single human-readable line.
fn format_row(row: &DnsStatus) -> String {
    let mut parts = vec![format!("{} updated {}", row.key, row.last_update.to_rfc3339())];
    for (label, direction) in [("forward", Direction::Forward), ("reverse", Direction::Reverse)] {
        if let Some(action) = row.action(direction) {
            let outcome = row
                .rcode(direction)
                .map_or_else(|| "pending".to_string(), ResultCode::description);
            parts.push(format!("{label} {action}: {outcome}"));
        }
    }
    parts.join(", ")
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
