//! ratekeeperd — the ratekeeper daemon.
//!
//! Assembles the sampling controller with its collaborators:
//! - Index size source (`_cat/indices`)
//! - Percent document store (remote `_update`, or embedded redb)
//! - Gauge registry + `/metrics` endpoint
//! - CSV audit log
//!
//! # Usage
//!
//! ```text
//! ratekeeperd run --config /etc/ratekeeper/ratekeeper.toml
//! ratekeeperd run --config ratekeeper.toml --standalone --data-dir /var/lib/ratekeeper
//! ratekeeperd check --config ratekeeper.toml
//! ```

mod metrics_http;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ratekeeper_control::{Collaborators, PercentageStore, Service};
use ratekeeper_core::ControllerConfig;
use ratekeeper_metrics::{CsvAuditLog, GaugeRegistry};
use ratekeeper_probe::{DocumentStore, IndexSizeSource};
use ratekeeper_state::StateStore;

const DEFAULT_LOG_FILTER: &str = "info,ratekeeper=debug";

#[derive(Parser)]
#[command(name = "ratekeeperd", about = "Adaptive sampling rate controller")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control loop until interrupted.
    Run {
        /// Path to the TOML configuration.
        #[arg(long)]
        config: PathBuf,

        /// Keep the percent document in the embedded store instead of the
        /// remote one.
        #[arg(long)]
        standalone: bool,

        /// Data directory for the embedded store.
        #[arg(long, default_value = "/var/lib/ratekeeper")]
        data_dir: PathBuf,

        /// Emit logs as JSON lines.
        #[arg(long)]
        log_json: bool,
    },

    /// Validate a configuration and print the derived constants.
    Check {
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            standalone,
            data_dir,
            log_json,
        } => {
            init_tracing(log_json);
            run(&config, standalone, &data_dir).await
        }
        Command::Check { config } => check(&config),
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: &Path) -> anyhow::Result<ControllerConfig> {
    ControllerConfig::from_file(path)
        .with_context(|| format!("invalid configuration {}", path.display()))
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    println!("configuration {} is valid", path.display());
    println!(
        "  target bytes/sec:     {:.0}",
        config.target_rate_bytes_per_sec()
    );
    println!(
        "  target bytes/window:  {:.0}",
        config.target_bytes_per_window()
    );
    println!("  window:               {:?}", config.window());
    println!("  request timeout:      {:?}", config.request_timeout());
    println!("  minimum fraction:     {}", config.minimum_fraction());
    println!("  initial fraction:     {}", config.initial_fraction());
    println!("  pid constants:        {}", config.pid_constants);
    match &config.connections.store.endpoint {
        Some(endpoint) => println!("  percent store:        {endpoint}"),
        None => println!("  percent store:        embedded"),
    }
    Ok(())
}

/// Collaborators for a run, plus the handles the daemon keeps for itself.
struct Wiring {
    collaborators: Collaborators,
    registry: GaugeRegistry,
    embedded: Option<StateStore>,
}

fn build_wiring(
    config: &ControllerConfig,
    standalone: bool,
    data_dir: &Path,
) -> anyhow::Result<Wiring> {
    let source = Arc::new(IndexSizeSource::from_config(config)?);

    let remote = if standalone {
        None
    } else {
        DocumentStore::from_config(config)?
    };
    let mut embedded = None;
    let store: Arc<dyn PercentageStore> = match remote {
        Some(remote) => {
            info!(index = remote.index(), "using remote percent store");
            Arc::new(remote)
        }
        None => {
            std::fs::create_dir_all(data_dir)
                .with_context(|| format!("creating data dir {}", data_dir.display()))?;
            let db_path = data_dir.join("ratekeeper.redb");
            let state = StateStore::open(&db_path)?;
            info!(path = ?db_path, "using embedded percent store");
            embedded = Some(state.clone());
            Arc::new(state)
        }
    };

    let registry = GaugeRegistry::new(config.cluster.clone());
    let mut collaborators =
        Collaborators::new(source, store).with_metrics(Arc::new(registry.clone()));

    if let Some(state) = &embedded {
        collaborators = collaborators.with_audit(Arc::new(state.clone()));
    }
    if let Some(audit) = &config.audit {
        let log = CsvAuditLog::create(&audit.path)
            .with_context(|| format!("opening audit log {}", audit.path.display()))?;
        info!(path = ?audit.path, "audit log enabled");
        collaborators = collaborators.with_audit(Arc::new(log));
    }

    Ok(Wiring {
        collaborators,
        registry,
        embedded,
    })
}

async fn run(config_path: &Path, standalone: bool, data_dir: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    info!(
        config = %config_path.display(),
        prefix = %config.connections.sample.daily_index_prefix,
        "ratekeeper daemon starting"
    );

    let wiring = build_wiring(&config, standalone, data_dir)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Bind before starting the loop so a bad address fails fast.
    let metrics_handle = match &config.metrics {
        Some(metrics) => {
            let listener = tokio::net::TcpListener::bind(&metrics.listen)
                .await
                .with_context(|| format!("binding metrics endpoint {}", metrics.listen))?;
            Some(tokio::spawn(metrics_http::serve(
                listener,
                wiring.registry.clone(),
                shutdown_rx,
            )))
        }
        None => None,
    };

    let service = Service::start(config, wiring.collaborators).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to install CTRL+C handler")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let state = Service::stop(service).await?;

    if let Some(handle) = metrics_handle {
        match handle.await {
            Ok(Err(e)) => warn!(error = %e, "metrics endpoint failed"),
            Err(e) => warn!(error = %e, "metrics endpoint task panicked"),
            Ok(Ok(())) => {}
        }
    }

    if let Some(store) = &wiring.embedded
        && !state.previous_target_id.is_empty()
    {
        let target = &state.previous_target_id;
        let recorded = store.list_history(target, usize::MAX)?.len();
        info!(%target, cycles = recorded, "cycle history retained");
    }

    info!(
        percent = state.current_fraction * 100.0,
        "ratekeeper daemon stopped"
    );
    Ok(())
}
