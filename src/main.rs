//! Conslee dashboard daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌───────────────────────────────────────────────────┐
//!                 │                 DASHBOARD DAEMON                   │
//!                 │                                                    │
//!   Management    │  ┌───────────┐   watch    ┌──────────────────┐     │
//!   API  ◀────────┼──│ refresher │──────────▶│ reconcile loop   │     │
//!   /api/services │  │ + loading │  services  └────────┬─────────┘     │
//!                 │  │   gate    │                     ▼               │
//!                 │  └───────────┘            ┌──────────────────┐     │
//!   Management    │                           │  ProbeScheduler  │     │
//!   API  ◀────────┼───────────────────────────│ proxy → target   │     │
//!   /api/probes   │                           └────────┬─────────┘     │
//!                 │                                    │ snapshot      │
//!                 │                                    ▼               │
//!   /api/system ◀─┼── system refresher → listen address validator  │
//!   Status  ◀─────┼───────────────────────────  status API (axum)     │
//!   clients       │                                                    │
//!                 │  config · observability · lifecycle (signals)      │
//!                 └───────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use conslee_dashboard::api::ApiClient;
use conslee_dashboard::config::{load_config, DashboardConfig, Preferences};
use conslee_dashboard::coordination::DebouncedValidator;
use conslee_dashboard::health::{ProbeScheduler, VerdictEvent};
use conslee_dashboard::lifecycle::{wait_for_signal, Shutdown};
use conslee_dashboard::observability::{logging, metrics};
use conslee_dashboard::service::{follow_listen_addr, ServiceRefresher, SystemRefresher};
use conslee_dashboard::status::{self, StatusState};

#[derive(Parser)]
#[command(name = "conslee-dashboard")]
#[command(about = "Live health dashboard for Conslee managed services", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the management API base URL.
    #[arg(long)]
    api_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => DashboardConfig::default(),
    };
    if let Some(url) = args.api_url {
        config.api.base_url = url;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "conslee-dashboard starting");
    tracing::info!(
        api = %config.api.base_url,
        probe_interval_secs = config.probes.interval_secs,
        refresh_interval_secs = config.refresh.interval_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let preferences = Arc::new(load_preferences(config.preferences_path.as_deref()));
    tracing::info!(theme = %preferences.theme, language = %preferences.language, "Preferences loaded");

    let api = Arc::new(ApiClient::new(&config.api)?);
    let scheduler = Arc::new(ProbeScheduler::new(api.clone(), &config.probes));
    let refresher = Arc::new(ServiceRefresher::new(api.clone(), &config.refresh, &config.loading));
    let system = Arc::new(SystemRefresher::new(api.clone(), &config.refresh));
    let listen_addr = Arc::new(DebouncedValidator::new(
        api.clone(),
        String::new(),
        config.validator.debounce(),
    ));
    let shutdown = Shutdown::new();

    let mut tasks = Vec::new();

    tasks.push(tokio::spawn({
        let refresher = refresher.clone();
        let rx = shutdown.subscribe();
        async move { refresher.run(rx).await }
    }));

    tasks.push(tokio::spawn({
        let system = system.clone();
        let rx = shutdown.subscribe();
        async move { system.run(rx).await }
    }));
    tasks.push(tokio::spawn(follow_listen_addr(
        system.subscribe(),
        listen_addr.clone(),
        shutdown.subscribe(),
    )));

    if config.probes.enabled {
        tasks.push(tokio::spawn(reconcile_loop(
            scheduler.clone(),
            refresher.clone(),
            shutdown.subscribe(),
        )));
        tasks.push(tokio::spawn(log_verdicts(scheduler.subscribe(), shutdown.subscribe())));
    } else {
        tracing::warn!("Probing disabled; services will show unknown health");
    }

    if config.status.enabled {
        let listener = TcpListener::bind(&config.status.bind_address).await?;
        let state = StatusState {
            scheduler: scheduler.clone(),
            refresher: refresher.clone(),
            system,
            listen_addr,
            preferences,
        };
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = status::serve(listener, state, rx).await {
                tracing::error!(error = %e, "Status API failed");
            }
        }));
    }

    wait_for_signal().await;
    shutdown.trigger();

    for task in tasks {
        let _ = task.await;
    }
    scheduler.stop_all().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn load_preferences(path: Option<&str>) -> Preferences {
    let Some(path) = path else {
        return Preferences::default();
    };
    match Preferences::load(Path::new(path)) {
        Ok(prefs) => prefs,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Failed to load preferences, using defaults");
            Preferences::default()
        }
    }
}

/// Keep the monitored set in step with the latest service list.
async fn reconcile_loop(
    scheduler: Arc<ProbeScheduler>,
    refresher: Arc<ServiceRefresher>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut services = refresher.subscribe();
    loop {
        let current = services.borrow_and_update().clone();
        scheduler.reconcile(&current).await;

        tokio::select! {
            changed = services.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Reconcile loop stopped");
}

async fn log_verdicts(mut events: broadcast::Receiver<VerdictEvent>, mut shutdown: broadcast::Receiver<()>) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => tracing::debug!(
                    service = %event.service,
                    layer = %event.layer,
                    verdict = %event.verdict,
                    "Verdict"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Verdict log lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}
