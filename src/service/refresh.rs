//! Periodic service list refresh.
//!
//! # Responsibilities
//! - Fetch the service list on a fixed interval
//! - Drive the loading indicator through the minimum-duration gate
//! - Keep the last good list when a fetch fails
//! - Publish each new list on a watch channel

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::time::{self, MissedTickBehavior};

use crate::api::{ApiClient, ApiError};
use crate::config::{LoadingConfig, RefreshConfig};
use crate::coordination::gate::MinDurationGate;
use crate::observability::metrics;
use crate::service::model::ManagedService;

/// Where service lists come from.
#[async_trait]
pub trait ServiceSource: Send + Sync + 'static {
    async fn fetch_services(&self) -> Result<Vec<ManagedService>, ApiError>;
}

#[async_trait]
impl ServiceSource for ApiClient {
    async fn fetch_services(&self) -> Result<Vec<ManagedService>, ApiError> {
        ApiClient::fetch_services(self).await
    }
}

pub struct ServiceRefresher {
    source: Arc<dyn ServiceSource>,
    gate: MinDurationGate,
    services: watch::Sender<Vec<ManagedService>>,
    interval: Duration,
}

impl ServiceRefresher {
    pub fn new(source: Arc<dyn ServiceSource>, refresh: &RefreshConfig, loading: &LoadingConfig) -> Self {
        let (services, _) = watch::channel(Vec::new());
        Self {
            source,
            gate: MinDurationGate::new(loading.min_visible()),
            services,
            interval: refresh.interval(),
        }
    }

    /// Latest known service list.
    pub fn services(&self) -> Vec<ManagedService> {
        self.services.borrow().clone()
    }

    /// Notified whenever the list changes.
    pub fn subscribe(&self) -> watch::Receiver<Vec<ManagedService>> {
        self.services.subscribe()
    }

    /// The loading indicator.
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.gate.subscribe()
    }

    /// Fetch once. On failure the previous list stays published.
    pub async fn refresh(&self) -> Result<usize, ApiError> {
        let _busy = self.gate.begin();
        match self.source.fetch_services().await {
            Ok(list) => {
                let count = list.len();
                let changed = self.services.send_if_modified(|current| {
                    if *current != list {
                        *current = list;
                        true
                    } else {
                        false
                    }
                });
                if changed {
                    tracing::debug!(count, "Service list updated");
                }
                Ok(count)
            }
            Err(e) => {
                metrics::record_refresh_failure("services");
                tracing::warn!(error = %e, "Failed to load services, keeping last known list");
                Err(e)
            }
        }
    }

    /// Refresh immediately, then every interval until shutdown.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Service refresher starting");
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.refresh().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Service refresher received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
