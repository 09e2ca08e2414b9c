//! Periodic refresh of the management daemon's own settings.
//!
//! # Responsibilities
//! - Fetch `/api/system` on the refresh interval
//! - Keep the last good settings when a fetch fails
//! - Keep the listen address validator's baseline on the committed value

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::time::{self, MissedTickBehavior};

use crate::api::{ApiClient, ApiError};
use crate::config::RefreshConfig;
use crate::coordination::debounce::DebouncedValidator;
use crate::observability::metrics;
use crate::service::model::SystemStatus;

/// Where daemon settings come from.
#[async_trait]
pub trait SystemSource: Send + Sync + 'static {
    async fn fetch_system(&self) -> Result<SystemStatus, ApiError>;
}

#[async_trait]
impl SystemSource for ApiClient {
    async fn fetch_system(&self) -> Result<SystemStatus, ApiError> {
        ApiClient::fetch_system(self).await
    }
}

pub struct SystemRefresher {
    source: Arc<dyn SystemSource>,
    /// `None` until the first successful fetch.
    system: watch::Sender<Option<SystemStatus>>,
    interval: Duration,
}

impl SystemRefresher {
    pub fn new(source: Arc<dyn SystemSource>, refresh: &RefreshConfig) -> Self {
        let (system, _) = watch::channel(None);
        Self {
            source,
            system,
            interval: refresh.interval(),
        }
    }

    pub fn current(&self) -> Option<SystemStatus> {
        self.system.borrow().clone()
    }

    /// Notified whenever the settings change.
    pub fn subscribe(&self) -> watch::Receiver<Option<SystemStatus>> {
        self.system.subscribe()
    }

    /// Fetch once. On failure the previous settings stay published.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        match self.source.fetch_system().await {
            Ok(status) => {
                let changed = self.system.send_if_modified(|current| {
                    if current.as_ref() != Some(&status) {
                        *current = Some(status);
                        true
                    } else {
                        false
                    }
                });
                if changed {
                    tracing::debug!("System settings updated");
                }
                Ok(())
            }
            Err(e) => {
                metrics::record_refresh_failure("system");
                tracing::warn!(error = %e, "Failed to load system settings, keeping last known values");
                Err(e)
            }
        }
    }

    /// Refresh immediately, then every interval until shutdown.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.refresh().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("System refresher received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

/// Move the validator's baseline to each newly committed listen address.
pub async fn follow_listen_addr(
    mut system: watch::Receiver<Option<SystemStatus>>,
    validator: Arc<DebouncedValidator>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let listen_addr = system
            .borrow_and_update()
            .as_ref()
            .map(|s| s.listen_addr.clone());
        if let Some(addr) = listen_addr {
            if addr != validator.baseline() {
                tracing::info!(listen_addr = %addr, "Listen address baseline updated");
                validator.set_baseline(addr);
            }
        }

        tokio::select! {
            changed = system.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}
