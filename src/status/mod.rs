//! Local status API publishing dashboard state.
//!
//! # Routes
//! - `GET /status`          daemon status, loading flag, preferences
//! - `GET /status/services` every service with its layered health
//! - `GET /status/system`   daemon settings and the listen address field state
//! - `PUT /status/listen-addr`         debounced edit of the listen address
//! - `GET /status/listen-addr/check`   immediate check (`?listenAddr=`)

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::Preferences;
use crate::coordination::DebouncedValidator;
use crate::health::ProbeScheduler;
use crate::service::{ServiceRefresher, SystemRefresher};
use self::handlers::{check_listen_addr, edit_listen_addr, get_services, get_status, get_system};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct StatusState {
    pub scheduler: Arc<ProbeScheduler>,
    pub refresher: Arc<ServiceRefresher>,
    pub system: Arc<SystemRefresher>,
    /// Listen address field; its baseline follows the committed setting.
    pub listen_addr: Arc<DebouncedValidator>,
    pub preferences: Arc<Preferences>,
}

pub fn status_router(state: StatusState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/status/services", get(get_services))
        .route("/status/system", get(get_system))
        .route("/status/listen-addr", put(edit_listen_addr))
        .route("/status/listen-addr/check", get(check_listen_addr))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the status API until a shutdown signal arrives.
pub async fn serve(
    listener: TcpListener,
    state: StatusState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Status API listening");

    axum::serve(listener, status_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Status API stopped");
    Ok(())
}
