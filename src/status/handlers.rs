use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::coordination::{CheckVerdict, ValidationState};
use crate::health::{HealthIssue, Verdict};
use crate::service::SystemStatus;
use crate::status::StatusState;

#[derive(Debug, Serialize)]
pub struct DaemonStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub monitored_services: usize,
    pub loading: bool,
    pub theme: String,
    pub language: String,
}

/// One row of the dashboard.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    pub name: String,
    pub host: String,
    pub enabled: bool,
    pub running: bool,
    pub proxy: Verdict,
    pub target: Verdict,
    pub issue: Option<HealthIssue>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemView {
    /// `None` until the settings were fetched once.
    pub system: Option<SystemStatus>,
    pub listen_addr: ValidationState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenAddrInput {
    pub listen_addr: String,
}

pub async fn get_status(State(state): State<StatusState>) -> Json<DaemonStatus> {
    Json(DaemonStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        monitored_services: state.scheduler.len(),
        loading: *state.refresher.loading().borrow(),
        theme: state.preferences.theme.to_string(),
        language: state.preferences.language.clone(),
    })
}

pub async fn get_services(State(state): State<StatusState>) -> Json<Vec<ServiceView>> {
    let views = state
        .refresher
        .services()
        .into_iter()
        .map(|service| {
            let health = state.scheduler.health(&service.name);
            ServiceView {
                proxy: health.as_ref().map(|h| h.proxy).unwrap_or_default(),
                target: health.as_ref().map(|h| h.target).unwrap_or_default(),
                issue: health.and_then(|h| h.issue),
                name: service.name,
                host: service.host,
                enabled: service.enabled,
                running: service.running,
            }
        })
        .collect();
    Json(views)
}

pub async fn get_system(State(state): State<StatusState>) -> Json<SystemView> {
    Json(SystemView {
        system: state.system.current(),
        listen_addr: state.listen_addr.state(),
    })
}

/// Record an edit; the check runs once the input settles.
pub async fn edit_listen_addr(
    State(state): State<StatusState>,
    Json(input): Json<ListenAddrInput>,
) -> Json<ValidationState> {
    state.listen_addr.on_input_changed(&input.listen_addr);
    Json(state.listen_addr.state())
}

pub async fn check_listen_addr(
    State(state): State<StatusState>,
    Query(input): Query<ListenAddrInput>,
) -> Json<CheckVerdict> {
    Json(state.listen_addr.validate_now(&input.listen_addr).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::config::{LoadingConfig, Preferences, ProbeConfig, RefreshConfig};
    use crate::coordination::{AvailabilityCheck, CheckResponse, DebouncedValidator, ValidationStatus};
    use crate::health::{ProbeClient, ProbeOutcome, ProbeRequest, ProbeScheduler};
    use crate::service::{ManagedService, ServiceRefresher, ServiceSource, SystemRefresher, SystemSource};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct AlwaysHealthy;

    #[async_trait]
    impl ProbeClient for AlwaysHealthy {
        async fn probe(&self, _request: &ProbeRequest, _cancel: &CancellationToken) -> ProbeOutcome {
            ProbeOutcome::Settled(Verdict::Healthy)
        }
    }

    struct OneService;

    #[async_trait]
    impl ServiceSource for OneService {
        async fn fetch_services(&self) -> Result<Vec<ManagedService>, ApiError> {
            let mut svc = ManagedService::named("web");
            svc.host = "web.local".into();
            svc.target_url = "http://127.0.0.1:3000".into();
            svc.running = true;
            Ok(vec![svc])
        }
    }

    struct FixedSystem;

    #[async_trait]
    impl SystemSource for FixedSystem {
        async fn fetch_system(&self) -> Result<SystemStatus, ApiError> {
            Ok(SystemStatus {
                listen_addr: ":8080".into(),
                idle_reaper_interval: "1m".into(),
            })
        }
    }

    /// Everything except `:9000` is free.
    struct PortCheck;

    #[async_trait]
    impl AvailabilityCheck for PortCheck {
        async fn check(&self, value: &str) -> Result<CheckResponse, ApiError> {
            Ok(CheckResponse {
                available: value != ":9000",
                error: (value == ":9000").then(|| "in use".to_string()),
            })
        }
    }

    async fn state(scheduler: Arc<ProbeScheduler>) -> StatusState {
        let refresher = Arc::new(ServiceRefresher::new(
            Arc::new(OneService),
            &RefreshConfig::default(),
            &LoadingConfig::default(),
        ));
        refresher.refresh().await.unwrap();
        let system = Arc::new(SystemRefresher::new(Arc::new(FixedSystem), &RefreshConfig::default()));
        system.refresh().await.unwrap();
        StatusState {
            scheduler,
            refresher,
            system,
            listen_addr: Arc::new(DebouncedValidator::new(
                Arc::new(PortCheck),
                ":8080",
                Duration::from_millis(500),
            )),
            preferences: Arc::new(Preferences::default()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_services_view_merges_health() {
        let scheduler = Arc::new(ProbeScheduler::new(Arc::new(AlwaysHealthy), &ProbeConfig::default()));
        let state = state(scheduler.clone()).await;
        scheduler.reconcile(&state.refresher.services()).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let Json(views) = get_services(State(state.clone())).await;
        assert_eq!(
            views,
            vec![ServiceView {
                name: "web".into(),
                host: "web.local".into(),
                enabled: true,
                running: true,
                proxy: Verdict::Healthy,
                target: Verdict::Healthy,
                issue: None,
            }]
        );

        let Json(status) = get_status(State(state)).await;
        assert_eq!(status.monitored_services, 1);
        assert_eq!(status.language, "en");
        scheduler.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_listen_addr_edit_and_check() {
        let scheduler = Arc::new(ProbeScheduler::new(Arc::new(AlwaysHealthy), &ProbeConfig::default()));
        let state = state(scheduler).await;

        let Json(view) = get_system(State(state.clone())).await;
        assert_eq!(view.system.unwrap().listen_addr, ":8080");
        assert_eq!(view.listen_addr.status, ValidationStatus::Idle);

        let input = ListenAddrInput {
            listen_addr: ":9000".into(),
        };
        let Json(pending) = edit_listen_addr(State(state.clone()), Json(input)).await;
        assert_eq!(pending.status, ValidationStatus::Idle);

        tokio::time::sleep(Duration::from_millis(600)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        let Json(view) = get_system(State(state.clone())).await;
        assert_eq!(view.listen_addr.status, ValidationStatus::Unavailable);
        assert_eq!(view.listen_addr.message.as_deref(), Some("in use"));

        let query = ListenAddrInput {
            listen_addr: ":9100".into(),
        };
        let Json(verdict) = check_listen_addr(State(state.clone()), Query(query)).await;
        assert!(verdict.available);
        assert_eq!(state.listen_addr.state().status, ValidationStatus::Available);
    }
}
