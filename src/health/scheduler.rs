//! Layered probe scheduler.
//!
//! # Responsibilities
//! - Keep one `ServiceMonitor` per displayed service, keyed by name
//! - Reconcile the monitored set against each fresh service list
//! - Fan verdict events out to subscribers
//! - Provide a snapshot of every service's combined health
//!
//! # Design Decisions
//! - Services are fully independent; the map is the only shared structure
//! - Removing a service awaits its monitor so nothing fires afterwards

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::ProbeConfig;
use crate::health::monitor::{MonitorContext, ServiceMonitor, VerdictEvent};
use crate::health::probe::ProbeClient;
use crate::health::verdict::{combined_issue, effective_target, HealthIssue, Verdict};
use crate::observability::metrics;
use crate::service::model::ManagedService;

const EVENT_CAPACITY: usize = 256;

/// Health of one service as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceHealth {
    pub name: String,
    pub proxy: Verdict,
    pub target: Verdict,
    pub issue: Option<HealthIssue>,
}

/// Owns the probe cycles of every monitored service.
pub struct ProbeScheduler {
    monitors: DashMap<String, ServiceMonitor>,
    ctx: MonitorContext,
}

impl ProbeScheduler {
    pub fn new(client: Arc<dyn ProbeClient>, config: &ProbeConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            monitors: DashMap::new(),
            ctx: MonitorContext {
                client,
                interval: config.interval(),
                scheme: config.page_scheme(),
                events,
            },
        }
    }

    /// Receive every settled probe and verdict change.
    pub fn subscribe(&self) -> broadcast::Receiver<VerdictEvent> {
        self.ctx.events.subscribe()
    }

    /// Start monitoring `service`, or hand it to the existing monitor.
    pub fn watch(&self, service: ManagedService) {
        if service.name.is_empty() {
            tracing::warn!("Ignoring service without a name");
            return;
        }
        match self.monitors.entry(service.name.clone()) {
            Entry::Occupied(entry) => entry.get().update(service),
            Entry::Vacant(entry) => {
                tracing::info!(service = %service.name, "Monitoring service");
                entry.insert(ServiceMonitor::start(service, self.ctx.clone()));
            }
        }
        metrics::record_monitored_services(self.monitors.len());
    }

    /// Stop monitoring `name`. Returns false if it was not monitored.
    pub async fn unwatch(&self, name: &str) -> bool {
        let Some((_, monitor)) = self.monitors.remove(name) else {
            return false;
        };
        monitor.stop().await;
        metrics::clear_service_health(name);
        tracing::info!(service = %name, "Stopped monitoring service");
        metrics::record_monitored_services(self.monitors.len());
        true
    }

    /// Make the monitored set match `services` exactly.
    pub async fn reconcile(&self, services: &[ManagedService]) {
        let wanted: HashSet<&str> = services.iter().map(|s| s.name.as_str()).collect();
        let stale: Vec<String> = self
            .monitors
            .iter()
            .filter(|entry| !wanted.contains(entry.key().as_str()))
            .map(|entry| entry.key().clone())
            .collect();

        for name in stale {
            self.unwatch(&name).await;
        }
        for service in services {
            self.watch(service.clone());
        }
    }

    pub fn health(&self, name: &str) -> Option<ServiceHealth> {
        self.monitors.get(name).map(|m| health_of(m.value()))
    }

    /// Combined health of every monitored service, sorted by name.
    pub fn snapshot(&self) -> Vec<ServiceHealth> {
        let mut all: Vec<ServiceHealth> = self.monitors.iter().map(|m| health_of(m.value())).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Stop every monitor.
    pub async fn stop_all(&self) {
        let names: Vec<String> = self.monitors.iter().map(|e| e.key().clone()).collect();
        for name in names {
            self.unwatch(&name).await;
        }
    }
}

fn health_of(monitor: &ServiceMonitor) -> ServiceHealth {
    let proxy = monitor.proxy_verdict();
    let target = effective_target(proxy, monitor.target_verdict());
    ServiceHealth {
        name: monitor.name().to_string(),
        proxy,
        target,
        issue: combined_issue(proxy, target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probe::{ProbeOutcome, ProbeRequest};
    use crate::health::verdict::Layer;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// Healthy for every URL except those listed, recording every request.
    #[derive(Default)]
    struct FakeProbe {
        unhealthy: Mutex<HashSet<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeProbe {
        fn fail(&self, url: &str) {
            self.unhealthy.lock().unwrap().insert(url.to_string());
        }

        fn calls_to(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
        }
    }

    #[async_trait]
    impl ProbeClient for FakeProbe {
        async fn probe(&self, request: &ProbeRequest, _cancel: &CancellationToken) -> ProbeOutcome {
            self.calls.lock().unwrap().push(request.url.clone());
            if self.unhealthy.lock().unwrap().contains(&request.url) {
                ProbeOutcome::Settled(Verdict::Unhealthy)
            } else {
                ProbeOutcome::Settled(Verdict::Healthy)
            }
        }
    }

    fn app(name: &str, host: &str, target: &str) -> ManagedService {
        let mut svc = ManagedService::named(name);
        svc.host = host.into();
        svc.target_url = target.into();
        svc.health_path = "/health".into();
        svc.running = true;
        svc
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn scheduler(client: Arc<FakeProbe>) -> ProbeScheduler {
        ProbeScheduler::new(client, &ProbeConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_issue_when_proxy_healthy() {
        let client = Arc::new(FakeProbe::default());
        client.fail("http://127.0.0.1:9000/health");
        let scheduler = scheduler(client.clone());

        scheduler.watch(app("app", "app.local", "http://127.0.0.1:9000"));
        settle().await;

        let health = scheduler.health("app").unwrap();
        assert_eq!(health.proxy, Verdict::Healthy);
        assert_eq!(health.target, Verdict::Unhealthy);
        assert_eq!(health.issue, Some(HealthIssue::Target));
        scheduler.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_proxy_issue_blocks_target_probe() {
        let client = Arc::new(FakeProbe::default());
        client.fail("http://app.local/health");
        let scheduler = scheduler(client.clone());

        scheduler.watch(app("app", "app.local", "http://127.0.0.1:9000"));
        settle().await;

        let health = scheduler.health("app").unwrap();
        assert_eq!(health.issue, Some(HealthIssue::Proxy));
        assert_eq!(health.target, Verdict::Unknown);
        assert_eq!(client.calls_to("http://127.0.0.1:9000/health"), 0);
        scheduler.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_addresses_stay_unknown() {
        let client = Arc::new(FakeProbe::default());
        let scheduler = scheduler(client.clone());

        scheduler.watch(app("no-host", "", "http://127.0.0.1:9000"));
        scheduler.watch(app("no-target", "b.local", ""));
        settle().await;
        tokio::time::sleep(Duration::from_secs(25)).await;
        settle().await;

        for health in scheduler.snapshot() {
            assert_eq!(health.proxy, Verdict::Unknown, "{}", health.name);
            assert_eq!(health.target, Verdict::Unknown, "{}", health.name);
        }
        assert!(client.calls.lock().unwrap().is_empty());
        scheduler.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_services_are_independent() {
        let client = Arc::new(FakeProbe::default());
        client.fail("http://a.local/health");
        let scheduler = scheduler(client.clone());

        scheduler.watch(app("a", "a.local", "http://10.0.0.1:80"));
        scheduler.watch(app("b", "b.local", "http://10.0.0.2:80"));
        settle().await;

        let snapshot = scheduler.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].issue, Some(HealthIssue::Proxy));
        assert_eq!(snapshot[1].issue, None);
        assert_eq!(snapshot[1].target, Verdict::Healthy);
        scheduler.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_removes_and_silences() {
        let client = Arc::new(FakeProbe::default());
        let scheduler = scheduler(client.clone());
        let mut events = scheduler.subscribe();

        let a = app("a", "a.local", "http://10.0.0.1:80");
        let b = app("b", "b.local", "http://10.0.0.2:80");
        scheduler.reconcile(&[a.clone(), b]).await;
        settle().await;
        assert_eq!(scheduler.len(), 2);

        scheduler.reconcile(&[a]).await;
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.health("b").is_none());

        while events.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|e| e.service == "a"));
        assert_eq!(client.calls_to("http://b.local/health"), 1);
        scheduler.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_cover_both_layers() {
        let client = Arc::new(FakeProbe::default());
        let scheduler = scheduler(client.clone());
        let mut events = scheduler.subscribe();

        scheduler.watch(app("app", "app.local", "http://127.0.0.1:9000"));
        settle().await;

        let first = events.try_recv().unwrap();
        assert_eq!((first.layer, first.verdict), (Layer::Proxy, Verdict::Healthy));
        let second = events.try_recv().unwrap();
        assert_eq!((second.layer, second.verdict), (Layer::Target, Verdict::Healthy));
        scheduler.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unwatch_unknown_service() {
        let scheduler = scheduler(Arc::new(FakeProbe::default()));
        assert!(!scheduler.unwatch("ghost").await);
        assert!(scheduler.is_empty());
    }
}
