//! Refresher → scheduler → status API, against a mock management API.

mod common;

use std::sync::Arc;
use std::time::Duration;

use conslee_dashboard::api::ApiClient;
use conslee_dashboard::config::{LoadingConfig, Preferences, ProbeConfig, RefreshConfig};
use conslee_dashboard::coordination::DebouncedValidator;
use conslee_dashboard::health::{HealthIssue, ProbeScheduler, ServiceHealth, Verdict};
use conslee_dashboard::lifecycle::Shutdown;
use conslee_dashboard::service::{ServiceRefresher, SystemRefresher};
use conslee_dashboard::status::{self, StatusState};
use tokio::net::TcpListener;

use common::{start_mock_api, Recorded};

const SERVICES: &str = r#"[
    {"name": "api", "host": "api.local", "targetUrl": "http://10.0.0.1:8000", "healthPath": "/health", "running": true},
    {"name": "blog", "host": "blog.local", "targetUrl": "http://10.0.0.2:8000", "running": true},
    {"name": "draft", "host": "", "targetUrl": "http://10.0.0.3:8000", "running": true}
]"#;

/// The proxy route of `blog` is broken; the `api` backend is down.
fn respond(request: &Recorded) -> (u16, String) {
    if request.target == "/api/services" {
        return (200, SERVICES.into());
    }
    if request.target == "/api/system" {
        return (200, r#"{"listenAddr":":8080","idleReaperInterval":"1m"}"#.into());
    }
    if request.target.starts_with("/api/system/check-port") {
        return (200, r#"{"available":true}"#.into());
    }
    let url = request.json()["url"].as_str().unwrap_or_default().to_string();
    let healthy = !matches!(url.as_str(), "http://blog.local/" | "http://10.0.0.1:8000/health");
    let status = if healthy { "healthy" } else { "unhealthy" };
    (200, format!(r#"{{"status":"{}"}}"#, status))
}

async fn wait_for<F>(scheduler: &ProbeScheduler, mut done: F) -> Vec<ServiceHealth>
where
    F: FnMut(&[ServiceHealth]) -> bool,
{
    for _ in 0..100 {
        let snapshot = scheduler.snapshot();
        if done(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("scheduler did not settle: {:?}", scheduler.snapshot());
}

#[tokio::test]
async fn test_layered_health_end_to_end() {
    let (addr, journal) = start_mock_api(respond).await;
    let api = Arc::new(ApiClient::with_timeout(&format!("http://{}", addr), Duration::from_secs(2)).unwrap());

    let scheduler = Arc::new(ProbeScheduler::new(api.clone(), &ProbeConfig::default()));
    let refresher = Arc::new(ServiceRefresher::new(
        api.clone(),
        &RefreshConfig::default(),
        &LoadingConfig::default(),
    ));

    assert_eq!(refresher.refresh().await.unwrap(), 3);
    scheduler.reconcile(&refresher.services()).await;

    let snapshot = wait_for(&scheduler, |s| {
        s.iter()
            .filter(|h| h.name != "draft")
            .all(|h| h.proxy != Verdict::Unknown && (h.proxy != Verdict::Healthy || h.target != Verdict::Unknown))
    })
    .await;

    let by_name = |name: &str| snapshot.iter().find(|h| h.name == name).cloned().unwrap();
    assert_eq!(by_name("api").issue, Some(HealthIssue::Target));
    assert_eq!(by_name("blog").issue, Some(HealthIssue::Proxy));
    assert_eq!(by_name("blog").target, Verdict::Unknown);
    assert_eq!(by_name("draft").proxy, Verdict::Unknown);
    assert_eq!(by_name("draft").issue, None);

    let probed: Vec<String> = journal
        .all()
        .iter()
        .filter(|r| r.target == "/api/probes")
        .map(|r| r.json()["url"].as_str().unwrap_or_default().to_string())
        .collect();
    assert!(!probed.contains(&"http://10.0.0.2:8000/".to_string()));
    assert!(!probed.iter().any(|u| u.contains("10.0.0.3")));

    scheduler.stop_all().await;
    assert!(scheduler.is_empty());
}

#[tokio::test]
async fn test_status_api_serves_snapshot() {
    let (addr, _) = start_mock_api(respond).await;
    let api = Arc::new(ApiClient::with_timeout(&format!("http://{}", addr), Duration::from_secs(2)).unwrap());
    let scheduler = Arc::new(ProbeScheduler::new(api.clone(), &ProbeConfig::default()));
    let refresher = Arc::new(ServiceRefresher::new(
        api.clone(),
        &RefreshConfig::default(),
        &LoadingConfig::default(),
    ));
    refresher.refresh().await.unwrap();
    scheduler.reconcile(&refresher.services()).await;
    wait_for(&scheduler, |s| s.iter().any(|h| h.name == "api" && h.target != Verdict::Unknown)).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let status_addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let system = Arc::new(SystemRefresher::new(api.clone(), &RefreshConfig::default()));
    system.refresh().await.unwrap();
    let state = StatusState {
        scheduler: scheduler.clone(),
        refresher,
        system,
        listen_addr: Arc::new(DebouncedValidator::new(api.clone(), ":8080", Duration::from_millis(500))),
        preferences: Arc::new(Preferences::default()),
    };
    let server = tokio::spawn(status::serve(listener, state, shutdown.subscribe()));

    let http = reqwest::Client::new();
    let status: serde_json::Value = http
        .get(format!("http://{}/status", status_addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "operational");
    assert_eq!(status["monitored_services"], 3);

    let services: serde_json::Value = http
        .get(format!("http://{}/status/services", status_addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let api_row = services
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["name"] == "api")
        .unwrap();
    assert_eq!(api_row["proxy"], "healthy");
    assert_eq!(api_row["target"], "unhealthy");
    assert_eq!(api_row["issue"], "target");

    let system: serde_json::Value = http
        .get(format!("http://{}/status/system", status_addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(system["system"]["listenAddr"], ":8080");
    assert_eq!(system["listenAddr"]["status"], "idle");

    let check: serde_json::Value = http
        .get(format!("http://{}/status/listen-addr/check?listenAddr=:9191", status_addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(check["available"], true);

    shutdown.trigger();
    server.await.unwrap().unwrap();
    scheduler.stop_all().await;
}
