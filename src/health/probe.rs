//! Probe requests and the client seam that dispatches them.
//!
//! # Responsibilities
//! - Capture the fields of a service a layer depends on (`LayerInputs`)
//! - Decide whether a layer may be probed and build its request
//! - Define the `ProbeClient` seam (HTTP in production, fakes in tests)
//!
//! # Design Decisions
//! - Preconditions unmet is not an error: no request is built at all
//! - Only target-layer probes may wake a sleeping service
//! - Only proxy-layer probes ask for the edge signature check

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::health::verdict::{Layer, Verdict};
use crate::service::model::ManagedService;

/// One reachability check, as sent to the probing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeRequest {
    pub url: String,
    /// Host the response is expected to come from; detects misrouting.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub expect_host: String,
    /// Whether the probe may start a sleeping service.
    pub allow_wake: bool,
    /// Ask the endpoint to verify the edge route's trust marker.
    #[serde(skip_serializing_if = "is_false")]
    pub require_signature: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Result of dispatching a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Settled(Verdict),
    /// The request was abandoned because its inputs went stale.
    Cancelled,
}

/// Issues a single probe. Implementations never fail: transport problems,
/// non-success responses and timeouts all settle as `Unhealthy`.
#[async_trait]
pub trait ProbeClient: Send + Sync + 'static {
    async fn probe(&self, request: &ProbeRequest, cancel: &CancellationToken) -> ProbeOutcome;
}

/// The fields of a service one layer's cycle depends on.
///
/// Two snapshots compare equal exactly when the layer has no reason to tear
/// down its current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInputs {
    pub layer: Layer,
    pub enabled: bool,
    /// Always false for the proxy layer, which ignores it.
    pub running: bool,
    pub host: String,
    pub target_url: String,
    pub health_path: String,
    /// Latest proxy verdict; always `Unknown` for the proxy layer.
    pub dependency: Verdict,
}

impl LayerInputs {
    pub fn capture(layer: Layer, service: &ManagedService, dependency: Verdict) -> Self {
        let is_target = layer == Layer::Target;
        Self {
            layer,
            enabled: service.enabled,
            running: is_target && service.running,
            host: service.host.trim().to_string(),
            target_url: service.target_url.trim().to_string(),
            health_path: service.health_path.trim().to_string(),
            dependency: if is_target { dependency } else { Verdict::Unknown },
        }
    }
}

/// `/` when empty, otherwise the path with a guaranteed leading slash.
pub fn normalize_health_path(raw: &str) -> String {
    let path = raw.trim();
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Build the probe for a layer, or `None` when its preconditions are unmet.
pub fn plan_probe(inputs: &LayerInputs, scheme: &str) -> Option<ProbeRequest> {
    match inputs.layer {
        Layer::Proxy => proxy_probe(inputs, scheme),
        Layer::Target => target_probe(inputs),
    }
}

fn proxy_probe(inputs: &LayerInputs, scheme: &str) -> Option<ProbeRequest> {
    if !inputs.enabled || inputs.host.is_empty() || inputs.target_url.is_empty() {
        return None;
    }
    Some(ProbeRequest {
        url: format!(
            "{}://{}{}",
            scheme,
            inputs.host,
            normalize_health_path(&inputs.health_path)
        ),
        expect_host: inputs.host.to_lowercase(),
        allow_wake: false,
        require_signature: true,
    })
}

fn target_probe(inputs: &LayerInputs) -> Option<ProbeRequest> {
    if !inputs.enabled
        || !inputs.running
        || !inputs.dependency.is_healthy()
        || inputs.host.is_empty()
        || inputs.target_url.is_empty()
    {
        return None;
    }

    let url = resolve_target_url(&inputs.target_url, &inputs.health_path);
    let expect_host = Url::parse(&url)
        .ok()
        .and_then(|u| authority(&u))
        .unwrap_or_default();

    Some(ProbeRequest {
        url,
        expect_host,
        allow_wake: true,
        require_signature: false,
    })
}

/// Resolve the health path against the target base URL. An unparsable base
/// is passed through unchanged.
fn resolve_target_url(base: &str, health_path: &str) -> String {
    let Ok(base_url) = Url::parse(base) else {
        return base.to_string();
    };
    if health_path.is_empty() {
        return base_url.to_string();
    }
    match base_url.join(&normalize_health_path(health_path)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => base.to_string(),
    }
}

/// Lowercased `host[:port]`, omitting the scheme's default port.
fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    Some(authority.to_lowercase())
}
