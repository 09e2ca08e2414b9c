//! HTTP client for the management API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ApiConfig;
use crate::coordination::debounce::{AvailabilityCheck, CheckResponse};
use crate::health::probe::{ProbeClient, ProbeOutcome, ProbeRequest};
use crate::health::verdict::Verdict;
use crate::service::model::{normalize_services, ManagedService, RawService, SystemStatus};

/// Header carrying a per-call correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Errors from the management API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API URL '{0}'")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned status {0}")]
    Status(u16),

    #[error("could not decode response: {0}")]
    Decode(String),
}

/// Response body of `POST /api/probes`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProbeResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResponse {
    pub fn verdict(&self) -> Verdict {
        if self.status == "healthy" {
            Verdict::Healthy
        } else {
            Verdict::Unhealthy
        }
    }
}

/// Response body of `GET /api/system/check-port`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PortCheckResponse {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Cheaply clonable handle to the management API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client from configuration.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::with_timeout(&config.base_url, config.request_timeout())
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url).map_err(|_| ApiError::InvalidUrl(base_url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ask the probing endpoint to check one URL.
    pub async fn send_probe(&self, request: &ProbeRequest) -> Result<ProbeResponse, ApiError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let res = self
            .http
            .post(self.endpoint("/api/probes"))
            .header(REQUEST_ID_HEADER, &request_id)
            .json(request)
            .send()
            .await?;
        decode(res).await
    }

    /// Ask whether a listen address is free on the managed host.
    pub async fn check_listen_addr(&self, addr: &str) -> Result<PortCheckResponse, ApiError> {
        let res = self
            .http
            .get(self.endpoint("/api/system/check-port"))
            .query(&[("listenAddr", addr)])
            .send()
            .await?;
        decode(res).await
    }

    /// Fetch and normalize the service list.
    pub async fn fetch_services(&self) -> Result<Vec<ManagedService>, ApiError> {
        let res = self.http.get(self.endpoint("/api/services")).send().await?;
        let raw: Option<Vec<RawService>> = decode(res).await?;
        Ok(normalize_services(raw))
    }

    /// Fetch the daemon's own settings.
    pub async fn fetch_system(&self) -> Result<SystemStatus, ApiError> {
        let res = self.http.get(self.endpoint("/api/system")).send().await?;
        decode(res).await
    }
}

async fn decode<T: serde::de::DeserializeOwned>(res: reqwest::Response) -> Result<T, ApiError> {
    let status = res.status();
    if !status.is_success() {
        return Err(ApiError::Status(status.as_u16()));
    }
    let body = res.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl ProbeClient for ApiClient {
    async fn probe(&self, request: &ProbeRequest, cancel: &CancellationToken) -> ProbeOutcome {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => ProbeOutcome::Cancelled,
            result = self.send_probe(request) => match result {
                Ok(response) => {
                    if let Some(error) = &response.error {
                        tracing::debug!(url = %request.url, error = %error, "Probe reported a problem");
                    }
                    ProbeOutcome::Settled(response.verdict())
                }
                Err(e) => {
                    tracing::debug!(url = %request.url, error = %e, "Probe request failed");
                    ProbeOutcome::Settled(Verdict::Unhealthy)
                }
            },
        }
    }
}

#[async_trait]
impl AvailabilityCheck for ApiClient {
    async fn check(&self, value: &str) -> Result<CheckResponse, ApiError> {
        let response = self.check_listen_addr(value).await?;
        Ok(CheckResponse {
            available: response.available,
            error: response.error,
        })
    }
}
