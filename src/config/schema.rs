//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dashboard
//! daemon. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the dashboard daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DashboardConfig {
    /// Service-management API the dashboard talks to.
    pub api: ApiConfig,

    /// Layered reachability probe settings.
    pub probes: ProbeConfig,

    /// Debounced listen-address validation.
    pub validator: ValidatorConfig,

    /// Loading indicator settings.
    pub loading: LoadingConfig,

    /// Service list refresh settings.
    pub refresh: RefreshConfig,

    /// Local status API.
    pub status: StatusConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Location of the persisted theme/language preferences.
    pub preferences_path: Option<String>,
}

/// Remote service-management API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the management API (e.g., "http://127.0.0.1:8080").
    pub base_url: String,

    /// Timeout applied to every remote call in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_secs: 5,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Probe scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Enable layered probing.
    pub enabled: bool,

    /// Interval between probes of one layer of one service, in seconds.
    pub interval_secs: u64,

    /// Whether the dashboard is served over https; selects the scheme of
    /// proxy-layer probe URLs.
    pub secure_page: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            secure_page: false,
        }
    }
}

impl ProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Scheme used for proxy-layer probe URLs.
    pub fn page_scheme(&self) -> &'static str {
        if self.secure_page {
            "https"
        } else {
            "http"
        }
    }
}

/// Debounced validator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Quiet window before a validation call is issued, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

impl ValidatorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Loading indicator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadingConfig {
    /// Minimum time a busy indicator stays visible, in milliseconds.
    pub min_visible_ms: u64,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self { min_visible_ms: 300 }
    }
}

impl LoadingConfig {
    pub fn min_visible(&self) -> Duration {
        Duration::from_millis(self.min_visible_ms)
    }
}

/// Service list refresh configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Refresh interval in seconds.
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { interval_secs: 10 }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Local status API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Enable the status API.
    pub enabled: bool,

    /// Bind address (e.g., "127.0.0.1:9280").
    pub bind_address: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:9280".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9281".to_string(),
        }
    }
}
