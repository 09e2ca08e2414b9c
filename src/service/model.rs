//! Managed service resource as seen by the dashboard.
//!
//! The management API owns these objects; the dashboard only reads them.
//! `RawService` mirrors the wire payload where every field may be missing
//! or null, and normalizes into `ManagedService` with the documented defaults.

use serde::{Deserialize, Serialize};

use crate::service::validation::{
    are_valid_days, is_valid_go_duration, is_valid_hhmm, is_valid_host, is_valid_url,
};

pub const DEFAULT_MODE: &str = "on_demand";

/// Start/stop schedule attached to a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSchedule {
    pub mode: String,
    pub days: Vec<String>,
    pub start: String,
    pub stop: String,
}

/// A proxied, sleep/wake-capable backend service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedService {
    /// Unique identifier; stable key for scheduling state.
    pub name: String,
    /// Edge-layer host used for proxy-layer probes.
    pub host: String,
    pub containers: Vec<String>,
    pub mode: String,
    /// Probing is suppressed entirely when false.
    pub enabled: bool,
    /// Target-layer probing is suppressed when false.
    pub running: bool,
    pub last_activity: String,
    pub idle_timeout: String,
    pub startup_timeout: String,
    /// Absolute base URL of the upstream application.
    pub target_url: String,
    pub health_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ServiceSchedule>,
}

impl ManagedService {
    /// A service with only a name; every other field takes its default.
    pub fn named(name: impl Into<String>) -> Self {
        RawService {
            name: Some(name.into()),
            ..RawService::default()
        }
        .into()
    }

    /// Check field formats, returning a description of each problem.
    pub fn validate(&self) -> Vec<FieldIssue> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push(FieldIssue::new("name", "is required"));
        }
        if !self.host.is_empty() && !is_valid_host(&self.host) {
            issues.push(FieldIssue::new("host", "is not a valid hostname"));
        }
        if !self.target_url.is_empty() && !is_valid_url(&self.target_url) {
            issues.push(FieldIssue::new("targetUrl", "must be an absolute http(s) URL"));
        }
        for (field, value) in [
            ("idleTimeout", &self.idle_timeout),
            ("startupTimeout", &self.startup_timeout),
        ] {
            if !value.is_empty() && !is_valid_go_duration(value) {
                issues.push(FieldIssue::new(field, "is not a duration like 30s or 5m"));
            }
        }
        if let Some(schedule) = &self.schedule {
            if !are_valid_days(&schedule.days) {
                issues.push(FieldIssue::new("schedule.days", "contains an unknown day"));
            }
            for (field, value) in [("schedule.start", &schedule.start), ("schedule.stop", &schedule.stop)] {
                if !value.is_empty() && !is_valid_hhmm(value) {
                    issues.push(FieldIssue::new(field, "must be HH:MM"));
                }
            }
        }

        issues
    }
}

/// A problem found by [`ManagedService::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: &'static str,
    pub message: &'static str,
}

impl FieldIssue {
    fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

/// Wire shape of a service; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawService {
    pub name: Option<String>,
    pub host: Option<String>,
    pub containers: Option<Vec<String>>,
    pub mode: Option<String>,
    pub enabled: Option<bool>,
    pub running: Option<bool>,
    pub last_activity: Option<String>,
    pub idle_timeout: Option<String>,
    pub startup_timeout: Option<String>,
    pub target_url: Option<String>,
    pub health_path: Option<String>,
    pub schedule: Option<RawSchedule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSchedule {
    pub mode: Option<String>,
    pub days: Option<Vec<String>>,
    pub start: Option<String>,
    pub stop: Option<String>,
}

impl From<RawSchedule> for ServiceSchedule {
    fn from(raw: RawSchedule) -> Self {
        Self {
            mode: raw.mode.unwrap_or_else(|| DEFAULT_MODE.to_string()),
            days: raw.days.unwrap_or_default(),
            start: raw.start.unwrap_or_default(),
            stop: raw.stop.unwrap_or_default(),
        }
    }
}

impl From<RawService> for ManagedService {
    fn from(raw: RawService) -> Self {
        Self {
            name: raw.name.unwrap_or_default(),
            host: raw.host.unwrap_or_default(),
            containers: raw.containers.unwrap_or_default(),
            mode: raw.mode.unwrap_or_else(|| DEFAULT_MODE.to_string()),
            enabled: raw.enabled.unwrap_or(true),
            running: raw.running.unwrap_or(false),
            last_activity: raw.last_activity.unwrap_or_default(),
            idle_timeout: raw.idle_timeout.unwrap_or_default(),
            startup_timeout: raw.startup_timeout.unwrap_or_default(),
            target_url: raw.target_url.unwrap_or_default(),
            health_path: raw.health_path.unwrap_or_default(),
            schedule: raw.schedule.map(ServiceSchedule::from),
        }
    }
}

/// Normalize a service list payload. A `null` body yields an empty list.
pub fn normalize_services(raw: Option<Vec<RawService>>) -> Vec<ManagedService> {
    raw.unwrap_or_default()
        .into_iter()
        .map(ManagedService::from)
        .collect()
}

/// Settings of the management daemon itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub listen_addr: String,
    #[serde(default)]
    pub idle_reaper_interval: String,
}
