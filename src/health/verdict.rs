//! Tri-state health verdicts and the combined display status.

use serde::Serialize;
use std::fmt;

/// Health of one layer of one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Not evaluated yet, or preconditions unmet.
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl Verdict {
    pub fn is_healthy(self) -> bool {
        self == Verdict::Healthy
    }

    /// Gauge encoding: 1 healthy, 0 unhealthy, -1 unknown.
    pub fn gauge_value(self) -> f64 {
        match self {
            Verdict::Healthy => 1.0,
            Verdict::Unhealthy => 0.0,
            Verdict::Unknown => -1.0,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Unknown => "unknown",
            Verdict::Healthy => "healthy",
            Verdict::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

/// Which network layer a probe targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Edge host that routes to the service.
    Proxy,
    /// The application instance behind the edge.
    Target,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Proxy => "proxy",
            Layer::Target => "target",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single issue surfaced for a service, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthIssue {
    Proxy,
    Target,
}

/// Combine both layer verdicts into what gets shown.
///
/// A proxy problem always wins; a target problem is only surfaced when the
/// proxy layer is confirmed healthy.
pub fn combined_issue(proxy: Verdict, target: Verdict) -> Option<HealthIssue> {
    match (proxy, target) {
        (Verdict::Unhealthy, _) => Some(HealthIssue::Proxy),
        (Verdict::Healthy, Verdict::Unhealthy) => Some(HealthIssue::Target),
        _ => None,
    }
}

/// Target verdict as it may be shown: only meaningful behind a healthy proxy.
pub fn effective_target(proxy: Verdict, target: Verdict) -> Verdict {
    if proxy.is_healthy() {
        target
    } else {
        Verdict::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_masked_unless_proxy_healthy() {
        for target in [Verdict::Unknown, Verdict::Healthy, Verdict::Unhealthy] {
            assert_eq!(effective_target(Verdict::Unknown, target), Verdict::Unknown);
            assert_eq!(effective_target(Verdict::Unhealthy, target), Verdict::Unknown);
            assert_eq!(effective_target(Verdict::Healthy, target), target);
        }
    }

    #[test]
    fn test_proxy_issue_takes_priority() {
        assert_eq!(
            combined_issue(Verdict::Unhealthy, Verdict::Unhealthy),
            Some(HealthIssue::Proxy)
        );
        assert_eq!(
            combined_issue(Verdict::Unhealthy, Verdict::Unknown),
            Some(HealthIssue::Proxy)
        );
    }

    #[test]
    fn test_target_issue_needs_healthy_proxy() {
        assert_eq!(
            combined_issue(Verdict::Healthy, Verdict::Unhealthy),
            Some(HealthIssue::Target)
        );
        assert_eq!(combined_issue(Verdict::Unknown, Verdict::Unhealthy), None);
        assert_eq!(combined_issue(Verdict::Healthy, Verdict::Healthy), None);
        assert_eq!(combined_issue(Verdict::Unknown, Verdict::Unknown), None);
    }
}
