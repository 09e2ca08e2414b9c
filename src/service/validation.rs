//! Cheap local format checks for service and system settings fields.
//!
//! These never touch the network; they gate remote calls so obviously
//! malformed input is rejected immediately.

use url::Url;

const DAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];
const DURATION_UNITS: [&str; 7] = ["ns", "us", "µs", "ms", "s", "m", "h"];

/// `localhost`, or at least two dot-separated DNS labels.
pub fn is_valid_host(s: &str) -> bool {
    let host = s.trim();
    if host.is_empty() {
        return false;
    }
    if host == "localhost" {
        return true;
    }
    if host.chars().any(|c| c == '/' || c.is_whitespace()) {
        return false;
    }
    let labels: Vec<&str> = host.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| is_valid_label(l))
}

fn is_valid_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    if bytes.is_empty() || bytes.len() > 63 {
        return false;
    }
    let edge_ok = |b: u8| b.is_ascii_alphanumeric();
    edge_ok(bytes[0])
        && edge_ok(bytes[bytes.len() - 1])
        && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
}

/// Absolute URL with an http or https scheme.
pub fn is_valid_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(u) => matches!(u.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Duration literal such as `500ms`, `2s`, `1m30s` or `1h2m3s`.
pub fn is_valid_go_duration(s: &str) -> bool {
    let mut rest = s.trim();
    if rest.is_empty() {
        return false;
    }
    while !rest.is_empty() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return false;
        }
        rest = &rest[digits..];
        // Longest unit first so "ms" is not read as "m" followed by garbage.
        let unit = DURATION_UNITS
            .iter()
            .filter(|u| rest.starts_with(*u))
            .max_by_key(|u| u.len());
        match unit {
            Some(u) => rest = &rest[u.len()..],
            None => return false,
        }
    }
    true
}

/// 24-hour `HH:MM`.
pub fn is_valid_hhmm(s: &str) -> bool {
    let s = s.trim();
    let Some((h, m)) = s.split_once(':') else {
        return false;
    };
    if h.len() != 2 || m.len() != 2 {
        return false;
    }
    match (h.parse::<u8>(), m.parse::<u8>()) {
        (Ok(h), Ok(m)) => h < 24 && m < 60 && s.chars().all(|c| c.is_ascii_digit() || c == ':'),
        _ => false,
    }
}

/// Split a comma separated day list, lowercasing and dropping blanks.
pub fn normalize_days(s: &str) -> Vec<String> {
    s.split(',')
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

pub fn are_valid_days<S: AsRef<str>>(days: &[S]) -> bool {
    days.iter().all(|d| DAYS.contains(&d.as_ref()))
}

/// Listen addresses must carry a port separator (`:8080`, `0.0.0.0:8080`).
pub fn is_valid_listen_addr(s: &str) -> bool {
    s.contains(':')
}
