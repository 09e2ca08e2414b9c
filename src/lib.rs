//! Conslee dashboard coordination core.
//!
//! Keeps a live view of managed services: layered reachability probes,
//! debounced listen-address validation and a flicker-free loading signal.

pub mod api;
pub mod config;
pub mod coordination;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod service;
pub mod status;

pub use api::ApiClient;
pub use config::schema::DashboardConfig;
pub use coordination::{DebouncedValidator, MinDurationGate};
pub use health::ProbeScheduler;
pub use lifecycle::Shutdown;
pub use service::ServiceRefresher;
