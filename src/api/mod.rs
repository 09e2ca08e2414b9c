//! Client for the remote service-management API.
//!
//! # Endpoints
//! ```text
//! POST /api/probes              → reachability probe   {status}
//! GET  /api/system/check-port   → listen address check {available, error?}
//! GET  /api/services            → service list         [RawService]
//! GET  /api/system              → daemon settings      {listenAddr, idleReaperInterval}
//! ```
//!
//! # Design Decisions
//! - One reqwest client per process, cloned cheaply into every consumer
//! - Every call has a deadline (`api.request_timeout_secs`)
//! - Non-2xx responses are errors here; callers decide what they mean

pub mod client;

pub use client::{ApiClient, ApiError, PortCheckResponse, ProbeResponse};
