//! Managed service data model and list refresh.
//!
//! # Data Flow
//! ```text
//! GET /api/services
//!     → model.rs (RawService → ManagedService with defaults)
//!     → refresh.rs (periodic fetch, last-known-good, loading gate)
//!     → watch channel → probe scheduler reconcile
//!
//! GET /api/system
//!     → system.rs (periodic fetch, last-known-good)
//!     → watch channel → listen address validator baseline
//! ```
//!
//! # Design Decisions
//! - The dashboard never mutates services; it only reads them
//! - Missing or null wire fields are defaulted in one place
//! - validation.rs holds the cheap local format checks shared by forms

pub mod model;
pub mod refresh;
pub mod system;
pub mod validation;

pub use model::{ManagedService, ServiceSchedule, SystemStatus};
pub use refresh::{ServiceRefresher, ServiceSource};
pub use system::{follow_listen_addr, SystemRefresher, SystemSource};
