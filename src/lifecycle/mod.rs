//! Lifecycle management for the dashboard daemon.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_signal() returns
//!
//! Shutdown (shutdown.rs):
//!     trigger() → refresher, reconcile loop, status API stop
//!              → scheduler.stop_all() cancels every probe cycle
//! ```
//!
//! # Design Decisions
//! - One broadcast channel reaches every long-running task
//! - Probe cycles are stopped explicitly, not by dropping the runtime

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
