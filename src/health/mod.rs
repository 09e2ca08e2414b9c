//! Layered reachability probing.
//!
//! # Data Flow
//! ```text
//! Service list (refresher)
//!     → scheduler.rs (one monitor per service name)
//!     → monitor.rs proxy cycle
//!         → probe.rs builds request → ProbeClient → verdict
//!         → proxy verdict channel ──┐
//!     → monitor.rs target cycle  ◀──┘ (precondition: proxy healthy)
//!         → probe.rs builds request → ProbeClient → verdict
//!     → VerdictEvent broadcast + snapshot (status API)
//! ```
//!
//! # Design Decisions
//! - Verdicts are tri-state; unmet preconditions mean `Unknown`, not failure
//! - The target verdict is `Unknown` whenever the proxy verdict is not healthy
//! - One probe in flight per layer per service; fixed interval, no backoff
//! - Nothing is persisted; state is rebuilt from the service list

pub mod monitor;
pub mod probe;
pub mod scheduler;
pub mod verdict;

pub use monitor::{ServiceMonitor, VerdictEvent};
pub use probe::{ProbeClient, ProbeOutcome, ProbeRequest};
pub use scheduler::{ProbeScheduler, ServiceHealth};
pub use verdict::{combined_issue, effective_target, HealthIssue, Layer, Verdict};
