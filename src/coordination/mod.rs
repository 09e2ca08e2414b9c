//! Reusable coordination primitives for user-facing state.
//!
//! # Data Flow
//! ```text
//! Settings edits (listen address)
//!     → debounce.rs (500ms quiet window, single pending check)
//!     → AvailabilityCheck (remote) → ValidationState watch channel
//!
//! Background refresh start/finish
//!     → gate.rs (busy=true immediately, busy=false after ≥300ms)
//!     → busy watch channel
//! ```
//!
//! # Design Decisions
//! - Neither primitive depends on the probe scheduler
//! - Each owns at most one pending task; scheduling a new one cancels the old
//! - Results are published on watch channels so readers always see the latest

pub mod debounce;
pub mod gate;

pub use debounce::{
    AvailabilityCheck, CheckResponse, CheckVerdict, DebouncedValidator, ValidationState,
    ValidationStatus,
};
pub use gate::{BusyGuard, MinDurationGate};
