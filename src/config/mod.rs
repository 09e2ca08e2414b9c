//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DashboardConfig (validated, immutable)
//!     → cloned into each subsystem at startup
//!
//! preferences file (TOML)
//!     → preferences.rs (load once, save on explicit request)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod preferences;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use preferences::{Preferences, Theme};
pub use schema::{
    ApiConfig, DashboardConfig, LoadingConfig, ObservabilityConfig, ProbeConfig, RefreshConfig,
    StatusConfig, ValidatorConfig,
};
