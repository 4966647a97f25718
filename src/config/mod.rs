//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, defaults for missing sections)
//!     → cli.rs overrides (flags and environment)
//!     → validation.rs (semantic checks, all errors at once)
//!     → ManagerConfig (validated, immutable)
//! ```
//!
//! Config is read once at startup. The base HAProxy template it points at is
//! re-read on every reconciliation cycle.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    DataPlaneConfig, EventsConfig, HaproxyConfig, LbApiConfig, LogFormat, ManagerConfig,
    ManagerSection, OAuthConfig, ObservabilityConfig,
};
pub use validation::{validate_config, ValidationError};
