//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → shared via ArcSwap with the admin API
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → policy.tls_required applied to the live PolicySwitch
//!     → atomic swap of Arc<ServerConfig>
//! ```
//!
//! # Design Decisions
//! - Only the TLS policy is applied live; listener and certificate changes
//!   are logged and take effect on restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, ListenerConfig, ObservabilityConfig, PolicyConfig, ServerConfig, TimeoutConfig,
    TlsConfig,
};
pub use watcher::ConfigWatcher;
