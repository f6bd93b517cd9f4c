//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (handshake and connection counters)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Per-connection decisions log at debug, rejections at warn
//! - Metrics are cheap counters; without an installed recorder they are no-ops

pub mod logging;
pub mod metrics;
