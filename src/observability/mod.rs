//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! probe, discovery, plan and selection produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Terminal / log aggregation
//!     → Prometheus scrape (health --watch only)
//! ```
//!
//! # Design Decisions
//! - stdout is reserved for reports, so logs always go to stderr
//! - Run IDs flow through selection spans
//! - Metrics are cheap (atomic increments) and recorded even when no
//!   exporter is installed

pub mod logging;
pub mod metrics;
