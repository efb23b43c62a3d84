//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! configured backends ──┐
//! --scan hosts × ports ─┴→ reporter.rs (dedupe against configured)
//!     → one bounded scan
//!     → rows: configured first, then discovered
//!     → render.rs (table | JSON)
//! ```
//!
//! # Design Decisions
//! - Read-only: probes and scans, never plans
//! - A discovered target equal to a configured one is shown once, as configured

pub mod render;
pub mod reporter;

pub use render::{decision_text, health_table, to_json};
pub use reporter::{HealthReport, HealthReporter, HealthRequest, HealthRow, Origin};
