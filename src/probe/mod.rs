//! Probe subsystem.
//!
//! # Data Flow
//! ```text
//! ProbeTarget (scheme, host, port)
//!     → executor.rs: GET /v1/models
//!         → connect failure / timeout → GET /health (remaining budget)
//!     → types.rs: status → Classification
//!     → ProbeResult (never an error)
//! ```
//!
//! # Design Decisions
//! - Classification is total: ready, loading, down or unknown, always
//! - Timeouts are folded into `down`, malformed exchanges into `unknown`
//! - Only the status code is interpreted; no body schema is required

pub mod executor;
pub mod types;

pub use executor::{ProbeExecutor, HEALTH_PATH, MODELS_PATH};
pub use types::{Classification, ProbeResult, ProbeTarget, Scheme};
