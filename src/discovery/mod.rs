//! Discovery subsystem.
//!
//! # Data Flow
//! ```text
//! "8080" | "8080,8081" | "8000-8010"
//!     → ports.rs (parse, validate, expand, dedupe)
//!     → scanner.rs ({host} × {port} targets)
//!         → semaphore-bounded probe tasks
//!         → results keyed by target
//!     → ScanReport (every target, deadline flag)
//! ```
//!
//! # Design Decisions
//! - Invalid specs are rejected before any socket is opened
//! - Unreachable targets are reported, not dropped, so an empty sweep and
//!   an aborted sweep look different

pub mod ports;
pub mod scanner;

pub use ports::{PortSpec, PortSpecError};
pub use scanner::{ScanHost, ScanReport, Scanner};
