//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Probe step (loading) / wait step (not ready yet):
//!     → backoff.rs (exponential delay with jitter before the next poll)
//! Plan / step / scan:
//!     → timeouts.rs (one absolute deadline, every step clamped to it)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline; nothing waits unbounded
//! - Deadlines are absolute instants so nested budgets never add up past
//!   the outer one

pub mod backoff;
pub mod timeouts;

pub use backoff::Backoff;
pub use timeouts::Deadline;
