//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     latched watch channel → watch loop exits after the current report
//! ```
//!
//! # Design Decisions
//! - One-shot commands never install handlers; only `health --watch` runs
//!   long enough to need them
//! - A second signal exits immediately

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::spawn_signal_handler;
