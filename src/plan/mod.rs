//! Plan execution subsystem.
//!
//! # Data Flow
//! ```text
//! ExecutionPlan (built by selection, immutable)
//!     → executor.rs: for each step, in order
//!         probe / wait        → ProbeExecutor (from this machine)
//!         start / stop / verify → remote.rs RemoteExecutor
//!                                  (LocalExecutor | SshExecutor)
//!         → excerpt.rs bounds captured output
//!     → first failure stops the run
//!     → PlanOutcome (ordered PlanStepResults + success flag)
//! ```
//!
//! # Design Decisions
//! - Steps within a plan never overlap; independent plans share nothing
//! - Every step is clamped to the plan deadline
//! - Excerpts, never full logs, are kept for diagnosis

pub mod excerpt;
pub mod executor;
pub mod remote;
pub mod types;

pub use executor::PlanExecutor;
pub use remote::{CommandOutput, LocalExecutor, RemoteExecutor, SshExecutor};
pub use types::{
    ExecutionPlan, PlanOutcome, PlanStep, PlanStepResult, StepAction, StepKind, StepTarget,
};
