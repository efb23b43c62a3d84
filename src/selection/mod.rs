//! Selection subsystem.
//!
//! # Data Flow
//! ```text
//! backend name + intent
//!     → planner.rs (resolve, claim slot, optional discovery sweep)
//!     → policy.rs (reuse or forced-restart plan, fallback flag)
//!     → plan executor
//!         → failed reuse under Auto → one restart plan
//!     → decision.rs (strategy, attempts, final classification)
//! ```
//!
//! # Design Decisions
//! - Reuse is always tried first unless restart is forced; a restart stops
//!   whatever is running, so it is never the cheap option
//! - The fallback decision lives in the plan builder, so a restart can never
//!   trigger another restart
//! - One selection per backend at a time within the process

pub mod active;
pub mod decision;
pub mod planner;
pub mod policy;

pub use active::{ActiveGuard, ActivePlans};
pub use decision::{Intent, PlanAttempt, PlanKind, PlannedRun, SelectionDecision};
pub use planner::{SelectError, SelectRequest, SelectionPlanner};
pub use policy::PlanningPolicy;
