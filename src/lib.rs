//! Inference backend selection and health engine.

pub mod config;
pub mod discovery;
pub mod lifecycle;
pub mod observability;
pub mod plan;
pub mod probe;
pub mod report;
pub mod resilience;
pub mod selection;

pub use config::schema::PilotConfig;
pub use lifecycle::Shutdown;
pub use report::HealthReporter;
pub use selection::SelectionPlanner;
