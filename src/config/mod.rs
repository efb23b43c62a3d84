//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! backend-pilot.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PilotConfig (validated, immutable for one invocation)
//!
//! In `health --watch` mode:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the live config
//! ```
//!
//! # Design Decisions
//! - Backend definitions are immutable for the duration of an invocation
//! - All sections have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BackendDefinition, ObservabilityConfig, PilotConfig, PlanConfig, ProbeConfig, ScanConfig,
    SelectionConfig, SshConfig, SshTarget,
};
