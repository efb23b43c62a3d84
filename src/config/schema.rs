//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the pilot.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::probe::{ProbeTarget, Scheme};

/// Root configuration for backend selection and health checking.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PilotConfig {
    /// Backend selected when `select` is given no name.
    pub default_backend: Option<String>,

    /// Inference backend definitions.
    pub backends: Vec<BackendDefinition>,

    /// Probe settings.
    pub probe: ProbeConfig,

    /// Discovery scan settings.
    pub scan: ScanConfig,

    /// Plan execution timeouts and output limits.
    pub plan: PlanConfig,

    /// Reuse/restart policy.
    pub selection: SelectionConfig,

    /// Remote execution settings.
    pub ssh: SshConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl PilotConfig {
    /// Look up a backend by name, or the default backend when `name` is `None`.
    ///
    /// Without an explicit `default_backend` the first configured backend is used.
    pub fn backend(&self, name: Option<&str>) -> Option<&BackendDefinition> {
        match name.or(self.default_backend.as_deref()) {
            Some(name) => self.backends.iter().find(|b| b.name == name),
            None => self.backends.first(),
        }
    }
}

/// A configured inference backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendDefinition {
    /// Unique backend identifier.
    pub name: String,

    /// URL scheme used for probing.
    #[serde(default)]
    pub scheme: Scheme,

    /// Host the backend serves HTTP on (e.g., "localhost", "gpu-box.lan").
    pub host: String,

    /// Port the backend serves HTTP on.
    pub port: u16,

    /// Shell command that launches the backend. Must return once the server
    /// process is detached.
    pub start_cmd: String,

    /// Shell command that stops a running instance. Optional; when absent the
    /// restart plan has no stop step.
    #[serde(default)]
    pub stop_cmd: Option<String>,

    /// Shell command whose success proves the backend can actually serve.
    pub verify_cmd: String,

    /// Run commands on this host over SSH instead of locally.
    #[serde(default)]
    pub ssh: Option<SshTarget>,

    /// Override of `plan.start_wait_secs` for slow-loading models.
    #[serde(default)]
    pub startup_timeout_secs: Option<u64>,
}

impl BackendDefinition {
    /// The HTTP endpoint probed for this backend.
    pub fn probe_target(&self) -> ProbeTarget {
        ProbeTarget::new(self.scheme, self.host.clone(), self.port)
    }
}

/// SSH destination for remote command execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SshTarget {
    /// Remote login user.
    pub user: String,

    /// SSH host (may differ from the HTTP host, e.g. a bastion-visible name).
    pub host: String,

    /// SSH port.
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Path to the identity file.
    #[serde(default)]
    pub key: Option<String>,
}

impl SshTarget {
    /// `user@host` destination string.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl std::fmt::Display for SshTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

fn default_ssh_port() -> u16 {
    22
}

/// Probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Total budget for one probe (both endpoints) in milliseconds.
    pub timeout_ms: u64,

    /// User-Agent sent with probe requests.
    pub user_agent: String,

    /// Accept self-signed certificates on https backends.
    pub accept_invalid_certs: bool,
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            user_agent: "backend-pilot-probe".to_string(),
            accept_invalid_certs: false,
        }
    }
}

/// Discovery scan configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Maximum probes in flight at once.
    pub concurrency: usize,

    /// Wall-clock limit for a whole scan in seconds.
    pub timeout_secs: u64,
}

impl ScanConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 64,
            timeout_secs: 30,
        }
    }
}

/// Plan execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Timeout for a stop or start command in seconds.
    pub command_timeout_secs: u64,

    /// Timeout for the verification command in seconds.
    pub verify_timeout_secs: u64,

    /// How long the wait step polls for readiness after a start, in seconds.
    pub start_wait_secs: u64,

    /// Polling interval floor for the wait step in milliseconds.
    pub wait_poll_ms: u64,

    /// Upper bound for a whole plan in seconds.
    pub plan_timeout_secs: u64,

    /// Character budget for stdout/stderr excerpts.
    pub excerpt_chars: usize,
}

impl PlanConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }

    pub fn plan_timeout(&self) -> Duration {
        Duration::from_secs(self.plan_timeout_secs)
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 60,
            verify_timeout_secs: 60,
            start_wait_secs: 180,
            wait_poll_ms: 500,
            plan_timeout_secs: 600,
            excerpt_chars: 400,
        }
    }
}

/// Reuse/restart policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Extra probe attempts while a reused backend reports `loading`.
    pub loading_retries: u32,

    /// Base delay between loading probes in milliseconds.
    pub loading_base_delay_ms: u64,

    /// Maximum delay between loading probes in milliseconds.
    pub loading_max_delay_ms: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            loading_retries: 5,
            loading_base_delay_ms: 1000,
            loading_max_delay_ms: 10_000,
        }
    }
}

/// Remote execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SshConfig {
    /// ssh binary to invoke.
    pub program: String,

    /// `ConnectTimeout` passed to ssh, in seconds.
    pub connect_timeout_secs: u64,

    /// `StrictHostKeyChecking` value; `accept-new` never prompts.
    pub strict_host_key_checking: String,

    /// Shell used as `<shell> -lc '<cmd>'` on the remote side.
    pub login_shell: String,

    /// Share one control master across the steps of a plan.
    pub multiplex: bool,

    /// Directory for control sockets.
    pub control_dir: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            connect_timeout_secs: 10,
            strict_host_key_checking: "accept-new".to_string(),
            login_shell: "bash".to_string(),
            multiplex: true,
            control_dir: std::env::temp_dir().to_string_lossy().into_owned(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format ("pretty" or "json").
    pub log_format: String,

    /// Enable the metrics endpoint in watch mode.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}
