//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (`default_backend` names a real backend)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Detect duplicate backend names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PilotConfig → Result<(), Vec<ValidationError>>
//! - Runs before any probe or process is started

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::PilotConfig;

const MAX_LOADING_RETRIES: u32 = 100;
/// One hour.
const MAX_LOADING_DELAY_MS: u64 = 3_600_000;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `backends[1].port`).
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &PilotConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();

    for (i, backend) in config.backends.iter().enumerate() {
        let at = |field: &str| format!("backends[{}].{}", i, field);

        if backend.name.trim().is_empty() {
            errors.push(ValidationError::new(at("name"), "must not be empty"));
        } else if !names.insert(backend.name.as_str()) {
            errors.push(ValidationError::new(
                at("name"),
                format!("duplicate backend name '{}'", backend.name),
            ));
        }
        if backend.host.trim().is_empty() {
            errors.push(ValidationError::new(at("host"), "must not be empty"));
        }
        if backend.port == 0 {
            errors.push(ValidationError::new(at("port"), "must be between 1 and 65535"));
        }
        if backend.start_cmd.trim().is_empty() {
            errors.push(ValidationError::new(at("start_cmd"), "must not be empty"));
        }
        if backend.verify_cmd.trim().is_empty() {
            errors.push(ValidationError::new(at("verify_cmd"), "must not be empty"));
        }
        if matches!(&backend.stop_cmd, Some(cmd) if cmd.trim().is_empty()) {
            errors.push(ValidationError::new(at("stop_cmd"), "must not be empty when set"));
        }
        if backend.startup_timeout_secs == Some(0) {
            errors.push(ValidationError::new(at("startup_timeout_secs"), "must be > 0"));
        }
        if let Some(ssh) = &backend.ssh {
            if ssh.user.trim().is_empty() {
                errors.push(ValidationError::new(at("ssh.user"), "must not be empty"));
            }
            if ssh.host.trim().is_empty() {
                errors.push(ValidationError::new(at("ssh.host"), "must not be empty"));
            }
            if ssh.port == 0 {
                errors.push(ValidationError::new(at("ssh.port"), "must be between 1 and 65535"));
            }
        }
    }

    if let Some(default) = &config.default_backend {
        if !config.backends.iter().any(|b| &b.name == default) {
            errors.push(ValidationError::new(
                "default_backend",
                format!("no backend named '{}'", default),
            ));
        }
    }

    let positive = [
        ("probe.timeout_ms", config.probe.timeout_ms),
        ("scan.timeout_secs", config.scan.timeout_secs),
        ("plan.command_timeout_secs", config.plan.command_timeout_secs),
        ("plan.verify_timeout_secs", config.plan.verify_timeout_secs),
        ("plan.start_wait_secs", config.plan.start_wait_secs),
        ("plan.wait_poll_ms", config.plan.wait_poll_ms),
        ("plan.plan_timeout_secs", config.plan.plan_timeout_secs),
        ("ssh.connect_timeout_secs", config.ssh.connect_timeout_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be > 0"));
        }
    }

    if config.scan.concurrency == 0 {
        errors.push(ValidationError::new("scan.concurrency", "must be > 0"));
    }
    if config.plan.excerpt_chars < 16 {
        errors.push(ValidationError::new("plan.excerpt_chars", "must be at least 16"));
    }
    if config.selection.loading_retries > MAX_LOADING_RETRIES {
        errors.push(ValidationError::new(
            "selection.loading_retries",
            format!("must be at most {}", MAX_LOADING_RETRIES),
        ));
    }
    if config.selection.loading_max_delay_ms > MAX_LOADING_DELAY_MS {
        errors.push(ValidationError::new(
            "selection.loading_max_delay_ms",
            format!("must be at most {}", MAX_LOADING_DELAY_MS),
        ));
    }
    if config.selection.loading_base_delay_ms > config.selection.loading_max_delay_ms {
        errors.push(ValidationError::new(
            "selection.loading_base_delay_ms",
            "must not exceed selection.loading_max_delay_ms",
        ));
    }
    if config.ssh.login_shell.trim().is_empty() {
        errors.push(ValidationError::new("ssh.login_shell", "must not be empty"));
    }
    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            "must be 'pretty' or 'json'",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{BackendDefinition, SshTarget};
    use crate::probe::Scheme;

    fn backend(name: &str, port: u16) -> BackendDefinition {
        BackendDefinition {
            name: name.into(),
            scheme: Scheme::Http,
            host: "localhost".into(),
            port,
            start_cmd: "start".into(),
            stop_cmd: None,
            verify_cmd: "true".into(),
            ssh: None,
            startup_timeout_secs: None,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let mut config = PilotConfig::default();
        config.backends.push(backend("a", 8080));
        config.default_backend = Some("a".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = PilotConfig::default();
        config.backends.push(backend("a", 8080));
        config.backends.push(backend("a", 0));
        config.backends[1].verify_cmd = "  ".into();
        config.default_backend = Some("ghost".into());
        config.scan.concurrency = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"backends[1].name"));
        assert!(fields.contains(&"backends[1].port"));
        assert!(fields.contains(&"backends[1].verify_cmd"));
        assert!(fields.contains(&"default_backend"));
        assert!(fields.contains(&"scan.concurrency"));
    }

    #[test]
    fn test_loading_retry_bounds() {
        let mut config = PilotConfig::default();
        config.backends.push(backend("a", 8080));
        config.selection.loading_retries = 1000;
        config.selection.loading_max_delay_ms = u64::MAX;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["selection.loading_retries", "selection.loading_max_delay_ms"]);
    }

    #[test]
    fn test_ssh_target_checked() {
        let mut config = PilotConfig::default();
        let mut b = backend("remote", 8000);
        b.ssh = Some(SshTarget {
            user: "".into(),
            host: "gpu".into(),
            port: 22,
            key: None,
        });
        config.backends.push(b);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "backends[0].ssh.user: must not be empty");
    }
}
