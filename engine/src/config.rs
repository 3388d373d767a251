//! Engine configuration.
//!
//! All settings have defaults, so an empty TOML document (or no file at all)
//! is a valid configuration. Example:
//!
//! ```toml
//! poll_interval_ms = 2000
//! max_concurrent_jobs = 1
//! readback_algorithm = "blake3"
//!
//! [copier]
//! kind = "robocopy"
//! threads = 16
//! retries = 2
//! wait_seconds = 1
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::checksums::ChecksumAlgorithm;
use crate::error::EngineError;

/// Top-level engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Progress monitor cadence
    pub poll_interval_ms: u64,
    /// How often the job loop checks for cancellation and copier exit
    pub cancel_check_interval_ms: u64,
    /// How long stopping the monitor may wait for an in-flight tick
    pub monitor_stop_grace_ms: u64,
    /// Jobs of one batch allowed to run at the same time
    pub max_concurrent_jobs: usize,
    /// Digest used for `verify_written` read-back
    pub readback_algorithm: ChecksumAlgorithm,
    pub copier: CopierConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            poll_interval_ms: 2000,
            cancel_check_interval_ms: 150,
            monitor_stop_grace_ms: 500,
            max_concurrent_jobs: 1,
            readback_algorithm: ChecksumAlgorithm::Blake3,
            copier: CopierConfig::default(),
        }
    }
}

/// Which bulk-copy program drives the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopierKind {
    /// Windows robocopy with the engine's fixed flag set
    Robocopy,
    /// Any program, with `{source}` and `{destination}` placeholders in `args`
    Command,
}

/// Settings for the bulk-copy subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CopierConfig {
    pub kind: CopierKind,
    /// Program to run; defaults to `robocopy` for the robocopy kind
    pub program: Option<String>,
    /// Argument template for the command kind
    pub args: Vec<String>,
    /// Extra arguments appended when a job asks for `verify_written`
    pub verify_args: Vec<String>,
    /// Concurrent transfer streams (robocopy `/MT`)
    pub threads: u32,
    /// Per-file retry count (robocopy `/R`)
    pub retries: u32,
    /// Seconds between retries (robocopy `/W`)
    pub wait_seconds: u32,
}

impl Default for CopierConfig {
    fn default() -> Self {
        CopierConfig {
            kind: if cfg!(windows) {
                CopierKind::Robocopy
            } else {
                CopierKind::Command
            },
            program: None,
            args: Vec::new(),
            verify_args: Vec::new(),
            threads: 16,
            retries: 2,
            wait_seconds: 1,
        }
    }
}

impl CopierConfig {
    /// Program to launch, falling back to the kind's default.
    pub fn resolved_program(&self) -> String {
        match (&self.program, self.kind) {
            (Some(program), _) => program.clone(),
            (None, CopierKind::Robocopy) => "robocopy".to_string(),
            (None, CopierKind::Command) => "cp".to_string(),
        }
    }

    /// Argument template for the command kind. An empty template means a
    /// plain recursive `cp` of the source's contents.
    pub fn resolved_args(&self) -> Vec<String> {
        if !self.args.is_empty() {
            return self.args.clone();
        }
        vec![
            "-R".to_string(),
            "{source}/.".to_string(),
            "{destination}".to_string(),
        ]
    }
}

impl EngineConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = toml::from_str(text).map_err(|e| EngineError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = fs::read_to_string(path).map_err(|e| EngineError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |message: &str| -> Result<(), EngineError> {
            Err(EngineError::Config {
                message: message.to_string(),
            })
        };

        if self.poll_interval_ms == 0 {
            return invalid("poll_interval_ms must be greater than zero");
        }
        if self.cancel_check_interval_ms == 0 {
            return invalid("cancel_check_interval_ms must be greater than zero");
        }
        if self.max_concurrent_jobs == 0 {
            return invalid("max_concurrent_jobs must be at least 1");
        }
        if self.copier.threads == 0 || self.copier.threads > 128 {
            return invalid("copier.threads must be between 1 and 128");
        }
        if self.copier.kind == CopierKind::Command {
            if self.copier.program.is_some() && self.copier.args.is_empty() {
                return invalid("copier.args is required when copier.program is set");
            }
            let args = self.copier.resolved_args();
            let has_source = args.iter().any(|a| a.contains("{source}"));
            let has_destination = args.iter().any(|a| a.contains("{destination}"));
            if !has_source || !has_destination {
                return invalid("copier.args must reference {source} and {destination}");
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cancel_check_interval(&self) -> Duration {
        Duration::from_millis(self.cancel_check_interval_ms)
    }

    pub fn monitor_stop_grace(&self) -> Duration {
        Duration::from_millis(self.monitor_stop_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty config should parse");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_robocopy_table() {
        let config = EngineConfig::from_toml_str(
            r#"
            poll_interval_ms = 500
            readback_algorithm = "sha256"

            [copier]
            kind = "robocopy"
            threads = 8
            retries = 1
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.readback_algorithm, ChecksumAlgorithm::Sha256);
        assert_eq!(config.copier.kind, CopierKind::Robocopy);
        assert_eq!(config.copier.threads, 8);
        assert_eq!(config.copier.retries, 1);
        // Unset keys in the table keep their defaults
        assert_eq!(config.copier.wait_seconds, 1);
        assert_eq!(config.copier.resolved_program(), "robocopy");
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let result = EngineConfig::from_toml_str("poll_interval_ms = 0");
        assert!(matches!(result, Err(EngineError::Config { .. })));
    }

    #[test]
    fn test_command_copier_requires_placeholders() {
        let result = EngineConfig::from_toml_str(
            r#"
            [copier]
            kind = "command"
            program = "rsync"
            args = ["-a", "{source}/"]
            "#,
        );
        assert!(matches!(result, Err(EngineError::Config { .. })));
    }

    #[test]
    fn test_default_command_runs_cp_directly() {
        let copier = CopierConfig {
            kind: CopierKind::Command,
            ..CopierConfig::default()
        };
        assert_eq!(copier.resolved_program(), "cp");
        assert_eq!(copier.resolved_args(), vec!["-R", "{source}/.", "{destination}"]);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = EngineConfig::from_toml_str("poll_every = 3");
        assert!(result.is_err());
    }
}
