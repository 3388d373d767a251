//! Bulk-copy subprocess definitions.
//!
//! The engine never copies bytes itself. A `BulkCopier` describes how to
//! launch an external program for one job; the copy engine owns spawning,
//! polling, cancelling and interpreting the exit code.
//!
//! Exit codes follow robocopy's documented bitmask: 0 through 7 are
//! combinations of "nothing to do", "files copied", "extra files" and
//! "mismatched files" and all count as success; 8 and above mean the tool
//! itself failed.

use std::ffi::OsString;
use std::process::Command;

use crate::config::{CopierConfig, CopierKind};
use crate::model::TransferJob;

/// Highest exit code that still means the copier did its job.
pub const MAX_SUCCESS_EXIT_CODE: i32 = 7;

/// Classify a copier exit code. Negative codes are failures.
pub fn exit_code_is_success(code: i32) -> bool {
    (0..=MAX_SUCCESS_EXIT_CODE).contains(&code)
}

/// Something that can build the subprocess command for a job.
pub trait BulkCopier: Send + Sync {
    /// Short program name for logs and error messages.
    fn name(&self) -> &str;

    /// Build the command copying `job.source_path()` into
    /// `job.destination_path()`. Stdio is configured by the caller.
    fn command(&self, job: &TransferJob) -> Command;
}

/// Windows robocopy.
///
/// Runs with `/E` (recurse, keep empty dirs), `/XJ` (do not cross
/// junctions), bounded `/R` and `/W`, `/MT` streams, and every log switch
/// turned off. Progress is derived from polling the destination, not from
/// robocopy's output.
#[derive(Debug, Clone)]
pub struct Robocopy {
    pub program: String,
    pub threads: u32,
    pub retries: u32,
    pub wait_seconds: u32,
    /// Appended for `verify_written` jobs
    pub verify_args: Vec<String>,
}

impl Default for Robocopy {
    fn default() -> Self {
        Robocopy {
            program: "robocopy".to_string(),
            threads: 16,
            retries: 2,
            wait_seconds: 1,
            verify_args: Vec::new(),
        }
    }
}

impl Robocopy {
    pub fn arguments(&self, job: &TransferJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            job.source_path().as_os_str().to_os_string(),
            job.destination_path().as_os_str().to_os_string(),
        ];
        args.extend(
            [
                "/E".to_string(),
                "/XJ".to_string(),
                format!("/R:{}", self.retries),
                format!("/W:{}", self.wait_seconds),
                format!("/MT:{}", self.threads),
                "/NFL".to_string(),
                "/NDL".to_string(),
                "/NJH".to_string(),
                "/NJS".to_string(),
                "/NP".to_string(),
                "/NC".to_string(),
                "/NS".to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        if job.verify_written() {
            args.extend(self.verify_args.iter().map(OsString::from));
        }
        args
    }
}

impl BulkCopier for Robocopy {
    fn name(&self) -> &str {
        &self.program
    }

    fn command(&self, job: &TransferJob) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.arguments(job));
        cmd
    }
}

/// An arbitrary program driven by an argument template.
///
/// `{source}` and `{destination}` are substituted in every argument. An
/// argument that is exactly a placeholder receives the raw path, so
/// non-UTF-8 paths survive.
#[derive(Debug, Clone)]
pub struct CommandCopier {
    pub program: String,
    pub args: Vec<String>,
    pub verify_args: Vec<String>,
}

impl CommandCopier {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        CommandCopier {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            verify_args: Vec::new(),
        }
    }

    pub fn arguments(&self, job: &TransferJob) -> Vec<OsString> {
        let source = job.source_path().as_os_str();
        let destination = job.destination_path().as_os_str();

        let mut template: Vec<&String> = self.args.iter().collect();
        if job.verify_written() {
            template.extend(self.verify_args.iter());
        }

        template
            .into_iter()
            .map(|arg| match arg.as_str() {
                "{source}" => source.to_os_string(),
                "{destination}" => destination.to_os_string(),
                other => OsString::from(
                    other
                        .replace("{source}", &source.to_string_lossy())
                        .replace("{destination}", &destination.to_string_lossy()),
                ),
            })
            .collect()
    }
}

impl BulkCopier for CommandCopier {
    fn name(&self) -> &str {
        &self.program
    }

    fn command(&self, job: &TransferJob) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.arguments(job));
        cmd
    }
}

/// Build the copier described by the configuration.
pub fn from_config(config: &CopierConfig) -> Box<dyn BulkCopier> {
    match config.kind {
        CopierKind::Robocopy => Box::new(Robocopy {
            program: config.resolved_program(),
            threads: config.threads,
            retries: config.retries,
            wait_seconds: config.wait_seconds,
            verify_args: config.verify_args.clone(),
        }),
        CopierKind::Command => Box::new(CommandCopier {
            program: config.resolved_program(),
            args: config.resolved_args(),
            verify_args: config.verify_args.clone(),
        }),
    }
}
