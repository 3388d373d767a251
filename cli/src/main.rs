//! migrate - Command-line front end for the migration engine.
//!
//! Copies user folders with the bulk copier, verifies the result, and
//! reports per-folder status. Exit codes:
//! - 0: every job copied and verified
//! - 1: at least one job failed or did not verify
//! - 2: usage or setup error
//! - 130: cancelled with Ctrl-C

mod display;
mod logging;
mod marker;
mod plan;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use engine::{
    run_batch, BatchSummary, CancellationToken, ChecksumAlgorithm, CopyEngine, EngineConfig,
    ProgressSink, TransferJob,
};

use display::ConsoleSink;
use marker::OriginMarker;

const EXIT_OK: i32 = 0;
const EXIT_FAILED: i32 = 1;
const EXIT_SETUP: i32 = 2;
const EXIT_CANCELLED: i32 = 130;

/// migrate - Move user folders between machines and verify the copy
#[derive(Parser, Debug)]
#[command(name = "migrate")]
#[command(version)]
#[command(about = "Copy user folders between machines and verify the result")]
struct Cli {
    /// Engine settings file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Digest for read-back verification: sha256 or blake3 (overrides the config)
    #[arg(long, global = true, value_name = "ALGORITHM", value_parser = parse_readback)]
    readback: Option<ChecksumAlgorithm>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy one directory tree and verify it
    Copy {
        /// Source directory
        #[arg(long, value_name = "PATH")]
        src: PathBuf,

        /// Destination directory
        #[arg(long, value_name = "PATH")]
        dst: PathBuf,

        /// Name shown in progress and reports (defaults to the source folder name)
        #[arg(long)]
        label: Option<String>,

        /// Re-read written files and compare checksums
        #[arg(long)]
        verify_written: bool,
    },

    /// Compare two directory trees by file count and size
    Verify {
        #[arg(long, value_name = "PATH")]
        src: PathBuf,

        #[arg(long, value_name = "PATH")]
        dst: PathBuf,
    },

    /// Back up profile folders into <DEST>/<machine name>
    Backup {
        /// Backup root (e.g. an external drive)
        #[arg(long, value_name = "PATH")]
        dest: PathBuf,

        /// Profile directory (defaults to the current user's)
        #[arg(long, value_name = "PATH")]
        profile: Option<PathBuf>,

        /// Only back up these folders (repeatable)
        #[arg(long = "folder", value_name = "NAME")]
        folders: Vec<String>,

        /// Folders copied with read-back verification (repeatable)
        #[arg(long = "verify-written-folder", value_name = "NAME")]
        verify_written_folders: Vec<String>,
    },

    /// Restore the folders of a backup into a profile
    Restore {
        /// Backup directory holding the origin marker
        #[arg(long, value_name = "PATH")]
        from: PathBuf,

        /// Profile directory (defaults to the current user's)
        #[arg(long, value_name = "PATH")]
        profile: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nCancelling...");
        handler_token.cancel();
    }) {
        tracing::warn!("Ctrl-C handler unavailable: {}", e);
    }

    let exit_code = match run_cli(&cli, &cancel) {
        Ok(code) => code,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            EXIT_SETUP
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(cli: &Cli, cancel: &CancellationToken) -> Result<i32, String> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(algorithm) = cli.readback {
        config.readback_algorithm = algorithm;
    }
    let sink: Arc<dyn ProgressSink> = Arc::new(ConsoleSink::new(cli.verbose));

    match &cli.command {
        Command::Copy {
            src,
            dst,
            label,
            verify_written,
        } => {
            require_dir(src, "Source")?;
            let label = label.clone().unwrap_or_else(|| folder_label(src));
            let job = TransferJob::new(src, dst, label).with_verify_written(*verify_written);
            let engine = CopyEngine::new(config);
            let summary = run_batch(&engine, &[job], cancel, Some(sink));
            Ok(finish(&summary))
        }

        Command::Verify { src, dst } => {
            require_dir(src, "Source")?;
            require_dir(dst, "Destination")?;
            let result = engine::verify(src, dst);
            eprintln!("{}: {}", result.status, result.message);
            Ok(if result.status.is_verified() {
                EXIT_OK
            } else {
                EXIT_FAILED
            })
        }

        Command::Backup {
            dest,
            profile,
            folders,
            verify_written_folders,
        } => {
            let profile = resolve_profile(profile.as_deref())?;
            require_dir(&profile, "Profile")?;
            let selected = plan::select_folders(folders)?;
            let verify_written = if verify_written_folders.is_empty() {
                Vec::new()
            } else {
                plan::select_folders(verify_written_folders)?
            };

            let backup_dir = dest.join(plan::machine_name());
            fs::create_dir_all(&backup_dir)
                .map_err(|e| format!("Failed to create {}: {}", backup_dir.display(), e))?;

            let (jobs, skipped) =
                plan::backup_jobs(&profile, &backup_dir, &selected, &verify_written);
            if !skipped.is_empty() {
                eprintln!("Not in profile, skipped: {}", skipped.join(", "));
            }
            eprintln!("Backing up to {}", backup_dir.display());

            let engine = CopyEngine::new(config);
            let summary = run_batch(&engine, &jobs, cancel, Some(sink));

            if !summary.was_cancelled() {
                let copied: Vec<String> = summary
                    .reports
                    .iter()
                    .filter(|r| r.outcome.copier_succeeded())
                    .map(|r| r.job.label().to_string())
                    .collect();
                let marker = OriginMarker::new(plan::machine_name(), plan::user_name(), copied);
                let path = marker.write(&backup_dir)?;
                tracing::info!("origin marker written to {}", path.display());
            }
            Ok(finish(&summary))
        }

        Command::Restore { from, profile } => {
            require_dir(from, "Backup")?;
            let marker = OriginMarker::read(from)?;
            let profile = resolve_profile(profile.as_deref())?;
            eprintln!(
                "Restoring backup of {} ({}) taken {}",
                marker.machine,
                marker.user,
                marker.created_at.format("%Y-%m-%d %H:%M")
            );

            let jobs = plan::restore_jobs(from, &marker, &profile);
            let engine = CopyEngine::new(config);
            let summary = run_batch(&engine, &jobs, cancel, Some(sink));
            Ok(finish(&summary))
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, String> {
    match path {
        Some(path) => EngineConfig::load(path).map_err(|e| e.to_string()),
        None => Ok(EngineConfig::default()),
    }
}

fn parse_readback(value: &str) -> Result<ChecksumAlgorithm, String> {
    ChecksumAlgorithm::parse(value).ok_or_else(|| {
        format!(
            "Invalid hash algorithm '{}'. Must be 'sha256' or 'blake3'",
            value
        )
    })
}

fn resolve_profile(profile: Option<&Path>) -> Result<PathBuf, String> {
    match profile {
        Some(path) => Ok(path.to_path_buf()),
        None => plan::default_profile(),
    }
}

fn require_dir(path: &Path, what: &str) -> Result<(), String> {
    if !path.exists() {
        return Err(format!("{} directory does not exist: {}", what, path.display()));
    }
    if !path.is_dir() {
        return Err(format!("{} is not a directory: {}", what, path.display()));
    }
    Ok(())
}

fn folder_label(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("(root)")
        .to_string()
}

fn finish(summary: &BatchSummary) -> i32 {
    display::print_summary(summary);
    exit_code(summary)
}

fn exit_code(summary: &BatchSummary) -> i32 {
    if summary.was_cancelled() {
        EXIT_CANCELLED
    } else if summary.is_clean() {
        EXIT_OK
    } else {
        EXIT_FAILED
    }
}
