use facelock::{
    AuthOutcome, Config, DataLayout, DefaultFaceLock, EnrollReport, Identity, IdentityStatus,
    ImageDirSource, Report, RunMode, SampleSource, TrainingReport,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "facelock")]
#[command(about = "Face-gated per-identity file encryption")]
struct Cli {
    /// Configuration file (defaults to configs/facelock.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Data directory, overrides storage.data_dir
    #[arg(long, global = true, value_name = "DIR", conflicts_with = "user_data")]
    data_dir: Option<PathBuf>,

    /// Keep data in the per-user platform data directory
    #[arg(long, global = true)]
    user_data: bool,

    /// Debug logging with source locations
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Read frames from the image files in this directory
    #[arg(long, value_name = "DIR", required_unless_present = "camera", conflicts_with = "camera")]
    frames: Option<PathBuf>,

    /// Capture frames from the configured V4L2 camera
    #[arg(long)]
    camera: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture samples for an identity
    Enroll {
        identity: String,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Retrain the model on every enrolled sample
    Train,
    /// Authenticate against the trained model
    Authenticate {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Authenticate, then encrypt a file or directory in place
    Protect {
        path: PathBuf,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Authenticate, then decrypt a file or directory in place
    Unprotect {
        path: PathBuf,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// List enrolled identities
    Identities,
}

const EXIT_UNMATCHED: u8 = 1;
const EXIT_PARTIAL: u8 = 2;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let mode = if cli.user_data {
        RunMode::User
    } else {
        RunMode::Local(cli.data_dir.clone().unwrap_or_else(|| config.storage.data_dir.clone()))
    };
    let layout = DataLayout::from_mode(mode)?;
    let mut lock = DefaultFaceLock::open(config, layout)?;

    match &cli.command {
        Commands::Enroll { identity, source } => {
            let identity = Identity::new(identity.as_str())?;
            let mut source = open_source(source, lock.config())?;
            let report = lock.enroll(&identity, source.as_mut())?;
            emit(cli.json, &report, print_enroll)?;
        }
        Commands::Train => {
            let report = lock.train()?;
            emit(cli.json, &report, print_training)?;
        }
        Commands::Authenticate { source } => {
            let mut source = open_source(source, lock.config())?;
            let outcome = lock.authenticate(source.as_mut())?;
            emit(cli.json, &outcome, print_outcome)?;
            if !outcome.is_matched() {
                return Ok(ExitCode::from(EXIT_UNMATCHED));
            }
        }
        Commands::Protect { path, source } | Commands::Unprotect { path, source } => {
            let mut source = open_source(source, lock.config())?;
            let outcome = lock.authenticate(source.as_mut())?;
            if !outcome.is_matched() {
                emit(cli.json, &outcome, print_outcome)?;
                return Ok(ExitCode::from(EXIT_UNMATCHED));
            }

            let report = if matches!(cli.command, Commands::Protect { .. }) {
                lock.protect(path)
            } else {
                lock.unprotect(path)
            }
            .with_context(|| format!("failed to process {}", path.display()))?;

            emit(cli.json, &report, print_report)?;
            if !report.is_complete() {
                return Ok(ExitCode::from(EXIT_PARTIAL));
            }
        }
        Commands::Identities => {
            let identities = lock.identities()?;
            emit(cli.json, &identities, |list: &Vec<IdentityStatus>| print_identities(list))?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbose: bool) {
    if verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn open_source(args: &SourceArgs, config: &Config) -> Result<Box<dyn SampleSource>> {
    if args.camera {
        #[cfg(feature = "camera")]
        {
            return Ok(Box::new(facelock::CameraSource::new(&config.camera)?));
        }
        #[cfg(not(feature = "camera"))]
        {
            let _ = config;
            anyhow::bail!("built without camera support; rebuild with --features camera or use --frames");
        }
    }

    let dir = args.frames.as_deref().context("either --frames or --camera is required")?;
    Ok(Box::new(ImageDirSource::open(dir)?))
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl Fn(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn print_enroll(report: &EnrollReport) {
    println!(
        "Enrolled {}: {}/{} samples ({} frames, {} rejected)",
        report.identity, report.captured, report.target, report.frames, report.rejected
    );
    if !report.is_complete() {
        println!("Enrollment incomplete; run enroll again to add samples");
    }
}

fn print_training(report: &TrainingReport) {
    println!(
        "Trained on {} samples at {}",
        report.total_samples,
        report.trained_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for entry in &report.identities {
        println!("  [{}] {} ({} samples)", entry.label, entry.identity, entry.samples);
    }
}

fn print_outcome(outcome: &AuthOutcome) {
    match outcome {
        AuthOutcome::Matched(m) => println!(
            "Authenticated as {} (distance {:.2}, attempt {})",
            m.identity, m.distance, m.attempts
        ),
        AuthOutcome::Unmatched { attempts, best_distance, cancelled } => {
            let best = best_distance.map_or_else(|| "none".to_string(), |d| format!("{:.2}", d));
            let reason = if *cancelled { "cancelled" } else { "no match" };
            println!("Not authenticated: {} after {} attempts (best distance {})", reason, attempts, best);
        }
    }
}

fn print_report(report: &Report) {
    println!(
        "{} {}: {} succeeded, {} failed",
        report.operation,
        report.root.display(),
        report.success_count(),
        report.failure_count()
    );
    for failure in &report.failed {
        println!("  {:?} {}: {}", failure.kind, relative(&failure.path, &report.root), failure.message);
    }
    for path in &report.skipped {
        println!("  skipped {} (data directory)", relative(path, &report.root));
    }
}

fn print_identities(list: &[IdentityStatus]) {
    if list.is_empty() {
        println!("No identities enrolled");
        return;
    }
    for status in list {
        let key = if status.has_key { "key" } else { "no key" };
        println!("{:<24} {:>4} samples  {}", status.identity, status.samples, key);
    }
}

fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .ok()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(path)
        .display()
        .to_string()
}
