use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use clinical_ingest::app::ingest_use_case::{BatchMode, BatchReport, IngestUseCase};
use clinical_ingest::app::session::{Job, Session};
use clinical_ingest::config::Config;
use clinical_ingest::constants::{ERROR_LOG_FILE_NAME, LEDGER_FILE_NAME};
use clinical_ingest::correlation::CorrelationIdGenerator;
use clinical_ingest::error_report::{read_error_entries, ErrorReporter};
use clinical_ingest::infra::connector::ConfiguredConnector;
use clinical_ingest::infra::fs_storage::FsArtifactStore;
use clinical_ingest::ledger::ProcessedLedger;
use clinical_ingest::logging;
use clinical_ingest::status::{StatusLevel, StatusLine, StatusSink, WorkerEvent};
use clinical_ingest::validation::{validate_content, validate_filename};

#[derive(Parser)]
#[command(name = "clinical_ingest")]
#[command(about = "Clinical trial data file validator and ingester")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List candidate files on the remote server
    List {
        /// Only show names containing this text (case-insensitive)
        #[arg(long)]
        filter: Option<String>,
    },
    /// Validate remote files without archiving them
    Validate {
        /// File names to validate; all remote files when omitted
        names: Vec<String>,
    },
    /// Validate remote files and archive or quarantine them
    Process {
        /// File names to process; all remote files when omitted
        names: Vec<String>,
    },
    /// Validate a local file
    Check {
        path: PathBuf,
    },
    /// Show the most recent entries of the error report
    Errors {
        #[arg(long, default_value_t = 20)]
        tail: usize,
    },
}

/// Prints status lines straight to stdout
struct ConsoleSink;

impl StatusSink for ConsoleSink {
    fn push(&self, line: StatusLine) {
        print_line(&line);
    }
}

fn print_line(line: &StatusLine) {
    let tag = match line.level {
        StatusLevel::Error => "ERR ",
        StatusLevel::Warning => "WARN",
        _ => "    ",
    };
    println!("[{}] {} {}", Local::now().format("%H:%M:%S"), tag, line.message);
}

fn build_session(config: &Config) -> anyhow::Result<Session> {
    let dirs = &config.directories;
    let store = Arc::new(FsArtifactStore::new(dirs).context("creating storage directories")?);
    let ledger = ProcessedLedger::load(dirs.download.join(LEDGER_FILE_NAME))?;
    let ids = CorrelationIdGenerator::from_config(&config.correlation)?;
    let reporter = ErrorReporter::new(dirs.errors.join(ERROR_LOG_FILE_NAME), ids);
    info!(ledger_entries = ledger.len(), "ledger loaded");

    let use_case = IngestUseCase::new(store, ledger, reporter);
    let connector = Arc::new(ConfiguredConnector::new(config.remote.clone()));
    Ok(Session::new(connector, use_case))
}

/// Act as the interactive surface: start the job and print every status
/// line until the worker signals completion.
async fn drive(session: &mut Session, job: Job) -> anyhow::Result<BatchReport> {
    let mut rx = session.start(job)?;
    while let Some(event) = rx.recv().await {
        session.observe(&event);
        match event {
            WorkerEvent::Status(line) => print_line(&line),
            WorkerEvent::Finished(report) => return Ok(report),
        }
    }
    anyhow::bail!("worker stopped without reporting completion")
}

fn check_local_file(path: &Path) -> anyhow::Result<bool> {
    let sink = ConsoleSink;
    let name = path.file_name().unwrap_or(path.as_os_str());
    if !validate_filename(name, Some(&sink)) {
        return Ok(false);
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let result = validate_content(file, Some(&sink));
    for diagnostic in &result.diagnostics {
        sink.error(&format!("    • {}", diagnostic));
    }
    if result.is_valid {
        sink.success(&format!("✅ VALID: {} records", result.valid_record_count));
    } else {
        sink.error(&format!(
            "❌ INVALID: {} errors, {} valid records",
            result.diagnostics.len(),
            result.valid_record_count
        ));
    }
    Ok(result.is_valid)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let _log_guard = logging::init_logging(&config.logging.dir);

    let job = match cli.command {
        Commands::Check { path } => {
            let valid = check_local_file(&path)?;
            return Ok(if valid { ExitCode::SUCCESS } else { ExitCode::FAILURE });
        }
        Commands::Errors { tail } => {
            let path = config.directories.errors.join(ERROR_LOG_FILE_NAME);
            let entries = read_error_entries(&path, tail)?;
            if entries.is_empty() {
                println!("No errors recorded in {}", path.display());
            }
            for entry in entries {
                println!("{}", entry);
            }
            return Ok(ExitCode::SUCCESS);
        }
        Commands::List { filter } => Job::new(BatchMode::List).with_filter(filter),
        Commands::Validate { names } => Job::new(BatchMode::Validate).with_selection(names),
        Commands::Process { names } => Job::new(BatchMode::Process).with_selection(names),
    };

    let mut session = build_session(&config)?;
    let report = drive(&mut session, job).await;
    session.disconnect().await;
    let report = report?;

    if let Some(reason) = &report.halted {
        error!(reason = %reason, "batch halted");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
