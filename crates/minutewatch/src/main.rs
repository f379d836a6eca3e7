use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};

use minutewatch::config::{apply_env_overrides, load_settings, Settings};
use minutewatch::error::{ControllerError, ExportError, MinutewatchError};
use minutewatch::store::{JobFilter, JobStatus, JobStore, NewJobConfig, PageRequest};
use minutewatch::App;

const INTERRUPT_REASON: &str = "Interrupted";

#[derive(Parser)]
#[command(name = "minutewatch")]
#[command(about = "Scan meeting-minutes PDFs for client keywords")]
#[command(version)]
struct Cli {
    /// Settings file (JSON). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scrape job in the foreground and print its outcome
    Scan {
        /// Client whose active keywords are searched
        #[arg(long)]
        client: String,

        /// First month to include (YYYY-MM)
        #[arg(long)]
        from: Option<String>,

        /// Last month to include (YYYY-MM)
        #[arg(long)]
        to: Option<String>,

        /// Scan at most this many pages per document
        #[arg(long)]
        max_pages: Option<u32>,

        /// Also scan agendas
        #[arg(long)]
        agendas: bool,

        /// Skip minutes
        #[arg(long)]
        no_minutes: bool,

        /// Recorded as the job's creator
        #[arg(long, default_value = "cli")]
        created_by: String,

        /// Source page to crawl; replaces the configured sources
        #[arg(long = "source")]
        sources: Vec<String>,
    },

    /// Show a job's status and result count
    Status { job_id: String },

    /// Cancel a pending or running job
    Cancel {
        job_id: String,

        #[arg(long)]
        reason: Option<String>,
    },

    /// List jobs
    Jobs {
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        client: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: u64,

        #[arg(long, default_value_t = 0)]
        offset: u64,
    },

    /// List a job's match results
    Results {
        job_id: String,

        #[arg(long, default_value_t = 100)]
        limit: u64,

        #[arg(long, default_value_t = 0)]
        offset: u64,
    },

    /// Print a job's summary
    Summary { job_id: String },

    /// Export a job's results as CSV
    Export {
        job_id: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Bundle results, metadata and documents into a ZIP artifact
    Artifact { job_id: String },

    /// Annotate a job's matched documents
    Highlight { job_id: String },

    /// Delete a job's stored files
    Cleanup {
        job_id: String,

        #[arg(long)]
        include_artifacts: bool,
    },

    /// Delete job directories older than the retention windows
    Sweep,

    /// Show storage usage
    Stats,

    /// Register an active keyword for a client
    AddKeyword { client: String, keyword: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), MinutewatchError> {
    let json = serde_json::to_string_pretty(value).map_err(ExportError::from)?;
    println!("{}", json);
    Ok(())
}

fn load(cli: &Cli) -> Result<Settings, MinutewatchError> {
    let settings = match &cli.config {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };
    Ok(apply_env_overrides(settings))
}

async fn run(cli: Cli, mut settings: Settings) -> Result<ExitCode, MinutewatchError> {
    if let Commands::Scan { sources, .. } = &cli.command {
        if !sources.is_empty() {
            settings.sources = sources.clone();
        }
    }
    let app = Arc::new(App::open(&settings)?);

    match cli.command {
        Commands::Scan {
            client,
            from,
            to,
            max_pages,
            agendas,
            no_minutes,
            created_by,
            ..
        } => {
            let config = NewJobConfig {
                date_from: from,
                date_to: to,
                max_pages,
                include_minutes: !no_minutes,
                include_agendas: agendas,
            };
            let (job, handle) = app.controller.submit(&client, &config, &created_by)?;
            info!(job_id = %job.id, "Scan started");

            let handler_app = Arc::clone(&app);
            let job_id = job.id.clone();
            if let Err(e) = ctrlc::set_handler(move || {
                if let Err(e) = handler_app.controller.cancel(&job_id, Some(INTERRUPT_REASON)) {
                    warn!(error = %e, "Failed to cancel on interrupt");
                }
            }) {
                warn!(error = %e, "Could not install interrupt handler");
            }

            let outcome = handle.join().await?;
            print_json(&outcome)?;
            if let Some(summary) = app.results.summary(&job.id)? {
                print_json(&summary)?;
            }
            return Ok(match outcome.status {
                JobStatus::Completed => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            });
        }
        Commands::Status { job_id } => print_json(&app.controller.status(&job_id)?)?,
        Commands::Cancel { job_id, reason } => {
            let cancelled = app.controller.cancel(&job_id, reason.as_deref())?;
            print_json(&serde_json::json!({ "jobId": job_id, "cancelled": cancelled }))?;
        }
        Commands::Jobs {
            status,
            client,
            limit,
            offset,
        } => {
            let status = match status.as_deref() {
                Some(s) => Some(JobStatus::parse(s).ok_or_else(|| {
                    MinutewatchError::Store(minutewatch::StoreError::Invalid(format!(
                        "unknown status '{}'",
                        s
                    )))
                })?),
                None => None,
            };
            let filter = JobFilter {
                status,
                client_id: client,
                created_by: None,
                limit: Some(limit),
                offset: Some(offset),
            };
            print_json(&app.store.list_jobs(&filter)?)?;
        }
        Commands::Results {
            job_id,
            limit,
            offset,
        } => print_json(&app.results.list_results(&job_id, PageRequest::new(limit, offset))?)?,
        Commands::Summary { job_id } => match app.results.summary(&job_id)? {
            Some(summary) => print_json(&summary)?,
            None => return Err(ControllerError::JobNotFound(job_id).into()),
        },
        Commands::Export { job_id, output } => {
            let Some(csv) = app.results.export_csv(&job_id)? else {
                return Err(ExportError::JobNotFound(job_id).into());
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, csv).map_err(|e| minutewatch::StorageError::WriteFile {
                        path: path.clone(),
                        source: e,
                    })?;
                    info!(path = %path.display(), "CSV written");
                }
                None => print!("{}", csv),
            }
        }
        Commands::Artifact { job_id } => print_json(&app.results.generate_artifact(&job_id)?)?,
        Commands::Highlight { job_id } => {
            let highlighter = &app.highlighter;
            let batch = highlighter.highlight_job(app.store.as_ref(), &job_id)?;
            print_json(&batch)?;
            if batch.files_failed > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Cleanup {
            job_id,
            include_artifacts,
        } => print_json(&app.storage.cleanup_job(&job_id, include_artifacts)?)?,
        Commands::Sweep => {
            let report = app.storage.sweep_expired();
            print_json(&report)?;
            if !report.errors.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Stats => print_json(&app.storage.usage_stats())?,
        Commands::AddKeyword { client, keyword } => print_json(&app.store.add_keyword(&client, &keyword)?)?,
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = minutewatch::logging::init(&settings.logging) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli, settings).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
