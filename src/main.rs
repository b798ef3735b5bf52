mod config;
mod db;
mod error;
mod models;
mod submit;
mod transport;
mod tui;
mod validate;
mod viewer;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use config::{Config, ConfigArgs};
use db::Database;
use models::{ApplicationForm, StatusFilter};
use std::sync::Arc;
use submit::ApplicationSubmitter;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use transport::{ReqwestTransport, Transport};
use viewer::StatusViewer;

#[derive(Parser)]
#[command(name = "jobboard")]
#[command(about = "Apply to jobs and track your applications from the terminal")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit an application for a job
    Apply {
        /// Job posting identifier
        #[arg(long)]
        job_id: Option<String>,

        /// Your full name
        #[arg(long, default_value = "")]
        name: String,

        /// Contact email
        #[arg(long, default_value = "")]
        email: String,

        /// Contact phone number
        #[arg(long, default_value = "")]
        phone: String,

        /// Resume file name
        #[arg(long, default_value = "")]
        resume: String,

        /// Optional cover letter text
        #[arg(long, default_value = "")]
        cover_letter: String,
    },

    /// List your applications
    Status {
        /// Filter by status
        #[arg(short, long, value_enum, default_value_t = StatusFilter::All)]
        filter: StatusFilter,

        /// Search title, company and location
        #[arg(short, long, default_value = "")]
        search: String,
    },

    /// Browse your applications interactively
    Dashboard,

    /// Save a job for later
    Save {
        /// Job posting identifier
        job_id: String,

        /// Job title
        #[arg(short, long)]
        title: Option<String>,

        /// Company name
        #[arg(short, long)]
        company: Option<String>,
    },

    /// Remove a saved job
    Unsave {
        /// Job posting identifier
        job_id: String,
    },

    /// List saved jobs
    Saved,

    /// List applications submitted from this machine
    History,
}

fn install_cancel_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, cancelling");
            token_clone.cancel();
        }
    });

    token
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_args(&cli.config)?;

    match cli.command {
        Commands::Apply {
            job_id,
            name,
            email,
            phone,
            resume,
            cover_letter,
        } => {
            let form = ApplicationForm {
                full_name: name,
                email,
                phone,
                resume,
                cover_letter,
            };
            apply(&config, job_id.as_deref(), &form).await?;
        }

        Commands::Status { filter, search } => {
            let cancel = install_cancel_handler();
            let mut viewer = build_viewer(&config)?;
            let _ = viewer.refresh(config.token.as_deref(), &cancel).await;
            print_status(&viewer, filter, &search);
        }

        Commands::Dashboard => {
            let cancel = install_cancel_handler();
            let mut viewer = build_viewer(&config)?;
            let _ = viewer.refresh(config.token.as_deref(), &cancel).await;
            let handle = tokio::runtime::Handle::current();
            let token = config.token.as_deref();
            tokio::task::block_in_place(|| tui::run_dashboard(&mut viewer, token, &cancel, &handle))?;
        }

        Commands::Save {
            job_id,
            title,
            company,
        } => {
            let db = open_db(&config)?;
            let existed = db.is_saved(&job_id)?;
            db.save_job(&job_id, title.as_deref(), company.as_deref())?;
            if existed {
                println!("Job {} was already saved, details updated.", job_id);
            } else {
                println!("Saved job {}.", job_id);
            }
        }

        Commands::Unsave { job_id } => {
            let db = open_db(&config)?;
            if db.unsave_job(&job_id)? {
                println!("Removed job {} from saved jobs.", job_id);
            } else {
                println!("Job {} was not saved.", job_id);
            }
        }

        Commands::Saved => {
            let db = open_db(&config)?;
            let jobs = db.list_saved_jobs()?;
            if jobs.is_empty() {
                println!("No saved jobs.");
            } else {
                println!("{:<26} {:<30} {:<20} {:<20}", "JOB", "TITLE", "COMPANY", "SAVED");
                println!("{}", "-".repeat(98));
                for job in jobs {
                    println!(
                        "{:<26} {:<30} {:<20} {:<20}",
                        truncate(&job.job_id, 24),
                        truncate(&job.title.unwrap_or_default(), 28),
                        truncate(&job.company.unwrap_or_default(), 18),
                        job.saved_at
                    );
                }
            }
        }

        Commands::History => {
            let db = open_db(&config)?;
            let subs = db.list_submissions()?;
            if subs.is_empty() {
                println!("No submissions recorded.");
            } else {
                println!("{:<26} {:<26} {:<6} {:<20}", "APPLICATION", "JOB", "MODE", "SUBMITTED");
                println!("{}", "-".repeat(80));
                for sub in subs {
                    println!(
                        "{:<26} {:<26} {:<6} {:<20}",
                        truncate(&sub.application_id, 24),
                        truncate(&sub.job_id, 24),
                        if sub.fallback { "test" } else { "live" },
                        sub.submitted_at
                    );
                }
            }
        }
    }

    Ok(())
}

fn build_transport(config: &Config) -> Result<Arc<dyn Transport>> {
    let transport = ReqwestTransport::new(config.timeout).context("Failed to build HTTP client")?;
    Ok(Arc::new(transport))
}

fn build_viewer(config: &Config) -> Result<StatusViewer> {
    Ok(StatusViewer::new(
        build_transport(config)?,
        config.endpoints.read.clone(),
        config.timeout,
    ))
}

fn open_db(config: &Config) -> Result<Database> {
    let db = Database::open(&config.db_path)?;
    db.init()?;
    tracing::debug!(path = %db.path().display(), "database ready");
    Ok(db)
}

async fn apply(config: &Config, job_id: Option<&str>, form: &ApplicationForm) -> Result<()> {
    let submitter = ApplicationSubmitter::new(
        build_transport(config)?,
        config.endpoints.submit.clone(),
        config.endpoints.fallback.clone(),
        config.timeout,
    );
    let cancel = install_cancel_handler();

    let outcome = match submitter.submit(job_id, form, &cancel).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(errors) = e.field_errors() {
                println!("Please correct the following:");
                for (field, message) in errors.iter() {
                    println!("  {:<10} {}", field.key(), message);
                }
                return Err(anyhow!("Application not submitted"));
            }
            return Err(anyhow!("Application not submitted: {}", e));
        }
    };

    if let Some(notice) = outcome.notice {
        println!("Notice: {}", notice);
    }
    println!("Application submitted (ID: {})", outcome.application_id);

    // The job id was validated by the submitter
    let job_id = job_id.map(str::trim).unwrap_or_default();
    match open_db(config).and_then(|db| db.record_submission(&outcome.application_id, job_id, outcome.fallback_used)) {
        Ok(()) => {}
        Err(e) => tracing::warn!(error = %e, "could not record submission locally"),
    }

    if let Some(route) = outcome.route {
        println!("Confirmation: {}", route);
    }

    Ok(())
}

fn print_status(viewer: &StatusViewer, filter: StatusFilter, search: &str) {
    if viewer.is_sample() {
        println!("Showing sample data. Your applications could not be loaded.");
    }
    if let Some(e) = viewer.last_error() {
        println!("Error: {}", e);
    }

    let rows = viewer.rows(filter, search);
    if rows.is_empty() {
        println!("No applications found.");
        return;
    }

    println!("{:<26} {:<10} {:<28} {:<20} {:<18} {:>10}", "ID", "STATUS", "TITLE", "COMPANY", "LOCATION", "APPLIED");
    println!("{}", "-".repeat(117));
    for row in rows {
        println!(
            "{:<26} {:<10} {:<28} {:<20} {:<18} {:>10}",
            truncate(&row.id, 24),
            row.status,
            truncate(&row.title, 26),
            truncate(&row.company, 18),
            truncate(&row.location, 16),
            row.date
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
