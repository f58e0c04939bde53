//! media-grab - fetch remote media into a local folder
//!
//! A thin CLI over the download service: single downloads, background
//! batches, and metadata lookups, all through yt-dlp.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use media_grab::core::invoker::is_command_available;
use media_grab::storage::config;
use media_grab::types::{BatchJob, DownloadRequest, ItemStatus, JobState};
use media_grab::utils::paths::get_config_path;
use media_grab::{BatchRunner, DownloadService, FetchError, JobStore};
use tracing::{debug, warn};

/// Fetch remote media into a local folder, with retries and friendly errors.
#[derive(Parser, Debug)]
#[command(name = "media-grab")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a single URL
    Download {
        url: String,

        /// Format selector passed to the tool ("best" picks per platform)
        #[arg(short, long, default_value = "best")]
        format: String,
    },

    /// Download several URLs one after another
    Batch {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Show title, uploader and available formats
    Info { url: String },

    /// Print the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

fn init_tracing(cli: &Cli) {
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_error(e: &FetchError) {
    eprintln!("{} {}", "Error:".red(), e);
    if let FetchError::Tool { raw_detail, .. } = e {
        debug!(detail = %raw_detail, "Tool stderr");
    }
}

fn print_job_summary(job: &BatchJob) {
    for item in &job.items {
        match item.status {
            ItemStatus::Succeeded => println!(
                "{} {} {}",
                "✓".green(),
                item.url,
                item.filename.as_deref().unwrap_or("").dimmed()
            ),
            ItemStatus::Failed => println!(
                "{} {} {}",
                "✗".red(),
                item.url,
                item.error.as_deref().unwrap_or("").dimmed()
            ),
            _ => println!("{} {}", "·".yellow(), item.url),
        }
    }
    println!(
        "{} {} succeeded, {} failed",
        "Batch finished:".bold(),
        job.count(ItemStatus::Succeeded),
        job.count(ItemStatus::Failed)
    );
}

/// Any failed item makes the whole batch exit non-zero
fn batch_failed(job: &BatchJob) -> bool {
    job.count(ItemStatus::Failed) > 0
}

async fn follow_batch(runner: &BatchRunner, job_id: &str) -> Option<BatchJob> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));

    let job = loop {
        let job = runner.store().get(job_id)?;
        let done = job.total() - job.count(ItemStatus::Pending) - job.count(ItemStatus::Running);
        spinner.set_message(format!("Downloading... {}/{}", done, job.total()));
        if job.state() == JobState::Completed {
            break job;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    };

    spinner.finish_and_clear();
    Some(job)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let cfg = config::load_config().await?;
    debug!(?cfg, "Configuration loaded");

    if let Command::Config { init } = cli.command {
        if init {
            config::save_config(&cfg).await?;
            println!("{} {}", "✓ Wrote".green(), get_config_path());
        }
        println!("{} {}", "Config file:".dimmed(), get_config_path());
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(ExitCode::SUCCESS);
    }

    let service = DownloadService::new(&cfg)?;
    let program = service.invoker().tool().program().to_string();
    if !is_command_available(&program).await {
        warn!("{} was not found in PATH", program);
        eprintln!("{} {} not found. Please install it.", "Warning:".yellow(), program);
    }

    match cli.command {
        Command::Download { url, format } => {
            let request = DownloadRequest::new(url).with_format(format);
            match service.download(&request).await {
                Ok(outcome) => {
                    println!("{} {}", "✓ Downloaded:".green(), outcome.title);
                    println!("{} {}", "File:".dimmed(), outcome.filename);
                    println!("{} {}", "Served at:".dimmed(), outcome.download_url);
                }
                Err(e) => {
                    print_error(&e);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }

        Command::Batch { urls } => {
            let runner = BatchRunner::new(service, JobStore::new(cfg.max_retained_jobs));
            let ack = runner.start_batch(Some(urls))?;
            println!("{} {}", ack.message.cyan(), format!("[{}]", ack.job_id).dimmed());

            match follow_batch(&runner, &ack.job_id).await {
                Some(job) => {
                    print_job_summary(&job);
                    if batch_failed(&job) {
                        return Ok(ExitCode::FAILURE);
                    }
                }
                None => {
                    eprintln!("{} batch record was lost", "Error:".red());
                    return Ok(ExitCode::FAILURE);
                }
            }
        }

        Command::Info { url } => match service.info(&url).await {
            Ok(info) => {
                println!("{}", info.title.bold());
                if !info.uploader.is_empty() {
                    println!("{} {}", "Uploader:".dimmed(), info.uploader);
                }
                if let Some(secs) = info.duration {
                    let secs = secs.round() as u64;
                    println!("{} {}:{:02}", "Duration:".dimmed(), secs / 60, secs % 60);
                }
                for f in &info.formats {
                    println!(
                        "  {:<8} {:<6} {:<10} {:<8} {}",
                        f.format_id, f.ext, f.quality, f.resolution, f.filesize
                    );
                }
            }
            Err(e) => {
                print_error(&e);
                return Ok(ExitCode::FAILURE);
            }
        },

        Command::Config { .. } => {}
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use media_grab::types::BatchItem;

    fn job(statuses: &[ItemStatus]) -> BatchJob {
        BatchJob {
            id: "j".into(),
            created_at: Utc::now(),
            finished_at: Some(Utc::now()),
            items: statuses
                .iter()
                .map(|&status| BatchItem {
                    url: "https://example.org/v".into(),
                    status,
                    filename: None,
                    error: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_batch_failed() {
        assert!(!batch_failed(&job(&[ItemStatus::Succeeded, ItemStatus::Succeeded])));
        assert!(batch_failed(&job(&[ItemStatus::Succeeded, ItemStatus::Failed])));
    }
}
