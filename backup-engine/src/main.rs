//! Backup Engine - Main entry point
//!
//! Runs the remote console service or manages jobs from the command line.

use anyhow::Result;
use backup_engine::{
    config::Config,
    daemon::shutdown::ShutdownCoordinator,
    guard::{BusinessGuard, Guard},
    models::{BackupJob, BackupType},
    remote::RemoteConsole,
    transfer::progress::{format_bytes, format_duration},
    utils::{self, selection::parse_selection},
    executor::forward_events,
    BackupOrchestrator,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

/// How often the service polls for business software
const GUARD_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Remote console port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the remote console until SIGINT/SIGTERM (default)
    Serve,

    /// Register a backup job
    Add {
        name: String,
        source: PathBuf,
        destination: PathBuf,
        /// full or differential
        #[arg(long = "type", value_parser = parse_backup_type, default_value = "full")]
        backup_type: BackupType,
    },

    /// Delete a backup job
    Remove { name: String },

    /// List registered jobs with their 1-based index
    List,

    /// Run jobs by index, e.g. "1-3;5"
    Run { selection: String },

    /// List log dates, or show the records of one date (YYYY-MM-DD)
    Logs { date: Option<NaiveDate> },

    /// Delete every transfer log
    ClearLogs,
}

fn parse_backup_type(s: &str) -> std::result::Result<BackupType, String> {
    BackupType::parse(s).ok_or_else(|| format!("unknown backup type '{}' (full, differential)", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };
    if let Some(port) = args.port {
        config.remote.port = port;
    }

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!("Starting backup-engine v{}", env!("CARGO_PKG_VERSION"));

    let guard = Arc::new(BusinessGuard::new(config.backup.business_software.clone()));
    let orchestrator = Arc::new(BackupOrchestrator::from_config(&config, guard.clone())?);

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config, orchestrator, guard).await?,
        Commands::Add {
            name,
            source,
            destination,
            backup_type,
        } => {
            let job = BackupJob::new(name.clone(), source, destination, backup_type);
            if orchestrator.register(job).await? {
                println!("Job '{}' added.", name);
            } else {
                println!("Job '{}' already exists, its record was rewritten.", name);
            }
        }
        Commands::Remove { name } => {
            if orchestrator.remove(&name).await? {
                println!("Job '{}' removed.", name);
            } else {
                println!("No job named '{}'.", name);
            }
        }
        Commands::List => list_jobs(&orchestrator).await,
        Commands::Run { selection } => run_selection(&orchestrator, &selection).await,
        Commands::Logs { date } => show_logs(&orchestrator, date),
        Commands::ClearLogs => {
            orchestrator.transfer_log().clear_all();
            println!("Transfer logs cleared.");
        }
    }

    Ok(())
}

async fn serve(config: &Config, orchestrator: Arc<BackupOrchestrator>, guard: Arc<BusinessGuard>) -> Result<()> {
    let shutdown_coordinator = ShutdownCoordinator::new();
    let watcher = tokio::spawn(watch_guard(guard, shutdown_coordinator.token()));

    let addr = format!("{}:{}", config.remote.bind, config.remote.port);
    let console = RemoteConsole::bind(addr.as_str(), Arc::clone(&orchestrator)).await?;
    tracing::info!("Remote console: telnet {}", console.local_addr()?);

    let server_token = shutdown_coordinator.token();
    let server_handle = tokio::spawn(async move { console.run(server_token).await });

    // Wait for shutdown signal
    shutdown_coordinator.wait_for_signal().await;
    shutdown_coordinator.shutdown(&orchestrator);

    // Wait for server to finish (with timeout)
    match tokio::time::timeout(Duration::from_secs(5), server_handle).await {
        Ok(Ok(Ok(()))) => tracing::info!("Server shutdown complete"),
        Ok(Ok(Err(e))) => tracing::error!("Server error during shutdown: {}", e),
        Ok(Err(e)) => tracing::error!("Server task panicked: {}", e),
        Err(_) => tracing::warn!("Server shutdown timeout, forcing exit"),
    }
    let _ = watcher.await;

    Ok(())
}

/// Poll the guard and log its running/not-running transitions.
async fn watch_guard(guard: Arc<BusinessGuard>, shutdown: CancellationToken) {
    let mut changes = guard.subscribe();
    let mut interval = tokio::time::interval(GUARD_POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let guard = Arc::clone(&guard);
                if let Err(e) = tokio::task::spawn_blocking(move || guard.is_running()).await {
                    tracing::warn!("Guard poll failed: {}", e);
                }
            }
            change = changes.recv() => match change {
                Ok(true) => tracing::warn!("Business software started, new backups are blocked"),
                Ok(false) => tracing::info!("Business software closed, backups allowed"),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
        }
    }
}

async fn list_jobs(orchestrator: &BackupOrchestrator) {
    let jobs = orchestrator.jobs().await;
    if jobs.is_empty() {
        println!("No backup jobs registered.");
        return;
    }
    for (index, job) in jobs.iter().enumerate() {
        println!(
            "{:>3}. {} [{}] {} -> {} ({}, {}%, {})",
            index + 1,
            job.name,
            job.backup_type,
            job.source_path.display(),
            job.destination_path.display(),
            job.status,
            job.progress,
            format_bytes(job.total_file_size)
        );
    }
}

async fn run_selection(orchestrator: &BackupOrchestrator, selection: &str) {
    let jobs = orchestrator.jobs().await;
    let names: Vec<String> = parse_selection(selection, jobs.len())
        .into_iter()
        .filter_map(|index| jobs.get(index.checked_sub(1)?))
        .map(|job| job.name.clone())
        .collect();
    if names.is_empty() {
        println!("Selection '{}' matches no job.", selection);
        return;
    }

    let done = CancellationToken::new();
    let printer = tokio::spawn(forward_events(orchestrator.subscribe(), done.clone(), |event| {
        println!("{}", event)
    }));

    let start = Instant::now();
    let reports = orchestrator.execute(names.as_slice()).await;
    done.cancel();
    if let Err(e) = printer.await {
        tracing::warn!("Event printer failed: {}", e);
    }

    for report in &reports {
        match &report.error {
            None => println!("{}: {} ({}%)", report.name, report.status, report.progress),
            Some(error) => println!("{}: {} ({}%) - {}", report.name, report.status, report.progress, error),
        }
    }
    println!("Finished {} job(s) in {}", reports.len(), format_duration(start.elapsed()));
}

fn show_logs(orchestrator: &BackupOrchestrator, date: Option<NaiveDate>) {
    let log = orchestrator.transfer_log();
    let Some(date) = date else {
        let dates = log.list_available_dates();
        if dates.is_empty() {
            println!("No transfer logs.");
        }
        for date in dates {
            println!("{}", date);
        }
        return;
    };

    let records = log.read_records(date);
    if records.is_empty() {
        println!("No transfer records for {}.", date);
    }
    for record in records {
        println!(
            "{} {} {} {} -> {} {} transfer={}ms crypt={}ms{}",
            record.timestamp.format("%H:%M:%S"),
            record.name,
            record.status,
            record.source_file,
            record.target_file,
            format_bytes(record.file_size),
            record.transfer_time,
            record.crypt_time,
            record.message.as_deref().map(|m| format!(" ({})", m)).unwrap_or_default()
        );
    }
}
