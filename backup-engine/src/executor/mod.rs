//! Backup orchestrator - owns the job registry and drives execution.
//!
//! Jobs of one `execute` call run strictly one after another, priority jobs
//! first. Each file is copied (or encrypted), hashed, logged and accounted
//! before the next one starts. The business-software guard is consulted
//! before every job and every file; a per-job cancellation token is polled at
//! the same boundaries.

mod events;
mod tokens;

pub use events::{forward_events, BackupEvent, JobReport};

use crate::config::{has_listed_extension, BackupSettings, Config};
use crate::crypto::EncryptionCoordinator;
use crate::fs::digest::file_digest_async;
use crate::fs::metadata;
use crate::fs::paths::{expand_home, validate_destination, validate_source};
use crate::fs::walker::{any_file, total_size, walk_directory, FileInfo};
use crate::guard::Guard;
use crate::journal::{open_transfer_log, TransferLog};
use crate::models::{BackupJob, BackupStatus, BackupType, JobState, TransferInfo};
use crate::store::{JobStateStore, JobStore};
use crate::transfer::progress::JobProgress;
use crate::{EngineError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::{Duration, Instant};
use tokens::TokenSet;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Maximum number of queued events per subscriber
const EVENT_CAPACITY: usize = 1000;

const GUARD_BLOCKED: &str = "Business software is running, backup not started";
const GUARD_INTERRUPTED: &str = "Business software detected, backup interrupted";
const GUARD_CANCELLED: &str = "Business software detected, remaining backups cancelled";
const STOPPED: &str = "Backup stopped";
const STOPPED_BEFORE_START: &str = "Backup stopped before it started";

/// Collaborators the orchestrator is built from
pub struct OrchestratorParts {
    pub settings: BackupSettings,
    pub guard: Arc<dyn Guard>,
    pub transfer_log: Arc<dyn TransferLog>,
    pub state_store: Arc<JobStateStore>,
    pub job_store: JobStore,
    pub encryption: EncryptionCoordinator,
}

pub struct BackupOrchestrator {
    jobs: RwLock<Vec<BackupJob>>,
    settings: StdRwLock<BackupSettings>,
    guard: Arc<dyn Guard>,
    transfer_log: StdRwLock<Arc<dyn TransferLog>>,
    /// Where a replacement transfer log opens when the format changes
    log_dir: Option<PathBuf>,
    state_store: Arc<JobStateStore>,
    job_store: JobStore,
    encryption: EncryptionCoordinator,
    events: broadcast::Sender<BackupEvent>,
    /// Held for the whole of one `execute` call
    run_lock: Mutex<()>,
    running: TokenSet<String>,
    batches: TokenSet<u64>,
    next_batch: AtomicU64,
}

impl BackupOrchestrator {
    /// Build from explicit collaborators and load the persisted jobs.
    pub fn new(parts: OrchestratorParts) -> Result<Self> {
        let jobs = parts.job_store.load_all()?;
        parts.guard.set_denylist(parts.settings.business_software.clone());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            jobs: RwLock::new(jobs),
            settings: StdRwLock::new(parts.settings),
            guard: parts.guard,
            transfer_log: StdRwLock::new(parts.transfer_log),
            log_dir: None,
            state_store: parts.state_store,
            job_store: parts.job_store,
            encryption: parts.encryption,
            events,
            run_lock: Mutex::new(()),
            running: TokenSet::new(),
            batches: TokenSet::new(),
            next_batch: AtomicU64::new(0),
        })
    }

    /// Build the on-disk layout under `engine.data_dir`:
    /// `jobs/`, `state/state.json` and `logs/daily/`.
    pub fn from_config(config: &Config, guard: Arc<dyn Guard>) -> Result<Self> {
        let data_dir = expand_home(&config.engine.data_dir);
        let log_dir = data_dir.join("logs").join("daily");
        info!("Using data directory {}", data_dir.display());

        let parts = OrchestratorParts {
            settings: config.backup.clone(),
            guard,
            transfer_log: open_transfer_log(config.backup.log_format, &log_dir)?,
            state_store: Arc::new(JobStateStore::open(data_dir.join("state").join("state.json"))?),
            job_store: JobStore::open(data_dir.join("jobs"))?,
            encryption: EncryptionCoordinator::new(&config.encryption),
        };

        let mut orchestrator = Self::new(parts)?;
        orchestrator.log_dir = Some(log_dir);
        Ok(orchestrator)
    }

    /// Subscribe to progress and completion events
    pub fn subscribe(&self) -> broadcast::Receiver<BackupEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> BackupSettings {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn transfer_log(&self) -> Arc<dyn TransferLog> {
        self.transfer_log
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn state_store(&self) -> &JobStateStore {
        &self.state_store
    }

    /// Replace the settings. The guard denylist follows; a new log format
    /// swaps the transfer log writer.
    pub fn update_settings(&self, settings: BackupSettings) {
        self.guard.set_denylist(settings.business_software.clone());
        let new_format = settings.log_format;

        let format_changed = {
            let mut current = self
                .settings
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let changed = current.log_format != new_format;
            *current = settings;
            changed
        };

        if let (true, Some(dir)) = (format_changed, self.log_dir.as_ref()) {
            match open_transfer_log(new_format, dir) {
                Ok(log) => {
                    *self
                        .transfer_log
                        .write()
                        .unwrap_or_else(|poisoned| poisoned.into_inner()) = log;
                    info!("Transfer log format switched to {:?}", new_format);
                }
                Err(e) => warn!("Keeping previous transfer log, cannot open new one: {}", e),
            }
        }
    }

    /// Add `job` unless its name is taken. The durable record is written either way.
    pub async fn register(&self, job: BackupJob) -> Result<bool> {
        let added = {
            let mut jobs = self.jobs.write().await;
            if jobs.iter().any(|j| j.name == job.name) {
                false
            } else {
                jobs.push(job.clone());
                true
            }
        };

        self.job_store.save(&job)?;
        if added {
            info!(job = %job.name, "Registered {} backup job", job.backup_type);
        }
        Ok(added)
    }

    /// Drop `name` from the registry and delete its record. Unknown names are a no-op.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        let removed = {
            let mut jobs = self.jobs.write().await;
            let before = jobs.len();
            jobs.retain(|j| j.name != name);
            jobs.len() != before
        };

        if removed {
            self.job_store.delete(name)?;
            info!(job = %name, "Removed backup job");
        }
        Ok(removed)
    }

    pub async fn jobs(&self) -> Vec<BackupJob> {
        self.jobs.read().await.clone()
    }

    pub async fn job(&self, name: &str) -> Option<BackupJob> {
        self.jobs.read().await.iter().find(|j| j.name == name).cloned()
    }

    /// Ask the running job `name` to stop at its next file boundary.
    pub fn stop(&self, name: &str) -> bool {
        let stopped = self.running.cancel(&name.to_string());
        if stopped {
            info!(job = %name, "Stop requested");
        } else {
            debug!(job = %name, "Stop requested but job is not running");
        }
        stopped
    }

    /// Stop the running job and every job still queued in any `execute` call.
    pub fn stop_all(&self) -> usize {
        let batches = self.batches.cancel_all();
        if batches > 0 {
            info!("Stop requested for {} execution batch(es)", batches);
        }
        batches
    }

    /// Run the named jobs. Unknown names are dropped, duplicates run once.
    ///
    /// Returns one report per resolved job, in execution order.
    pub async fn execute<S: AsRef<str>>(&self, names: &[S]) -> Vec<JobReport> {
        let requested = self.resolve(names).await;
        if requested.is_empty() {
            debug!("No known jobs requested");
            return Vec::new();
        }

        if self.business_software_running().await {
            warn!("Business software running, refusing {} job(s)", requested.len());
            let mut reports = Vec::with_capacity(requested.len());
            for job in &requested {
                reports.push(self.refuse(&job.name, GUARD_BLOCKED).await);
            }
            return reports;
        }

        let batch = CancellationToken::new();
        let batch_id = self.next_batch.fetch_add(1, Ordering::Relaxed);
        let _batch_lease = self.batches.lease(batch_id, batch.clone());
        let _run = self.run_lock.lock().await;

        let ordered = self.prioritize(requested);
        info!("Executing {} job(s)", ordered.len());

        let mut reports = Vec::with_capacity(ordered.len());
        let mut remaining = ordered.into_iter();
        while let Some(job) = remaining.next() {
            if batch.is_cancelled() {
                reports.push(
                    self.finish(&job.name, BackupStatus::Stopped, &JobProgress::new(0, 0), STOPPED_BEFORE_START)
                        .await,
                );
                continue;
            }

            if self.business_software_running().await {
                warn!("Business software detected, cancelling remaining jobs");
                for job in std::iter::once(job).chain(remaining.by_ref()) {
                    reports.push(
                        self.finish(&job.name, BackupStatus::Cancelled, &JobProgress::new(0, 0), GUARD_CANCELLED)
                            .await,
                    );
                }
                break;
            }

            reports.push(self.run_job(job, batch.child_token()).await);
        }

        reports
    }

    /// Ask the guard off the async workers; a process scan blocks.
    async fn business_software_running(&self) -> bool {
        let guard = Arc::clone(&self.guard);
        match tokio::task::spawn_blocking(move || guard.is_running()).await {
            Ok(running) => running,
            Err(e) => {
                error!("Guard check panicked, treating as not running: {}", e);
                false
            }
        }
    }

    async fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Vec<BackupJob> {
        let jobs = self.jobs.read().await;
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();

        for name in names {
            let name = name.as_ref();
            if !seen.insert(name.to_string()) {
                continue;
            }
            match jobs.iter().find(|j| j.name == name) {
                Some(job) => resolved.push(job.clone()),
                None => debug!(job = %name, "Ignoring unknown job"),
            }
        }
        resolved
    }

    /// Priority jobs first, input order kept within each group.
    fn prioritize(&self, jobs: Vec<BackupJob>) -> Vec<BackupJob> {
        let extensions = self.settings().priority_extensions;
        if extensions.is_empty() {
            return jobs;
        }

        let (mut priority, regular): (Vec<_>, Vec<_>) = jobs.into_iter().partition(|job| {
            any_file(&expand_home(&job.source_path), |path| {
                has_listed_extension(path, &extensions)
            })
        });
        if !priority.is_empty() {
            debug!("{} priority job(s) moved ahead", priority.len());
        }
        priority.extend(regular);
        priority
    }

    async fn run_job(&self, job: BackupJob, cancel: CancellationToken) -> JobReport {
        let name = job.name.clone();
        let _lease = self.running.lease(name.clone(), cancel.clone());
        let mut progress = JobProgress::new(0, 0);

        let (source, destination) = match validate_job(&job) {
            Ok(paths) => paths,
            Err(e) => return self.finish(&name, BackupStatus::Failed, &progress, &e.to_string()).await,
        };

        self.update_job(&name, |j| {
            j.status = BackupStatus::Running;
            j.progress = 0;
        })
        .await;
        self.persist_state(snapshot(&name, BackupStatus::Running, &progress, "Backup started"));

        let files = match walk_directory(&source) {
            Ok(files) => files,
            Err(e) => {
                let message = format!("Failed to scan {}: {}", source.display(), e);
                return self.finish(&name, BackupStatus::Failed, &progress, &message).await;
            }
        };

        progress = JobProgress::new(files.len() as u64, total_size(&files));
        let total_bytes = progress.total_bytes;
        self.update_job(&name, |j| j.total_file_size = total_bytes).await;
        info!(
            job = %name,
            files = progress.total_files,
            bytes = progress.total_bytes,
            "Starting {} backup of {} into {}",
            job.backup_type,
            source.display(),
            destination.display()
        );

        let settings = self.settings();
        for file in &files {
            if cancel.is_cancelled() {
                return self.finish(&name, BackupStatus::Stopped, &progress, STOPPED).await;
            }

            let target = destination.join(&file.relative_path);
            if self.business_software_running().await {
                let source_hash = file_digest_async(&file.path).await.ok();
                self.record(&TransferInfo::failure(
                    &name,
                    job.backup_type,
                    &file.path,
                    &target,
                    file.size,
                    GUARD_INTERRUPTED,
                    source_hash,
                ));
                return self.finish(&name, BackupStatus::Failed, &progress, GUARD_INTERRUPTED).await;
            }

            if job.backup_type == BackupType::Differential && metadata::is_unchanged(&file.path, &target) {
                debug!(job = %name, "Unchanged, skipping {}", file.relative_path.display());
            } else {
                match self.transfer_file(&job, file, &target, &settings).await {
                    Ok(record) => self.record(&record),
                    Err(e) => {
                        error!(job = %name, "Failed to transfer {}: {}", file.path.display(), e);
                        self.record(&TransferInfo::failure(
                            &name,
                            job.backup_type,
                            &file.path,
                            &target,
                            file.size,
                            e.to_string(),
                            None,
                        ));
                        let message = format!("Failed to transfer {}: {}", file.relative_path.display(), e);
                        return self.finish(&name, BackupStatus::Failed, &progress, &message).await;
                    }
                }
            }

            let percent = progress.advance(file.size);
            self.update_job(&name, |j| j.progress = percent).await;
            self.persist_state(snapshot(
                &name,
                BackupStatus::Running,
                &progress,
                &format!("Processed {}", file.relative_path.display()),
            ));
            self.emit(BackupEvent::Progress {
                job: name.clone(),
                percent,
            });
        }

        progress.finish();
        self.finish(&name, BackupStatus::Completed, &progress, "Backup completed").await
    }

    /// Copy or encrypt one file, then hash both sides.
    async fn transfer_file(
        &self,
        job: &BackupJob,
        file: &FileInfo,
        target: &Path,
        settings: &BackupSettings,
    ) -> Result<TransferInfo> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let source_hash = file_digest_async(&file.path).await?;
        let start = Instant::now();
        let crypt_time = if has_listed_extension(&file.path, &settings.encrypt_extensions) {
            let outcome = self.encryption.encrypt(&file.path, target).await?;
            debug!(job = %job.name, method = ?outcome.method, "Encrypted {}", file.relative_path.display());
            outcome.elapsed
        } else {
            tokio::fs::copy(&file.path, target).await?;
            Duration::ZERO
        };
        let transfer_time = start.elapsed();

        metadata::copy_mtime(&file.path, target)?;
        let target_hash = file_digest_async(target).await?;

        Ok(TransferInfo::success(
            &job.name,
            job.backup_type,
            &file.path,
            target,
            file.size,
            transfer_time,
            crypt_time,
            (source_hash, target_hash),
        ))
    }

    /// Settle a job: registry, durable record, state snapshot and one completion event.
    async fn finish(&self, name: &str, status: BackupStatus, progress: &JobProgress, message: &str) -> JobReport {
        let percent = progress.percent();
        let updated = self
            .update_job(name, |j| {
                j.status = status;
                j.progress = percent;
            })
            .await;
        if let Some(job) = updated {
            self.save_record(&job);
        }

        self.persist_state(snapshot(name, status, progress, message));
        self.conclude(name, status, progress, message)
    }

    /// Fail `name` without running it. A run of the same job in another call
    /// keeps its registry entry, record and state; only the event and report
    /// are produced.
    async fn refuse(&self, name: &str, message: &str) -> JobReport {
        let progress = JobProgress::new(0, 0);
        {
            // Every write of a run starts with a registry update, so holding
            // the registry lock orders this refusal against it
            let mut jobs = self.jobs.write().await;
            if self.running.contains(&name.to_string()) {
                debug!(job = %name, "Job is running in another call, leaving its state untouched");
            } else if let Some(job) = jobs.iter_mut().find(|j| j.name == name) {
                job.status = BackupStatus::Failed;
                job.progress = 0;
                self.save_record(job);
                self.persist_state(snapshot(name, BackupStatus::Failed, &progress, message));
            }
        }
        self.conclude(name, BackupStatus::Failed, &progress, message)
    }

    /// Log the outcome, emit the completion event and build the report.
    fn conclude(&self, name: &str, status: BackupStatus, progress: &JobProgress, message: &str) -> JobReport {
        let percent = progress.percent();
        let success = status == BackupStatus::Completed;
        let error = (!success).then(|| message.to_string());
        if success {
            info!(job = %name, elapsed = ?progress.elapsed(), "Backup completed");
        } else {
            warn!(job = %name, %status, "{}", message);
        }

        self.emit(BackupEvent::Completed {
            job: name.to_string(),
            success,
            error: error.clone(),
        });

        JobReport {
            name: name.to_string(),
            status,
            progress: percent,
            error,
        }
    }

    async fn update_job<F>(&self, name: &str, apply: F) -> Option<BackupJob>
    where
        F: FnOnce(&mut BackupJob),
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.iter_mut().find(|j| j.name == name)?;
        apply(job);
        Some(job.clone())
    }

    fn save_record(&self, job: &BackupJob) {
        if let Err(e) = self.job_store.save(job) {
            warn!(job = %job.name, "Failed to persist job record: {}", e);
        }
    }

    fn persist_state(&self, state: JobState) {
        if let Err(e) = self.state_store.save(state) {
            warn!("Failed to persist job state: {}", e);
        }
    }

    fn record(&self, info: &TransferInfo) {
        if let Err(e) = self.transfer_log().record_transfer(info) {
            warn!(job = %info.name, "Failed to write transfer log: {}", e);
        }
    }

    fn emit(&self, event: BackupEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Check both paths and return them expanded. Creates the destination.
fn validate_job(job: &BackupJob) -> Result<(PathBuf, PathBuf)> {
    if is_blank(&job.source_path) {
        return Err(EngineError::Validation("Source path is empty".to_string()));
    }
    if is_blank(&job.destination_path) {
        return Err(EngineError::Validation("Destination path is empty".to_string()));
    }
    if !validate_source(&job.source_path) {
        return Err(EngineError::Validation(format!(
            "Source directory not found: {}",
            job.source_path.display()
        )));
    }
    if !validate_destination(&job.destination_path) {
        return Err(EngineError::Validation(format!(
            "Cannot create destination directory: {}",
            job.destination_path.display()
        )));
    }
    Ok((expand_home(&job.source_path), expand_home(&job.destination_path)))
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}

fn snapshot(name: &str, status: BackupStatus, progress: &JobProgress, message: &str) -> JobState {
    let mut state = JobState::new(name, status, progress.percent(), message);
    state.total_files = progress.total_files;
    state.total_size = progress.total_bytes;
    state.files_processed = progress.files_processed;
    state.size_processed = progress.bytes_processed;
    state
}
