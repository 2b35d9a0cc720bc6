//! Backup scheduler - Periodic and on-demand snapshot files.
//!
//! Each run captures a [`Snapshot`], writes it to a new file named
//! `backup-YYYYMMDDTHHMMSS.ffffffZ.json` in the backup directory and prunes
//! the oldest files beyond the retention limit. When two runs land on the
//! same microsecond the later one gets a `-N` suffix, so runs never overwrite
//! each other.

use crate::{
    config::BackupConfig,
    core::{snapshot::Snapshot, store::LedgerStore},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const FILE_PREFIX: &str = "backup-";
const FILE_EXTENSION: &str = ".json";
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// Identity of a backup file: when it was taken, plus a collision counter.
///
/// Orders by time first, so the greatest stamp is the latest backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackupStamp {
    /// Capture time, truncated to microseconds
    pub taken_at: DateTime<Utc>,
    /// 0 for the first file at this time, then 1, 2, ...
    pub sequence: u32,
}

impl BackupStamp {
    /// Stamp for a capture at `taken_at`
    #[must_use]
    pub fn new(taken_at: DateTime<Utc>) -> Self {
        let micros = taken_at.nanosecond() / 1_000 * 1_000;
        Self {
            taken_at: taken_at.with_nanosecond(micros).unwrap_or(taken_at),
            sequence: 0,
        }
    }

    /// Same time, next collision counter
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            taken_at: self.taken_at,
            sequence: self.sequence + 1,
        }
    }

    /// File name for this stamp
    #[must_use]
    pub fn file_name(&self) -> String {
        let stamp = self.taken_at.format(STAMP_FORMAT);
        if self.sequence == 0 {
            format!("{FILE_PREFIX}{stamp}{FILE_EXTENSION}")
        } else {
            format!("{FILE_PREFIX}{stamp}-{}{FILE_EXTENSION}", self.sequence)
        }
    }

    /// Parses a backup file name. Anything not produced by [`Self::file_name`] is `None`.
    #[must_use]
    pub fn parse(file_name: &str) -> Option<Self> {
        let body = file_name
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_EXTENSION)?;
        let (stamp, sequence) = match body.split_once("Z-") {
            Some((stamp, sequence)) => (stamp, sequence.parse::<u32>().ok()?),
            None => (body.strip_suffix('Z')?, 0),
        };
        let taken_at = NaiveDateTime::parse_from_str(&format!("{stamp}Z"), STAMP_FORMAT)
            .ok()?
            .and_utc();

        let parsed = Self { taken_at, sequence };
        (parsed.file_name() == file_name).then_some(parsed)
    }
}

/// A backup file on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupFile {
    /// File name within the backup directory
    pub filename: String,
    /// Size in bytes
    #[serde(rename = "size")]
    pub size_bytes: u64,
    /// Filesystem modification time
    #[serde(rename = "mtime")]
    pub modified: DateTime<Utc>,
    #[serde(skip)]
    stamp: BackupStamp,
}

impl BackupFile {
    /// Capture time embedded in the file name
    #[must_use]
    pub const fn taken_at(&self) -> DateTime<Utc> {
        self.stamp.taken_at
    }
}

/// Outcome of one backup run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResult {
    /// Name of the written file
    pub filename: String,
    /// Members in the snapshot
    pub count: usize,
    /// Recharge plus consume records in the snapshot
    pub record_count: usize,
}

/// Lists backup files newest first, ordered by the time embedded in their names.
///
/// A missing directory lists as empty. Files that do not follow the naming
/// convention are ignored.
pub async fn list_backups(dir: &Path) -> Result<Vec<BackupFile>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let Some(stamp) = entry.file_name().to_str().and_then(BackupStamp::parse) else {
            continue;
        };
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        files.push(BackupFile {
            filename: stamp.file_name(),
            size_bytes: metadata.len(),
            modified: metadata.modified().map_or(stamp.taken_at, DateTime::<Utc>::from),
            stamp,
        });
    }

    files.sort_by(|a, b| b.stamp.cmp(&a.stamp));
    Ok(files)
}

/// Writes `bytes` to a file no other run has claimed, returning its name
async fn write_unique(dir: &Path, taken_at: DateTime<Utc>, bytes: &[u8]) -> Result<String> {
    let mut stamp = BackupStamp::new(taken_at);
    loop {
        let file_name = stamp.file_name();
        let path = dir.join(&file_name);
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                stamp = stamp.next();
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let written = async {
            file.write_all(bytes).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                warn!(file = %file_name, error = %cleanup, "Failed to remove partial backup");
            }
            return Err(e.into());
        }
        return Ok(file_name);
    }
}

/// Deletes the oldest files so that at most `max_files` remain. `0` keeps everything.
async fn prune(dir: &Path, max_files: usize) -> Result<usize> {
    if max_files == 0 {
        return Ok(0);
    }
    let mut removed = 0;
    for stale in list_backups(dir).await?.into_iter().skip(max_files) {
        match tokio::fs::remove_file(dir.join(&stale.filename)).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(file = %stale.filename, error = %e, "Failed to prune backup"),
        }
    }
    Ok(removed)
}

/// Performs backup runs against one store and directory
#[derive(Debug)]
struct BackupWorker {
    store: LedgerStore,
    dir: PathBuf,
    max_files: usize,
}

impl BackupWorker {
    async fn run_once(&self) -> Result<BackupResult> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let snapshot = Snapshot::capture(self.store.connection()).await?;
        let bytes = snapshot.encode()?;
        let filename = write_unique(&self.dir, snapshot.timestamp, &bytes).await?;

        let result = BackupResult {
            filename,
            count: snapshot.data.members.len(),
            record_count: snapshot.data.record_count(),
        };
        info!(
            file = %result.filename,
            members = result.count,
            records = result.record_count,
            "Backup written"
        );

        match prune(&self.dir, self.max_files).await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "Pruned old backups"),
            Err(e) => warn!(error = %e, "Backup retention pass failed"),
        }
        Ok(result)
    }
}

struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the periodic backup task.
///
/// `start` runs one backup immediately and then one per interval; scheduled
/// failures are logged and the timer keeps going. Manual backups return
/// their error to the caller.
pub struct BackupScheduler {
    worker: Arc<BackupWorker>,
    interval: Duration,
    running: Mutex<Option<RunningTask>>,
}

impl BackupScheduler {
    /// Creates a stopped scheduler for `store`
    #[must_use]
    pub fn new(store: LedgerStore, config: &BackupConfig) -> Self {
        Self {
            worker: Arc::new(BackupWorker {
                store,
                dir: config.dir.clone(),
                max_files: config.max_files,
            }),
            interval: config.interval(),
            running: Mutex::new(None),
        }
    }

    /// Directory backups are written to
    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.worker.dir
    }

    /// Starts the timer. Returns `false` if it was already running.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            debug!("Backup scheduler already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduled_loop(
            Arc::clone(&self.worker),
            self.interval,
            cancel.clone(),
        ));
        *running = Some(RunningTask { cancel, handle });
        info!(interval_secs = self.interval.as_secs(), dir = %self.worker.dir.display(), "Backup scheduler started");
        true
    }

    /// Stops the timer and waits for an in-flight run to finish. Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let Some(task) = self.running.lock().await.take() else {
            return false;
        };
        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            error!(error = %e, "Backup task ended abnormally");
        }
        info!("Backup scheduler stopped");
        true
    }

    /// Whether the periodic task is active
    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Runs one backup now.
    ///
    /// # Errors
    /// Any capture, encoding or filesystem failure.
    pub async fn trigger_manual_backup(&self) -> Result<BackupResult> {
        self.worker.run_once().await.inspect_err(|e| {
            warn!(error = %e, "Manual backup failed");
        })
    }

    /// Lists backup files newest first
    pub async fn list_backups(&self) -> Result<Vec<BackupFile>> {
        list_backups(&self.worker.dir).await
    }
}

async fn scheduled_loop(worker: Arc<BackupWorker>, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = worker.run_once().await {
                    error!(error = %e, "Scheduled backup failed");
                }
            }
        }
    }
}

impl std::fmt::Debug for BackupScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupScheduler")
            .field("dir", &self.worker.dir)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Maps an empty directory to [`Error::NoBackupAvailable`]
pub(crate) fn latest(files: Vec<BackupFile>, dir: &Path) -> Result<BackupFile> {
    files.into_iter().next().ok_or_else(|| Error::NoBackupAvailable {
        dir: dir.display().to_string(),
    })
}
