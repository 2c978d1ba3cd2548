//! Background deletion of per-request temp files.
//!
//! # Responsibilities
//! - Delete files handed over by finished requests
//! - Periodically remove stale files nobody is tracking
//! - Delete everything still tracked once the server has stopped
//!
//! # Design Decisions
//! - Deletion happens off the request path, on a single worker task
//! - A file that is already gone counts as cleaned
//! - Failed deletions are logged, stay tracked and are retried on each sweep

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashSet;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::StorageConfig;
use crate::observability::metrics;

/// File name prefixes owned by the gateway inside the temp directory.
pub const MANAGED_PREFIXES: [&str; 2] = ["input_", "output_"];

/// Handle used by requests to register and release temp files.
#[derive(Clone)]
pub struct Janitor {
    tx: mpsc::UnboundedSender<PathBuf>,
    tracked: Arc<DashSet<PathBuf>>,
}

impl Janitor {
    /// Create a handle and the worker that serves it.
    pub fn new(config: &StorageConfig) -> (Self, JanitorWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let tracked = Arc::new(DashSet::new());

        let worker = JanitorWorker {
            rx,
            tracked: Arc::clone(&tracked),
            failed: HashSet::new(),
            dir: config.temp_dir.clone(),
            stale_after: Duration::from_secs(config.stale_after_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
        };

        (Self { tx, tracked }, worker)
    }

    /// Mark a path as in use so sweeps leave it alone.
    pub fn track(&self, path: &Path) {
        self.tracked.insert(path.to_path_buf());
        metrics::set_pending_cleanups(self.tracked.len());
    }

    /// Queue a path for deletion.
    ///
    /// Once the worker has stopped, the file is removed on the blocking pool
    /// instead, or inline when no runtime is around.
    pub fn schedule(&self, path: PathBuf) {
        if let Err(mpsc::error::SendError(path)) = self.tx.send(path) {
            let tracked = Arc::clone(&self.tracked);
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn_blocking(move || remove_blocking(&path, &tracked));
                }
                Err(_) => remove_blocking(&path, &tracked),
            }
        }
    }

    /// Paths tracked but not yet deleted.
    pub fn pending(&self) -> usize {
        self.tracked.len()
    }
}

/// The task that performs deletions.
pub struct JanitorWorker {
    rx: mpsc::UnboundedReceiver<PathBuf>,
    tracked: Arc<DashSet<PathBuf>>,
    failed: HashSet<PathBuf>,
    dir: PathBuf,
    stale_after: Duration,
    sweep_interval: Duration,
}

impl JanitorWorker {
    /// Run until every `Janitor` handle has been dropped.
    pub async fn run(mut self) {
        tracing::info!(
            dir = %self.dir.display(),
            stale_after_secs = self.stale_after.as_secs(),
            "Cleanup worker started"
        );

        let mut ticker = interval_at(Instant::now() + self.sweep_interval, self.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                next = self.rx.recv() => match next {
                    Some(path) => self.remove(&path).await,
                    None => break,
                },
                _ = ticker.tick() => {
                    self.retry_failed().await;
                    match sweep(&self.dir, Some(self.stale_after), &self.tracked).await {
                        Ok(0) => {}
                        Ok(removed) => tracing::info!(removed, "Removed stale temp files"),
                        Err(e) => tracing::warn!(error = %e, "Stale file sweep failed"),
                    }
                }
            }
        }

        let remaining: Vec<PathBuf> = self.tracked.iter().map(|p| p.key().clone()).collect();
        for path in &remaining {
            self.remove(path).await;
        }
        tracing::info!(
            drained = remaining.len(),
            left = self.tracked.len(),
            "Cleanup worker stopped"
        );
    }

    async fn remove(&mut self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Cleaned up");
                self.forget(path);
                metrics::record_cleanup("removed");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.forget(path);
                metrics::record_cleanup("missing");
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Error cleaning up");
                self.failed.insert(path.to_path_buf());
                metrics::record_cleanup("failed");
            }
        }
        metrics::set_pending_cleanups(self.tracked.len());
    }

    fn forget(&mut self, path: &Path) {
        self.tracked.remove(path);
        self.failed.remove(path);
    }

    /// Try again to delete files whose removal failed earlier.
    async fn retry_failed(&mut self) {
        if self.failed.is_empty() {
            return;
        }
        let paths: Vec<PathBuf> = self.failed.drain().collect();
        tracing::debug!(count = paths.len(), "Retrying failed cleanups");
        for path in &paths {
            self.remove(path).await;
        }
    }
}

fn remove_blocking(path: &Path, tracked: &DashSet<PathBuf>) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Error cleaning up");
            return;
        }
    }
    tracked.remove(path);
    metrics::set_pending_cleanups(tracked.len());
}

fn is_managed(name: &str) -> bool {
    MANAGED_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Remove leftovers of a previous run from `dir`.
pub async fn sweep_leftovers(dir: &Path) -> std::io::Result<usize> {
    sweep(dir, None, &DashSet::new()).await
}

/// Remove managed files in `dir` that are not tracked and, when `older_than`
/// is given, were last modified longer ago than that.
async fn sweep(
    dir: &Path,
    older_than: Option<Duration>,
    tracked: &DashSet<PathBuf>,
) -> std::io::Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let now = SystemTime::now();
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let managed = entry.file_name().to_str().map(is_managed).unwrap_or(false);
        if !managed || tracked.contains(&path) {
            continue;
        }

        let meta = match entry.metadata().await {
            Ok(meta) if meta.is_file() => meta,
            _ => continue,
        };
        if let Some(limit) = older_than {
            let age = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if age < limit {
                continue;
            }
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove stale file"),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(dir: &Path) -> StorageConfig {
        StorageConfig {
            temp_dir: dir.to_path_buf(),
            ..StorageConfig::default()
        }
    }

    #[tokio::test]
    async fn removes_scheduled_files() {
        let dir = tempfile::tempdir().unwrap();
        let (janitor, worker) = Janitor::new(&storage(dir.path()));
        let task = tokio::spawn(worker.run());

        let path = dir.path().join("input_a.png");
        tokio::fs::write(&path, b"img").await.unwrap();
        janitor.track(&path);
        assert_eq!(janitor.pending(), 1);

        janitor.schedule(path.clone());
        janitor.schedule(dir.path().join("output_never_written.glb"));
        drop(janitor);
        task.await.unwrap();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drains_tracked_files_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let (janitor, worker) = Janitor::new(&storage(dir.path()));
        let task = tokio::spawn(worker.run());

        let path = dir.path().join("output_b.glb");
        tokio::fs::write(&path, b"glb").await.unwrap();
        janitor.track(&path);

        drop(janitor);
        task.await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn removal_after_worker_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let (janitor, worker) = Janitor::new(&storage(dir.path()));
        drop(worker);

        let path = dir.path().join("input_c.jpg");
        std::fs::write(&path, b"img").unwrap();
        janitor.track(&path);
        janitor.schedule(path.clone());

        for _ in 0..50 {
            if janitor.pending() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!path.exists());
        assert_eq!(janitor.pending(), 0);
    }

    #[test]
    fn removal_without_runtime_is_inline() {
        let dir = tempfile::tempdir().unwrap();
        let (janitor, worker) = Janitor::new(&storage(dir.path()));
        drop(worker);

        let path = dir.path().join("output_d.glb");
        std::fs::write(&path, b"glb").unwrap();
        janitor.track(&path);
        janitor.schedule(path.clone());

        assert!(!path.exists());
        assert_eq!(janitor.pending(), 0);
    }

    #[tokio::test]
    async fn worker_sweeps_stale_files_on_its_interval() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            stale_after_secs: 0,
            sweep_interval_secs: 1,
            ..storage(dir.path())
        };
        let (janitor, worker) = Janitor::new(&config);
        let task = tokio::spawn(worker.run());

        let orphan = dir.path().join("output_orphan.glb");
        let live = dir.path().join("input_live.png");
        tokio::fs::write(&orphan, b"glb").await.unwrap();
        tokio::fs::write(&live, b"img").await.unwrap();
        janitor.track(&live);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!orphan.exists());
        assert!(live.exists());

        drop(janitor);
        task.await.unwrap();
        assert!(!live.exists());
    }

    #[tokio::test]
    async fn failed_deletion_is_retried_on_next_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            sweep_interval_secs: 1,
            ..storage(dir.path())
        };
        let (janitor, worker) = Janitor::new(&config);
        let task = tokio::spawn(worker.run());

        // A directory cannot be removed with remove_file.
        let path = dir.path().join("output_stuck.glb");
        tokio::fs::create_dir(&path).await.unwrap();
        tokio::fs::write(path.join("inner"), b"x").await.unwrap();
        janitor.track(&path);
        janitor.schedule(path.clone());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(path.exists());
        assert_eq!(janitor.pending(), 1);

        tokio::fs::remove_dir_all(&path).await.unwrap();
        tokio::fs::write(&path, b"glb").await.unwrap();

        tokio::time::sleep(Duration::from_millis(1300)).await;
        assert!(!path.exists());
        assert_eq!(janitor.pending(), 0);

        drop(janitor);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn leftover_sweep_only_touches_managed_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["input_1.png", "output_1.glb", "notes.txt"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        assert_eq!(sweep_leftovers(dir.path()).await.unwrap(), 2);
        assert!(dir.path().join("notes.txt").exists());
        assert!(!dir.path().join("input_1.png").exists());
    }

    #[tokio::test]
    async fn stale_sweep_spares_tracked_and_fresh_files() {
        let dir = tempfile::tempdir().unwrap();
        let tracked_path = dir.path().join("input_busy.png");
        let fresh_path = dir.path().join("output_fresh.glb");
        tokio::fs::write(&tracked_path, b"x").await.unwrap();
        tokio::fs::write(&fresh_path, b"x").await.unwrap();

        let tracked = DashSet::new();
        tracked.insert(tracked_path.clone());

        let removed = sweep(dir.path(), Some(Duration::from_secs(3600)), &tracked)
            .await
            .unwrap();
        assert_eq!(removed, 0);

        let removed = sweep(dir.path(), Some(Duration::ZERO), &tracked).await.unwrap();
        assert_eq!(removed, 1);
        assert!(tracked_path.exists());
        assert!(!fresh_path.exists());
    }
}
