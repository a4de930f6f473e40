//! Attempt counters per archive.
//!
//! Testers bump counters on every attempt; the map lock is taken for
//! writing only when an archive is first registered, so readers printing
//! progress never hold up a running attack.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Live counters for one archive.
#[derive(Debug, Default)]
pub struct ArchiveCounters {
    attempted: AtomicU64,
    found: AtomicBool,
}

impl ArchiveCounters {
    pub fn record_attempt(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_found(&self) {
        self.found.store(true, Ordering::Relaxed);
    }

    pub fn attempted(&self) -> u64 {
        self.attempted.load(Ordering::Relaxed)
    }

    pub fn found(&self) -> bool {
        self.found.load(Ordering::Relaxed)
    }
}

/// Point-in-time copy of one archive's counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveProgress {
    pub path: PathBuf,
    pub attempted: u64,
    pub found: bool,
}

/// Totals across all archives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverallProgress {
    pub total: u64,
    pub processed: u64,
    pub found: u64,
    pub attempted: u64,
}

#[derive(Debug, Default)]
pub struct ProgressTracker {
    archives: RwLock<HashMap<PathBuf, Arc<ArchiveCounters>>>,
    total: AtomicU64,
    processed: AtomicU64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn archive_done(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counters for `path`, registering the archive on first use.
    ///
    /// Hot paths should keep the returned handle rather than look it up
    /// per attempt.
    pub fn counters(&self, path: &Path) -> Arc<ArchiveCounters> {
        let existing = self
            .archives
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned();
        if let Some(counters) = existing {
            return counters;
        }

        let mut archives = self.archives.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(archives.entry(path.to_path_buf()).or_default())
    }

    pub fn snapshot(&self, path: &Path) -> Option<ArchiveProgress> {
        let archives = self.archives.read().unwrap_or_else(PoisonError::into_inner);
        archives.get(path).map(|c| ArchiveProgress {
            path: path.to_path_buf(),
            attempted: c.attempted(),
            found: c.found(),
        })
    }

    pub fn overall(&self) -> OverallProgress {
        let archives = self.archives.read().unwrap_or_else(PoisonError::into_inner);
        let mut overall = OverallProgress {
            total: self.total.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            ..Default::default()
        };
        for counters in archives.values() {
            overall.attempted += counters.attempted();
            overall.found += u64::from(counters.found());
        }
        overall
    }

    /// Log the counters of one archive.
    pub fn log_archive(&self, path: &Path) {
        let Some(progress) = self.snapshot(path) else {
            return;
        };
        let overall = self.overall();
        info!(
            archive = %path.display(),
            attempted = progress.attempted,
            found = progress.found,
            "Progress: {}/{} archives, {} passwords found",
            overall.processed,
            overall.total,
            overall.found
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_attempts_are_all_counted() {
        let tracker = Arc::new(ProgressTracker::new());
        let mut tasks = Vec::new();
        for i in 0..8 {
            let tracker = Arc::clone(&tracker);
            tasks.push(tokio::spawn(async move {
                let path = PathBuf::from(format!("{}.zip", i % 2));
                for _ in 0..100 {
                    tracker.counters(&path).record_attempt();
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        assert_eq!(tracker.snapshot(Path::new("0.zip")).unwrap().attempted, 400);
        assert_eq!(tracker.overall().attempted, 800);
    }

    #[test]
    fn overall_counts_found_and_processed() {
        let tracker = ProgressTracker::new();
        tracker.set_total(3);
        tracker.counters(Path::new("a.zip")).record_found();
        tracker.counters(Path::new("b.zip")).record_attempt();
        tracker.archive_done();

        let overall = tracker.overall();
        assert_eq!(
            overall,
            OverallProgress {
                total: 3,
                processed: 1,
                found: 1,
                attempted: 1
            }
        );
        assert!(tracker.snapshot(Path::new("c.zip")).is_none());
    }
}
