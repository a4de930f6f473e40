//! Dispatch queue.
//!
//! One producer feeds discovered archives into a bounded channel; a fixed
//! number of consumers pull one archive at a time and attack it. Before
//! each attack a consumer carves a sub-pool out of the global pool, sized
//! by how many other archives are running right now, so parallel archives
//! share the budget instead of each claiming all of it.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive::ProtectedArchive;
use crate::attack::{AttackOutcome, AttackPipeline};
use crate::pool::{WorkerPool, sub_pool_capacity};

/// Default bound of the archive queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Result of attacking one archive.
#[derive(Debug, Clone)]
pub struct ArchiveReport {
    pub path: PathBuf,
    pub outcome: AttackOutcome,
    /// Capacity of the sub-pool the attack ran with
    pub sub_pool: usize,
}

#[derive(Debug, Default)]
pub struct DispatchSummary {
    /// Reports sorted by path
    pub reports: Vec<ArchiveReport>,
    /// Archives skipped because they were already handled
    pub skipped: usize,
}

impl DispatchSummary {
    pub fn found(&self) -> usize {
        self.count(|o| matches!(o, AttackOutcome::Found { .. }))
    }

    pub fn exhausted(&self) -> usize {
        self.count(|o| matches!(o, AttackOutcome::Exhausted))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, AttackOutcome::Cancelled))
    }

    fn count(&self, pred: impl Fn(&AttackOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// State shared by every consumer of one run
struct Shared {
    pipeline: Arc<AttackPipeline>,
    pool: WorkerPool,
    token: CancellationToken,
    receiver: tokio::sync::Mutex<mpsc::Receiver<ProtectedArchive>>,
    processed: Mutex<HashSet<PathBuf>>,
    active: AtomicUsize,
    skipped: AtomicUsize,
}

pub struct Dispatcher {
    pipeline: Arc<AttackPipeline>,
    pool: WorkerPool,
    consumers: usize,
    queue_depth: usize,
}

impl Dispatcher {
    pub fn new(pipeline: Arc<AttackPipeline>, pool: WorkerPool, consumers: usize) -> Self {
        Self {
            pipeline,
            pool,
            consumers: consumers.max(1),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Attack every archive and wait for all consumers to finish.
    ///
    /// Cancelling `token` stops the producer, makes idle consumers exit,
    /// and lets running attacks wind down cooperatively.
    pub async fn run(
        &self,
        archives: Vec<ProtectedArchive>,
        token: &CancellationToken,
    ) -> DispatchSummary {
        let progress = Arc::clone(self.pipeline.progress());
        progress.set_total(archives.len() as u64);

        info!(
            archives = archives.len(),
            consumers = self.consumers,
            pool = self.pool.capacity(),
            "Starting dispatch"
        );

        let (sender, receiver) = mpsc::channel(self.queue_depth);
        let shared = Arc::new(Shared {
            pipeline: Arc::clone(&self.pipeline),
            pool: self.pool.clone(),
            token: token.clone(),
            receiver: tokio::sync::Mutex::new(receiver),
            processed: Mutex::new(HashSet::new()),
            active: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        });

        let producer = {
            let token = token.clone();
            tokio::spawn(async move {
                for archive in archives {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        sent = sender.send(archive) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
                // Dropping the sender closes the queue.
                debug!("Producer finished");
            })
        };

        let mut consumers = JoinSet::new();
        for id in 0..self.consumers {
            let shared = Arc::clone(&shared);
            consumers.spawn(consume(id, shared));
        }

        let mut summary = DispatchSummary::default();
        while let Some(joined) = consumers.join_next().await {
            match joined {
                Ok(reports) => summary.reports.extend(reports),
                Err(e) => warn!("Consumer task failed: {}", e),
            }
        }
        if let Err(e) = producer.await {
            warn!("Producer task failed: {}", e);
        }

        summary.skipped = shared.skipped.load(Ordering::Relaxed);
        summary.reports.sort_by(|a, b| a.path.cmp(&b.path));
        summary
    }
}

async fn next_archive(shared: &Shared) -> Option<ProtectedArchive> {
    let mut receiver = shared.receiver.lock().await;
    tokio::select! {
        biased;
        _ = shared.token.cancelled() => None,
        archive = receiver.recv() => archive,
    }
}

async fn consume(id: usize, shared: Arc<Shared>) -> Vec<ArchiveReport> {
    let mut reports = Vec::new();

    while let Some(archive) = next_archive(&shared).await {
        let path = archive.path().to_path_buf();

        let first_time = shared
            .processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone());
        if !first_time || shared.pipeline.state().is_found(&path) {
            debug!(consumer = id, archive = %path.display(), "Already processed, skipping");
            shared.skipped.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        let others = shared.active.fetch_add(1, Ordering::SeqCst);
        let capacity = sub_pool_capacity(shared.pool.capacity(), others);
        let sub_pool = shared.pool.sub_pool(capacity);

        info!(
            consumer = id,
            archive = %path.display(),
            sub_pool = sub_pool.capacity(),
            "Attacking archive"
        );

        let archive_token = shared.token.child_token();
        let outcome = shared
            .pipeline
            .attack(&archive, &sub_pool, &archive_token)
            .await;
        shared.active.fetch_sub(1, Ordering::SeqCst);

        let progress = shared.pipeline.progress();
        progress.archive_done();
        progress.log_archive(&path);

        reports.push(ArchiveReport {
            path,
            outcome,
            sub_pool: sub_pool.capacity(),
        });
    }

    debug!(consumer = id, handled = reports.len(), "Consumer finished");
    reports
}
