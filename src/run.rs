//! One complete recovery run: load, discover, attack, persist.

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::attack::AttackPipeline;
use crate::codec::CodecRegistry;
use crate::config::Config;
use crate::discovery::{DiscoveryOptions, discover};
use crate::dispatch::{DispatchSummary, Dispatcher};
use crate::generator::{CandidateGenerator, RuleSet};
use crate::journal::{DEFAULT_JOURNAL_DEPTH, Journal, JournalStats};
use crate::pool::WorkerPool;
use crate::progress::{OverallProgress, ProgressTracker};
use crate::state::SharedState;

#[derive(Debug)]
pub struct RunSummary {
    pub discovered: usize,
    pub dispatch: DispatchSummary,
    pub progress: OverallProgress,
    pub journal: JournalStats,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            discovered = self.discovered,
            processed = self.dispatch.reports.len(),
            found = self.dispatch.found(),
            not_found = self.dispatch.exhausted(),
            cancelled = self.dispatch.cancelled(),
            skipped = self.dispatch.skipped,
            attempts = self.progress.attempted,
            "Run finished"
        );
        info!(
            written = self.journal.written,
            dropped = self.journal.dropped,
            "Results persisted"
        );
    }
}

/// Run with the built-in codecs.
pub async fn run(config: &Config, token: &CancellationToken) -> Result<RunSummary> {
    let registry = CodecRegistry::with_defaults(&config.seven_zip);
    run_with_registry(config, &registry, token).await
}

/// Run with a caller-supplied codec registry.
pub async fn run_with_registry(
    config: &Config,
    registry: &CodecRegistry,
    token: &CancellationToken,
) -> Result<RunSummary> {
    info!(
        root = %config.root.display(),
        formats = ?registry.extensions(),
        jobs = config.pool_capacity,
        "Starting run"
    );

    let state = Arc::new(SharedState::load(&config.files, &config.user_passwords).await?);
    let pool = WorkerPool::new(config.pool_capacity);

    let options = DiscoveryOptions {
        skip_exhausted: config.skip_exhausted,
    };
    let archives = discover(&config.root, registry, &state, &pool, &options, token).await;
    let discovered = archives.len();

    let journal = Journal::start(config.files.clone(), DEFAULT_JOURNAL_DEPTH);
    let progress = Arc::new(ProgressTracker::new());
    let pipeline = Arc::new(AttackPipeline::new(
        Arc::clone(&state),
        journal.handle(),
        Arc::clone(&progress),
        CandidateGenerator::new(config.max_leet_positions),
        RuleSet::for_today(),
        config.stages.clone(),
    ));

    let dispatch = Dispatcher::new(pipeline, pool, config.consumers)
        .with_queue_depth(config.queue_depth)
        .run(archives, token)
        .await;

    let journal = journal.shutdown().await;

    Ok(RunSummary {
        discovered,
        dispatch,
        progress: progress.overall(),
        journal,
        interrupted: token.is_cancelled(),
    })
}
