//! Attack pipeline.
//!
//! For one archive, [`AttackPipeline::attack`] runs the configured stages
//! in order and stops at the first confirmed password. Inside a stage every
//! candidate is tested by its own task, gated by the archive's sub-pool.
//! The first success cancels a stage-local token; siblings that have not
//! started their test yet skip it, tests already running finish normally,
//! and the stage returns once every task has come back.
//!
//! A password is tested at most once per archive: every stage streams its
//! candidates through one `tried` set shared by the whole attack.

mod stage;

pub use stage::Stage;

use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive::{FoundPassword, ProtectedArchive};
use crate::codec::check_password;
use crate::generator::{CandidateGenerator, RuleSet};
use crate::journal::JournalHandle;
use crate::pool::WorkerPool;
use crate::progress::{ArchiveCounters, ProgressTracker};
use crate::state::SharedState;

/// How an attack on one archive ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttackOutcome {
    Found { password: String, stage: Stage },
    /// Every stage ran to completion without a match
    Exhausted,
    /// The run was cancelled before the attack could finish
    Cancelled,
}

impl AttackOutcome {
    pub fn password(&self) -> Option<&str> {
        match self {
            AttackOutcome::Found { password, .. } => Some(password),
            _ => None,
        }
    }
}

enum StageResult {
    Found(String),
    Exhausted,
    Cancelled,
}

type Candidates<'a> = Box<dyn Iterator<Item = String> + Send + 'a>;

/// Everything an attack needs besides the archive itself.
pub struct AttackPipeline {
    state: Arc<SharedState>,
    journal: JournalHandle,
    progress: Arc<ProgressTracker>,
    generator: CandidateGenerator,
    rules: RuleSet,
    stages: Vec<Stage>,
}

impl AttackPipeline {
    pub fn new(
        state: Arc<SharedState>,
        journal: JournalHandle,
        progress: Arc<ProgressTracker>,
        generator: CandidateGenerator,
        rules: RuleSet,
        stages: Vec<Stage>,
    ) -> Self {
        Self {
            state,
            journal,
            progress,
            generator,
            rules,
            stages,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Attack `archive`, testing at most `pool.capacity()` passwords at once.
    pub async fn attack(
        &self,
        archive: &ProtectedArchive,
        pool: &WorkerPool,
        token: &CancellationToken,
    ) -> AttackOutcome {
        let counters = self.progress.counters(archive.path());
        let outcome = self.run_stages(archive, pool, token, &counters).await;

        match &outcome {
            AttackOutcome::Found { password, stage } => {
                counters.record_found();
                self.persist_found(archive, password, *stage).await;
            }
            AttackOutcome::Exhausted => {
                info!(
                    archive = %archive.path().display(),
                    attempts = counters.attempted(),
                    "No password found"
                );
                if self.state.record_exhausted(archive.path()) {
                    self.journal.append_not_found(archive.path()).await;
                }
            }
            AttackOutcome::Cancelled => {
                debug!(archive = %archive.path().display(), "Attack cancelled");
            }
        }

        archive.codec().forget(archive.path());
        outcome
    }

    async fn run_stages(
        &self,
        archive: &ProtectedArchive,
        pool: &WorkerPool,
        token: &CancellationToken,
        counters: &Arc<ArchiveCounters>,
    ) -> AttackOutcome {
        let mut tried = HashSet::new();
        let mut generated: Option<Vec<String>> = None;

        for &stage in &self.stages {
            if token.is_cancelled() {
                return AttackOutcome::Cancelled;
            }

            let guesses: &[String] = match stage {
                Stage::Guesses | Stage::MutatedGuesses => generated
                    .get_or_insert_with(|| self.generator.generate(&archive.file_name()))
                    .as_slice(),
                _ => &[],
            };

            let before = counters.attempted();
            let candidates = self.stage_candidates(stage, guesses, &mut tried);
            let result = self
                .run_stage(archive, candidates, pool, token, counters)
                .await;

            debug!(
                archive = %archive.path().display(),
                stage = %stage,
                attempts = counters.attempted() - before,
                "Stage finished"
            );

            match result {
                StageResult::Found(password) => return AttackOutcome::Found { password, stage },
                StageResult::Exhausted => {}
                StageResult::Cancelled => return AttackOutcome::Cancelled,
            }
        }
        AttackOutcome::Exhausted
    }

    fn stage_candidates<'a>(
        &'a self,
        stage: Stage,
        guesses: &'a [String],
        tried: &'a mut HashSet<String>,
    ) -> Candidates<'a> {
        match stage {
            Stage::Common => Box::new(
                self.state
                    .common_snapshot()
                    .into_iter()
                    .filter(first_try(tried)),
            ),
            Stage::Guesses => Box::new(guesses.iter().cloned().filter(first_try(tried))),
            Stage::MutatedGuesses => Box::new(
                guesses
                    .iter()
                    .flat_map(move |g| self.rules.apply(g))
                    .filter(first_try(tried)),
            ),
            Stage::Dictionary => Box::new(
                self.state
                    .dictionary()
                    .iter()
                    .cloned()
                    .filter(first_try(tried)),
            ),
            Stage::MutatedDictionary => Box::new(
                self.state
                    .dictionary()
                    .iter()
                    .flat_map(move |word| self.rules.apply(word))
                    .filter(first_try(tried)),
            ),
        }
    }

    async fn run_stage(
        &self,
        archive: &ProtectedArchive,
        candidates: Candidates<'_>,
        pool: &WorkerPool,
        token: &CancellationToken,
        counters: &Arc<ArchiveCounters>,
    ) -> StageResult {
        let stage_token = token.child_token();
        let mut tasks = JoinSet::new();
        let mut winner: Option<String> = None;

        for candidate in candidates {
            if stage_token.is_cancelled() {
                break;
            }
            while let Some(joined) = tasks.try_join_next() {
                collect_winner(joined, &mut winner);
            }

            // Waiting here keeps at most one queued task per free slot.
            let Some(permit) = pool.acquire(&stage_token).await else {
                break;
            };

            let codec = Arc::clone(archive.codec());
            let path = archive.path().to_path_buf();
            let stage_token = stage_token.clone();
            let counters = Arc::clone(counters);

            tasks.spawn(async move {
                let _permit = permit;
                if stage_token.is_cancelled() {
                    return None;
                }
                counters.record_attempt();
                if check_password(codec.as_ref(), &path, &candidate).await {
                    stage_token.cancel();
                    Some(candidate)
                } else {
                    None
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            collect_winner(joined, &mut winner);
        }

        match winner {
            Some(password) => StageResult::Found(password),
            None if token.is_cancelled() => StageResult::Cancelled,
            None => StageResult::Exhausted,
        }
    }

    async fn persist_found(&self, archive: &ProtectedArchive, password: &str, stage: Stage) {
        info!(
            archive = %archive.path().display(),
            stage = %stage,
            password = %password,
            "Password found"
        );

        let found = FoundPassword::new(archive.path(), password);
        if self.state.record_found(&found) {
            self.journal.append_found(found).await;
        }

        if stage.teaches_common() && self.state.learn_common(password) {
            self.journal.append_common(password).await;
        }
    }
}

/// Filter that passes each candidate the first time it is seen.
fn first_try(tried: &mut HashSet<String>) -> impl FnMut(&String) -> bool + Send + '_ {
    move |c| tried.insert(c.clone())
}

fn collect_winner(
    joined: Result<Option<String>, tokio::task::JoinError>,
    winner: &mut Option<String>,
) {
    match joined {
        // Racing successes are equally valid; keep the first one seen.
        Ok(Some(password)) => {
            winner.get_or_insert(password);
        }
        Ok(None) => {}
        Err(e) => warn!("Password test task failed: {}", e),
    }
}
