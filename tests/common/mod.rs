#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zip::unstable::write::FileOptionsExt;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use runlock::generator::{CandidateGenerator, RuleSet};
use runlock::{
    ArchiveCodec, AttackPipeline, Journal, JournalPaths, ProgressTracker, SharedState, Stage,
};

/// Build a single-entry, deflated ZIP; with a password the entry is
/// ZipCrypto encrypted.
pub fn build_zip(name: &str, content: &[u8], password: Option<&str>) -> Vec<u8> {
    let mut options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    if let Some(pw) = password {
        options = options.with_deprecated_encryption(pw.as_bytes());
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(name, options).unwrap();
    writer.write_all(content).unwrap();
    writer.finish().unwrap().into_inner()
}

pub fn write_zip(path: &Path, password: Option<&str>) {
    let content = b"Quarterly figures, do not share.\n".repeat(8);
    std::fs::write(path, build_zip("report.txt", &content, password)).unwrap();
}

pub fn journal_paths(dir: &Path) -> JournalPaths {
    JournalPaths {
        common: dir.join("common_passwords.txt"),
        found: dir.join("found_passwords.txt"),
        not_found: dir.join("not_found.txt"),
    }
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn state(common: &[&str], dictionary: &[&str]) -> Arc<SharedState> {
    Arc::new(SharedState::from_parts(
        common.iter().map(|s| s.to_string()).collect(),
        HashMap::new(),
        HashSet::new(),
        dictionary.iter().map(|s| s.to_string()).collect(),
    ))
}

/// Pipeline writing its results under `dir`.
pub fn pipeline(
    dir: &Path,
    state: Arc<SharedState>,
    rules: RuleSet,
    stages: &[Stage],
) -> (Arc<AttackPipeline>, Journal) {
    let journal = Journal::start(journal_paths(dir), 16);
    let pipeline = AttackPipeline::new(
        state,
        journal.handle(),
        Arc::new(ProgressTracker::new()),
        CandidateGenerator::default(),
        rules,
        stages.to_vec(),
    );
    (Arc::new(pipeline), journal)
}

/// Codec that accepts a fixed set of passwords and records every call.
#[derive(Default)]
pub struct ScriptedCodec {
    accept: HashSet<String>,
    delay: Option<Duration>,
    tested: Mutex<Vec<(PathBuf, String)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedCodec {
    pub fn accepting(passwords: &[&str]) -> Self {
        Self {
            accept: passwords.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn tested(&self) -> Vec<String> {
        self.tested
            .lock()
            .unwrap()
            .iter()
            .map(|(_, pw)| pw.clone())
            .collect()
    }

    pub fn tested_for(&self, path: &Path) -> usize {
        self.tested
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .count()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveCodec for ScriptedCodec {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn is_protected(&self, _path: &Path) -> Result<bool> {
        Ok(true)
    }

    async fn test_password(&self, path: &Path, password: &str) -> Result<bool> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.tested
            .lock()
            .unwrap()
            .push((path.to_path_buf(), password.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.accept.contains(password))
    }
}
