//! Durability log.
//!
//! Every persistent side effect of a run goes through one writer task:
//! learned common passwords, found passwords, and archives that resisted
//! every stage. Producers submit [`JournalOp`]s through a cloneable
//! [`JournalHandle`]; the writer applies them to three append-only files
//! strictly in submission order.
//!
//! A failed write is logged and dropped. It never reaches the producer and
//! never stops the writer; the worst outcome is redoing an archive on the
//! next run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::archive::FoundPassword;

/// Default bound of the submission queue.
pub const DEFAULT_JOURNAL_DEPTH: usize = 256;

/// Locations of the three persisted files.
#[derive(Debug, Clone)]
pub struct JournalPaths {
    pub common: PathBuf,
    pub found: PathBuf,
    pub not_found: PathBuf,
}

/// A single persistent side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalOp {
    AppendCommon(String),
    AppendFound(FoundPassword),
    AppendNotFound(PathBuf),
}

/// Messages handled by the writer task
#[derive(Debug)]
enum WriterMessage {
    Op(JournalOp),
    /// Drain everything queued before this and stop
    Shutdown,
}

/// Totals reported by the writer when it stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JournalStats {
    pub written: u64,
    pub dropped: u64,
}

/// Submission side of the log.
#[derive(Debug, Clone)]
pub struct JournalHandle {
    sender: mpsc::Sender<WriterMessage>,
}

impl JournalHandle {
    /// Queue `op`, waiting while the queue is full.
    pub async fn submit(&self, op: JournalOp) {
        if let Err(e) = self.sender.send(WriterMessage::Op(op)).await {
            warn!("Journal is closed, dropping {:?}", e.0);
        }
    }

    pub async fn append_common(&self, password: impl Into<String>) {
        self.submit(JournalOp::AppendCommon(password.into())).await;
    }

    pub async fn append_found(&self, found: FoundPassword) {
        self.submit(JournalOp::AppendFound(found)).await;
    }

    pub async fn append_not_found(&self, path: impl Into<PathBuf>) {
        self.submit(JournalOp::AppendNotFound(path.into())).await;
    }
}

/// Owner of the writer task.
pub struct Journal {
    handle: JournalHandle,
    task: JoinHandle<JournalStats>,
}

impl Journal {
    /// Spawn the writer task. Files are opened lazily on first write.
    pub fn start(paths: JournalPaths, depth: usize) -> Self {
        let (sender, receiver) = mpsc::channel(depth.max(1));
        let task = tokio::spawn(writer_task(paths, receiver));
        Self {
            handle: JournalHandle { sender },
            task,
        }
    }

    pub fn handle(&self) -> JournalHandle {
        self.handle.clone()
    }

    /// Flush everything submitted so far and stop the writer.
    ///
    /// Operations submitted through surviving handles after this call are
    /// dropped with a warning.
    pub async fn shutdown(self) -> JournalStats {
        debug!("Journal: sending shutdown");
        if self.handle.sender.send(WriterMessage::Shutdown).await.is_err() {
            warn!("Journal writer already stopped");
        }
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Journal writer failed: {}", e);
                JournalStats::default()
            }
        }
    }
}

/// Append-only file that is opened on first use and reopened after errors.
struct AppendFile {
    path: PathBuf,
    file: Option<File>,
}

impl AppendFile {
    fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }

    async fn append_line(&mut self, line: &str) -> std::io::Result<()> {
        let file = match &mut self.file {
            Some(file) => file,
            empty => empty.insert(open_append(&self.path).await?),
        };

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let result = async {
            file.write_all(buf.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if result.is_err() {
            // Start from a fresh handle next time.
            self.file = None;
        }
        result
    }
}

async fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path).await
}

async fn writer_task(
    paths: JournalPaths,
    mut receiver: mpsc::Receiver<WriterMessage>,
) -> JournalStats {
    let mut common = AppendFile::new(paths.common);
    let mut found = AppendFile::new(paths.found);
    let mut not_found = AppendFile::new(paths.not_found);

    let mut common_written: HashSet<String> = HashSet::new();
    let mut stats = JournalStats::default();

    while let Some(message) = receiver.recv().await {
        let op = match message {
            WriterMessage::Op(op) => op,
            WriterMessage::Shutdown => break,
        };

        let (target, line) = match &op {
            JournalOp::AppendCommon(password) => {
                if !common_written.insert(password.clone()) {
                    trace!(password = %password, "Journal: common password already written");
                    continue;
                }
                (&mut common, password.clone())
            }
            JournalOp::AppendFound(entry) => (&mut found, entry.to_line()),
            JournalOp::AppendNotFound(path) => (&mut not_found, path.display().to_string()),
        };

        match target.append_line(&line).await {
            Ok(()) => stats.written += 1,
            Err(e) => {
                stats.dropped += 1;
                if let JournalOp::AppendCommon(password) = &op {
                    common_written.remove(password);
                }
                warn!(
                    file = %target.path.display(),
                    "Journal write failed, dropping {:?}: {}",
                    op,
                    e
                );
            }
        }
    }

    debug!(written = stats.written, dropped = stats.dropped, "Journal: writer stopped");
    stats
}
