//! Codec that delegates to an external 7-Zip compatible program.
//!
//! Used for formats the crate does not parse itself (7z, rar, split
//! volumes). The tool's `t` (test) command decides: exit status 0 with a
//! given password means the archive opened and every checksum matched.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::trace;

use super::ArchiveCodec;

/// Password used to probe whether an archive asks for one at all.
const PROBE_PASSWORD: &str = "runlock-probe";

/// Output markers 7-Zip prints for archives that need a password.
const PROTECTED_MARKERS: [&str; 3] = [
    "wrong password",
    "can not open encrypted archive",
    "cannot open encrypted archive",
];

pub struct CommandCodec {
    program: PathBuf,
}

impl CommandCodec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn run_test(&self, path: &Path, password: &str) -> Result<Output> {
        Command::new(&self.program)
            .arg("t")
            .arg(format!("-p{password}"))
            .arg("-y")
            .arg("--")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program.display()))
    }
}

#[async_trait]
impl ArchiveCodec for CommandCodec {
    fn name(&self) -> &'static str {
        "7z-command"
    }

    async fn is_protected(&self, path: &Path) -> Result<bool> {
        let output = self.run_test(path, PROBE_PASSWORD).await?;
        if output.status.success() {
            return Ok(false);
        }

        let mut text = String::from_utf8_lossy(&output.stdout).to_lowercase();
        text.push_str(&String::from_utf8_lossy(&output.stderr).to_lowercase());
        let protected = PROTECTED_MARKERS.iter().any(|m| text.contains(m));

        trace!(archive = %path.display(), protected, status = ?output.status, "Probed archive");
        Ok(protected)
    }

    async fn test_password(&self, path: &Path, password: &str) -> Result<bool> {
        let output = self.run_test(path, password).await?;
        Ok(output.status.success())
    }
}
