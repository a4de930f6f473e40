//! Built-in ZIP codec.
//!
//! ## Architecture
//!
//! - [`structures`]: ZIP format records (EOCD, ZIP64, entry metadata and flags)
//! - [`parser`]: random-access Central Directory parser
//!
//! Protection probing only reads the Central Directory through [`ZipParser`].
//! An archive counts as protected when any file entry is encrypted with
//! ZipCrypto or WinZip AES.
//!
//! Password checks go through the `zip` crate and always use the smallest
//! encrypted entry. A check decrypts that entry and reads it to the end, so
//! a wrong password that slips past the header verifier still fails on the
//! CRC (or the AES authentication code). Opened archives are kept per path
//! and reused until [`ArchiveCodec::forget`] is called for the archive.
//!
//! ## Limitations
//!
//! - PKWARE strong encryption is detected but not attacked
//! - No multi-disk archive support

mod parser;
mod structures;

pub use parser::ZipParser;
pub use structures::*;

use ::zip::ZipArchive;
use ::zip::result::ZipError;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use super::ArchiveCodec;
use crate::io::LocalFileReader;

/// The entry every password of one archive is checked against, plus the
/// archive handles idle between checks.
struct CheckTarget {
    path: PathBuf,
    index: usize,
    idle: Mutex<Vec<ZipArchive<File>>>,
}

impl CheckTarget {
    fn open(path: &Path) -> Result<Self> {
        let mut archive = open_archive(path)?;
        let (index, name, size) = smallest_encrypted(&mut archive)?
            .with_context(|| format!("{} has no encrypted entry", path.display()))?;

        debug!(
            archive = %path.display(),
            entry = %name,
            size,
            "Selected entry for password checks"
        );

        Ok(Self {
            path: path.to_path_buf(),
            index,
            idle: Mutex::new(vec![archive]),
        })
    }

    /// Runs on a blocking thread; concurrent checks each take their own handle.
    fn check(&self, password: &[u8]) -> Result<bool> {
        let idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop();
        let mut archive = match idle {
            Some(archive) => archive,
            None => open_archive(&self.path)?,
        };

        let verdict = check_entry(&mut archive, self.index, password);

        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(archive);
        verdict
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open archive {}", path.display()))?;
    ZipArchive::new(file).with_context(|| format!("Failed to read ZIP archive {}", path.display()))
}

/// Index, name and stored size of the smallest encrypted file entry.
fn smallest_encrypted<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Option<(usize, String, u64)>> {
    let mut best: Option<(usize, String, u64)> = None;
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        if entry.is_dir() || !entry.encrypted() {
            continue;
        }
        let size = entry.compressed_size();
        if best.as_ref().is_none_or(|(_, _, smallest)| size < *smallest) {
            best = Some((index, entry.name().to_string(), size));
        }
    }
    Ok(best)
}

/// Decrypt entry `index` with `password` and read it to the end.
fn check_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
    password: &[u8],
) -> Result<bool> {
    let mut entry = match archive.by_index_decrypt(index, password) {
        Ok(entry) => entry,
        Err(ZipError::InvalidPassword) => return Ok(false),
        Err(e) => bail!("Cannot decrypt entry {}: {}", index, e),
    };

    // Header collisions are rare; only those pay for the full read.
    Ok(std::io::copy(&mut entry, &mut std::io::sink()).is_ok())
}

/// ZIP codec: [`ZipParser`] for probing, the `zip` crate for password checks.
#[derive(Default)]
pub struct ZipCodec {
    targets: Mutex<HashMap<PathBuf, Arc<CheckTarget>>>,
}

impl ZipCodec {
    pub fn new() -> Self {
        Self::default()
    }

    async fn list_entries(path: &Path) -> Result<Vec<ZipFileEntry>> {
        let reader = Arc::new(LocalFileReader::open(path)?);
        let parser = ZipParser::new(reader);
        parser
            .list_files()
            .await
            .with_context(|| format!("Failed to read ZIP directory of {}", path.display()))
    }

    /// Load (or reuse) the check target of `path`.
    async fn target(&self, path: &Path) -> Result<Arc<CheckTarget>> {
        let cached = self
            .targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned();
        if let Some(target) = cached {
            return Ok(target);
        }

        let owned = path.to_path_buf();
        let target = tokio::task::spawn_blocking(move || CheckTarget::open(&owned)).await??;
        let target = Arc::new(target);

        // A concurrent loader may have won; either copy is equivalent.
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), Arc::clone(&target));
        Ok(target)
    }

    #[cfg(test)]
    fn is_open(&self, path: &Path) -> bool {
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }
}

#[async_trait]
impl ArchiveCodec for ZipCodec {
    fn name(&self) -> &'static str {
        "zip"
    }

    async fn is_protected(&self, path: &Path) -> Result<bool> {
        let entries = Self::list_entries(path).await?;
        if entries.iter().any(ZipFileEntry::is_attackable) {
            return Ok(true);
        }

        if entries
            .iter()
            .any(|e| e.encryption() == EntryEncryption::Unsupported)
        {
            warn!(
                archive = %path.display(),
                "Archive uses PKWARE strong encryption, which cannot be attacked"
            );
        }
        Ok(false)
    }

    async fn test_password(&self, path: &Path, password: &str) -> Result<bool> {
        let target = self.target(path).await?;
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || target.check(password.as_bytes())).await?
    }

    fn forget(&self, path: &Path) {
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
    }
}
