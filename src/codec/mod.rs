//! Archive codecs.
//!
//! A codec knows one archive format well enough to answer two questions:
//! does this file need a password, and does this password open it. The
//! rest of the crate treats codecs as opaque and possibly slow; any error
//! they return is folded into a plain `false` by [`check_protected`] and
//! [`check_password`].
//!
//! Codecs are looked up by file extension through a [`CodecRegistry`].
//! Supporting a new format means registering another implementation.

mod command;
pub mod zip;

pub use command::CommandCodec;
pub use zip::ZipCodec;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// Format-specific password oracle.
#[async_trait]
pub trait ArchiveCodec: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Whether the archive at `path` requires a password
    async fn is_protected(&self, path: &Path) -> Result<bool>;

    /// Whether `password` unlocks the archive at `path`
    async fn test_password(&self, path: &Path, password: &str) -> Result<bool>;

    /// Drop any per-archive state cached by earlier calls.
    fn forget(&self, _path: &Path) {}
}

/// Probe protection, treating every codec error as "not protected".
pub async fn check_protected(codec: &dyn ArchiveCodec, path: &Path) -> bool {
    match codec.is_protected(path).await {
        Ok(protected) => protected,
        Err(e) => {
            trace!(archive = %path.display(), codec = codec.name(), "Probe failed: {:#}", e);
            false
        }
    }
}

/// Test a password, treating every codec error as "incorrect".
pub async fn check_password(codec: &dyn ArchiveCodec, path: &Path, password: &str) -> bool {
    match codec.test_password(path, password).await {
        Ok(ok) => ok,
        Err(e) => {
            trace!(
                archive = %path.display(),
                codec = codec.name(),
                "Password test failed: {:#}",
                e
            );
            false
        }
    }
}

/// Extension -> codec map.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn ArchiveCodec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in ZIP support plus an external 7-Zip program for the rest.
    pub fn with_defaults(seven_zip: impl Into<PathBuf>) -> Self {
        let mut registry = Self::new();
        registry.register("zip", Arc::new(ZipCodec::new()));

        let external: Arc<dyn ArchiveCodec> = Arc::new(CommandCodec::new(seven_zip));
        for ext in ["7z", "rar", "001"] {
            registry.register(ext, Arc::clone(&external));
        }
        registry
    }

    /// Register `codec` for `extension` (leading dot and case ignored).
    pub fn register(&mut self, extension: &str, codec: Arc<dyn ArchiveCodec>) {
        self.codecs.insert(normalize_extension(extension), codec);
    }

    pub fn for_path(&self, path: &Path) -> Option<Arc<dyn ArchiveCodec>> {
        let ext = path.extension()?.to_str()?;
        self.codecs.get(&normalize_extension(ext)).cloned()
    }

    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}
