//! Find protected archives under a root directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::archive::ProtectedArchive;
use crate::codec::{ArchiveCodec, CodecRegistry, check_protected};
use crate::pool::WorkerPool;
use crate::state::SharedState;

#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Also skip archives listed in the not-found file
    pub skip_exhausted: bool,
}

/// Walk `root` and return every archive that asks for a password.
///
/// Archives with a known password are left out, as are archives already
/// listed as not found when `skip_exhausted` is set. Protection probes run
/// concurrently under `pool`. The result is sorted by path.
pub async fn discover(
    root: &Path,
    registry: &CodecRegistry,
    state: &SharedState,
    pool: &WorkerPool,
    options: &DiscoveryOptions,
    token: &CancellationToken,
) -> Vec<ProtectedArchive> {
    let candidates = collect_candidates(root, registry, state, options);
    info!(
        root = %root.display(),
        candidates = candidates.len(),
        "Probing archives for password protection"
    );

    let mut probes = JoinSet::new();
    for (path, codec) in candidates {
        let Some(permit) = pool.acquire(token).await else {
            break;
        };
        probes.spawn(async move {
            let _permit = permit;
            let protected = check_protected(codec.as_ref(), &path).await;
            protected.then(|| ProtectedArchive::new(path, codec))
        });
    }

    let mut archives = Vec::new();
    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok(Some(archive)) => archives.push(archive),
            Ok(None) => {}
            Err(e) => warn!("Protection probe failed: {}", e),
        }
    }
    archives.sort_by(|a, b| a.path().cmp(b.path()));

    info!(protected = archives.len(), "Discovery finished");
    archives
}

fn collect_candidates(
    root: &Path,
    registry: &CodecRegistry,
    state: &SharedState,
    options: &DiscoveryOptions,
) -> BTreeMap<PathBuf, Arc<dyn ArchiveCodec>> {
    let mut candidates = BTreeMap::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let Some(codec) = registry.for_path(&path) else {
            continue;
        };
        if state.is_found(&path) {
            debug!(archive = %path.display(), "Password already known");
            continue;
        }
        if options.skip_exhausted && state.is_exhausted(&path) {
            debug!(archive = %path.display(), "Listed as not found, skipping");
            continue;
        }
        candidates.insert(path, codec);
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use tempfile::TempDir;

    /// Treats every file whose name starts with "locked" as protected.
    struct ByName;

    #[async_trait]
    impl ArchiveCodec for ByName {
        fn name(&self) -> &'static str {
            "by-name"
        }

        async fn is_protected(&self, path: &Path) -> Result<bool> {
            let name = path.file_name().unwrap().to_string_lossy();
            Ok(name.starts_with("locked"))
        }

        async fn test_password(&self, _path: &Path, _password: &str) -> Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn finds_protected_archives_and_skips_known_ones() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        for name in ["locked1.zip", "open.zip", "locked2.txt", "locked3.zip", "locked4.zip"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::write(nested.join("locked5.ZIP"), b"x").unwrap();

        let mut registry = CodecRegistry::new();
        registry.register("zip", Arc::new(ByName));

        let found = HashMap::from([(dir.path().join("locked3.zip"), "pw".to_string())]);
        let exhausted = HashSet::from([dir.path().join("locked4.zip")]);
        let state = SharedState::from_parts(vec![], found, exhausted, vec![]);

        let pool = WorkerPool::new(2);
        let token = CancellationToken::new();

        let archives = discover(
            dir.path(),
            &registry,
            &state,
            &pool,
            &DiscoveryOptions { skip_exhausted: true },
            &token,
        )
        .await;
        let paths: Vec<_> = archives.iter().map(|a| a.path().to_path_buf()).collect();
        assert_eq!(paths, vec![dir.path().join("locked1.zip"), nested.join("locked5.ZIP")]);

        let archives = discover(
            dir.path(),
            &registry,
            &state,
            &pool,
            &DiscoveryOptions::default(),
            &token,
        )
        .await;
        assert_eq!(archives.len(), 3);
    }
}
