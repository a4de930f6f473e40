//! Shared run state.
//!
//! Holds what the persisted files said at start-up plus everything learned
//! since: the common-password list, found passwords, archives that resisted
//! every stage, and the user dictionary. All of it is shared by every
//! consumer, so each collection sits behind its own short-lived lock.

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::archive::FoundPassword;
use crate::journal::JournalPaths;

#[derive(Default)]
struct CommonList {
    ordered: Vec<String>,
    set: HashSet<String>,
}

impl CommonList {
    fn insert(&mut self, password: &str) -> bool {
        if self.set.contains(password) {
            return false;
        }
        self.set.insert(password.to_string());
        self.ordered.push(password.to_string());
        true
    }
}

pub struct SharedState {
    common: RwLock<CommonList>,
    found: Mutex<HashMap<PathBuf, String>>,
    exhausted: Mutex<HashSet<PathBuf>>,
    dictionary: Arc<[String]>,
}

impl SharedState {
    /// Read the persisted files and the user dictionary.
    ///
    /// Missing persisted files are created empty. A missing user dictionary
    /// is an error.
    pub async fn load(paths: &JournalPaths, user_passwords: &Path) -> Result<Self> {
        let common_lines = read_or_create(&paths.common).await?;
        let found_lines = read_or_create(&paths.found).await?;
        let not_found_lines = read_or_create(&paths.not_found).await?;

        let dictionary_text = tokio::fs::read_to_string(user_passwords)
            .await
            .with_context(|| format!("Failed to read {}", user_passwords.display()))?;
        let dictionary = unique_lines(lines_of(&dictionary_text));
        if dictionary.is_empty() {
            warn!(file = %user_passwords.display(), "User password file is empty");
        }

        let mut found = HashMap::new();
        for line in &found_lines {
            match FoundPassword::parse_line(line) {
                Some(entry) => {
                    found.entry(entry.file).or_insert(entry.password);
                }
                None => warn!(
                    file = %paths.found.display(),
                    line = %line,
                    "Skipping malformed line"
                ),
            }
        }

        let state = Self::from_parts(
            common_lines,
            found,
            not_found_lines.into_iter().map(PathBuf::from).collect(),
            dictionary,
        );

        info!(
            common = state.common_len(),
            found = state.found_len(),
            not_found = state.exhausted_len(),
            dictionary = state.dictionary.len(),
            "Loaded password files"
        );
        Ok(state)
    }

    /// Build state directly, without touching the filesystem.
    pub fn from_parts(
        common: Vec<String>,
        found: HashMap<PathBuf, String>,
        exhausted: HashSet<PathBuf>,
        dictionary: Vec<String>,
    ) -> Self {
        let mut list = CommonList::default();
        for password in &common {
            list.insert(password);
        }
        Self {
            common: RwLock::new(list),
            found: Mutex::new(found),
            exhausted: Mutex::new(exhausted),
            dictionary: dictionary.into(),
        }
    }

    /// Current common passwords, in the order they were learned.
    pub fn common_snapshot(&self) -> Vec<String> {
        self.common
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered
            .clone()
    }

    pub fn common_len(&self) -> usize {
        self.common.read().unwrap_or_else(PoisonError::into_inner).ordered.len()
    }

    pub fn is_common(&self, password: &str) -> bool {
        self.common
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .set
            .contains(password)
    }

    /// Add `password` to the common list. Returns `true` only for the
    /// caller that actually added it; that caller persists it.
    pub fn learn_common(&self, password: &str) -> bool {
        if self.is_common(password) {
            return false;
        }
        self.common
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(password)
    }

    /// Record a found password. Returns `false` if the archive already had one.
    pub fn record_found(&self, found: &FoundPassword) -> bool {
        let mut map = self.found.lock().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&found.file) {
            debug!(archive = %found.file.display(), "Password already recorded");
            return false;
        }
        map.insert(found.file.clone(), found.password.clone());
        true
    }

    pub fn found_password(&self, path: &Path) -> Option<String> {
        self.found
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn is_found(&self, path: &Path) -> bool {
        self.found
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    pub fn found_len(&self) -> usize {
        self.found.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `false` if the archive was already listed.
    pub fn record_exhausted(&self, path: &Path) -> bool {
        self.exhausted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf())
    }

    pub fn is_exhausted(&self, path: &Path) -> bool {
        self.exhausted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }

    pub fn exhausted_len(&self) -> usize {
        self.exhausted.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn dictionary(&self) -> &[String] {
        &self.dictionary
    }
}

async fn read_or_create(path: &Path) -> Result<Vec<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(lines_of(&text).map(str::to_string).collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(file = %path.display(), "File not found, creating an empty one");
            tokio::fs::write(path, b"")
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Vec::new())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

fn lines_of(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.is_empty())
}

fn unique_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .filter(|l| seen.insert(*l))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths_in(dir: &Path) -> JournalPaths {
        JournalPaths {
            common: dir.join("common_passwords.txt"),
            found: dir.join("found_passwords.txt"),
            not_found: dir.join("not_found.txt"),
        }
    }

    #[tokio::test]
    async fn missing_files_are_created() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(dir.path());
        let dict = dir.path().join("dict.txt");
        std::fs::write(&dict, "alpha\r\nbeta\n\nalpha\n").unwrap();

        let state = SharedState::load(&paths, &dict).await.unwrap();
        assert!(paths.common.exists());
        assert!(paths.found.exists());
        assert!(paths.not_found.exists());
        assert_eq!(&*state.dictionary(), &["alpha".to_string(), "beta".to_string()]);
    }

    #[tokio::test]
    async fn missing_dictionary_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = SharedState::load(&paths_in(dir.path()), &dir.path().join("nope.txt")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn loads_existing_results() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(dir.path());
        std::fs::write(&paths.common, "123456\nqwerty\n123456\n").unwrap();
        std::fs::write(
            &paths.found,
            "File: /x/a.zip | Password: pw1\ngarbage\nFile: /x/a.zip | Password: pw2\n",
        )
        .unwrap();
        std::fs::write(&paths.not_found, "/x/b.rar\n").unwrap();
        let dict = dir.path().join("dict.txt");
        std::fs::write(&dict, "").unwrap();

        let state = SharedState::load(&paths, &dict).await.unwrap();
        assert_eq!(state.common_snapshot(), vec!["123456", "qwerty"]);
        assert_eq!(state.found_password(Path::new("/x/a.zip")).as_deref(), Some("pw1"));
        assert!(state.is_exhausted(Path::new("/x/b.rar")));
        assert!(state.dictionary().is_empty());
    }

    #[test]
    fn first_learner_wins() {
        let state =
            SharedState::from_parts(vec!["a".into()], HashMap::new(), HashSet::new(), vec![]);
        assert!(!state.learn_common("a"));
        assert!(state.learn_common("b"));
        assert!(!state.learn_common("b"));
        assert_eq!(state.common_snapshot(), vec!["a", "b"]);
    }

    #[test]
    fn one_found_password_per_archive() {
        let state = SharedState::from_parts(vec![], HashMap::new(), HashSet::new(), vec![]);
        assert!(state.record_found(&FoundPassword::new("a.zip", "x")));
        assert!(!state.record_found(&FoundPassword::new("a.zip", "y")));
        assert_eq!(state.found_password(Path::new("a.zip")).as_deref(), Some("x"));
    }
}
