//! Runtime configuration resolved from the command line.

use std::path::{Path, PathBuf};

use crate::attack::Stage;
use crate::cli::Cli;
use crate::error::ConfigError;
use crate::journal::JournalPaths;

/// Upper bound on concurrent password tests
const MAX_JOBS: usize = 1024;

/// Default number of archives attacked side by side
const DEFAULT_ARCHIVES: usize = 4;

pub const COMMON_FILE: &str = "common_passwords.txt";
pub const FOUND_FILE: &str = "found_passwords.txt";
pub const NOT_FOUND_FILE: &str = "not_found.txt";

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub user_passwords: PathBuf,
    pub files: JournalPaths,
    pub pool_capacity: usize,
    pub consumers: usize,
    pub queue_depth: usize,
    pub stages: Vec<Stage>,
    pub max_leet_positions: usize,
    pub skip_exhausted: bool,
    pub seven_zip: PathBuf,
}

impl Config {
    /// Validate `cli` and fill in defaults.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        if !cli.dir.is_dir() {
            return Err(ConfigError::MissingRoot(cli.dir.clone()));
        }
        if !cli.passwords.is_file() {
            return Err(ConfigError::MissingPasswords(cli.passwords.clone()));
        }
        // Persisted paths are compared across runs, so pin them down.
        let root = canonical(&cli.dir)?;

        let pool_capacity = cli.jobs.unwrap_or_else(default_jobs);
        if !(1..=MAX_JOBS).contains(&pool_capacity) {
            return Err(ConfigError::InvalidJobs {
                count: pool_capacity,
                max: MAX_JOBS,
            });
        }

        let consumers = cli
            .archives
            .unwrap_or_else(|| DEFAULT_ARCHIVES.min(pool_capacity));
        if consumers == 0 {
            return Err(ConfigError::InvalidArchives(consumers));
        }
        if cli.queue_depth == 0 {
            return Err(ConfigError::InvalidQueueDepth(cli.queue_depth));
        }

        validate_stages(&cli.stages)?;

        let files = JournalPaths {
            common: cli.common.clone().unwrap_or_else(|| root.join(COMMON_FILE)),
            found: cli.found.clone().unwrap_or_else(|| root.join(FOUND_FILE)),
            not_found: cli
                .not_found
                .clone()
                .unwrap_or_else(|| root.join(NOT_FOUND_FILE)),
        };

        Ok(Self {
            root,
            user_passwords: cli.passwords.clone(),
            files,
            pool_capacity,
            consumers,
            queue_depth: cli.queue_depth,
            stages: cli.stages.clone(),
            max_leet_positions: cli.max_leet_positions,
            skip_exhausted: cli.skip_exhausted,
            seven_zip: cli.seven_zip.clone(),
        })
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn canonical(path: &Path) -> Result<PathBuf, ConfigError> {
    path.canonicalize().map_err(|e| ConfigError::BadPath {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn validate_stages(stages: &[Stage]) -> Result<(), ConfigError> {
    if stages.is_empty() {
        return Err(ConfigError::NoStages);
    }
    for (i, stage) in stages.iter().enumerate() {
        if stages[..i].contains(stage) {
            return Err(ConfigError::DuplicateStage(*stage));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("runlock").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn resolves_defaults_inside_root() {
        let dir = TempDir::new().unwrap();
        let words = dir.path().join("words.txt");
        std::fs::write(&words, "x\n").unwrap();
        let root = dir.path().to_str().unwrap();
        let words = words.to_str().unwrap();

        let config = Config::from_cli(&cli(&["-z", root, "-p", words, "-j", "8"])).unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(config.files.common, canonical.join(COMMON_FILE));
        assert_eq!(config.files.found, canonical.join(FOUND_FILE));
        assert_eq!(config.files.not_found, canonical.join(NOT_FOUND_FILE));
        assert_eq!(config.pool_capacity, 8);
        assert_eq!(config.consumers, 4);

        let config = Config::from_cli(&cli(&["-z", root, "-p", words, "-j", "2"])).unwrap();
        assert_eq!(config.consumers, 2);
    }

    #[test]
    fn rejects_missing_inputs() {
        let dir = TempDir::new().unwrap();
        let words = dir.path().join("words.txt");
        let root = dir.path().to_str().unwrap();

        let err = Config::from_cli(&cli(&["-z", root, "-p", words.to_str().unwrap()])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingPasswords(_)));

        std::fs::write(&words, "").unwrap();
        let missing = dir.path().join("nope");
        let missing = missing.to_str().unwrap();
        let words = words.to_str().unwrap();
        let err = Config::from_cli(&cli(&["-z", missing, "-p", words])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRoot(_)));
    }

    #[test]
    fn rejects_bad_counts_and_stages() {
        let dir = TempDir::new().unwrap();
        let words = dir.path().join("words.txt");
        std::fs::write(&words, "").unwrap();
        let root = dir.path().to_str().unwrap();
        let words = words.to_str().unwrap();

        let err = Config::from_cli(&cli(&["-z", root, "-p", words, "-j", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJobs { .. }));

        let err = Config::from_cli(&cli(&["-z", root, "-p", words, "-a", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidArchives(0)));

        let args = ["-z", root, "-p", words, "--stages", "common,common"];
        let err = Config::from_cli(&cli(&args)).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateStage(Stage::Common)));
    }
}
