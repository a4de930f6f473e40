//! Error types.
//!
//! Operational code returns `anyhow::Result`. Only start-up validation has
//! a typed error, so `main` can report it once and exit before any work.

use std::path::PathBuf;
use thiserror::Error;

use crate::attack::Stage;

/// Invalid command line or missing inputs
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Archive directory '{0}' does not exist or is not a directory")]
    MissingRoot(PathBuf),

    #[error("Password file '{0}' does not exist")]
    MissingPasswords(PathBuf),

    #[error("Invalid job count {count}: must be between 1 and {max}")]
    InvalidJobs { count: usize, max: usize },

    #[error("Invalid archive count {0}: must be at least 1")]
    InvalidArchives(usize),

    #[error("Invalid queue depth {0}: must be at least 1")]
    InvalidQueueDepth(usize),

    #[error("At least one stage is required")]
    NoStages,

    #[error("Stage '{0}' is listed more than once")]
    DuplicateStage(Stage),

    #[error("Cannot resolve '{path}': {reason}")]
    BadPath { path: PathBuf, reason: String },
}
