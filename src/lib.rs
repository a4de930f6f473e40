//! # runlock
//!
//! Recover forgotten passwords of encrypted archives.
//!
//! Every protected archive found under a directory is attacked with a
//! fixed sequence of password sources, cheapest first:
//!
//! - passwords that already opened other archives
//! - guesses derived from the archive's own file name
//! - rule mutations of those guesses
//! - a user-supplied password file
//! - rule mutations of the user passwords
//!
//! All password tests in the process share one bounded [`WorkerPool`];
//! archives attacked side by side each get a sub-pool sized to their share.
//! Results are persisted through a single-writer [`Journal`], so a later
//! run skips everything already solved and tries learned passwords first.
//!
//! ## Example
//!
//! ```no_run
//! use runlock::{CandidateGenerator, RuleSet};
//!
//! let guesses = CandidateGenerator::default().generate("invoice_2023.zip");
//! assert!(guesses.iter().any(|g| g == "Invoice2023"));
//!
//! let mutated = RuleSet::standard(2024).apply("Invoice2023");
//! assert!(mutated.iter().any(|m| m == "Invoice2023!"));
//! ```

pub mod archive;
pub mod attack;
pub mod cli;
pub mod codec;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod generator;
pub mod io;
pub mod journal;
pub mod pool;
pub mod progress;
pub mod run;
pub mod state;

pub use archive::{FoundPassword, ProtectedArchive};
pub use attack::{AttackOutcome, AttackPipeline, Stage};
pub use cli::Cli;
pub use codec::{ArchiveCodec, CodecRegistry};
pub use config::Config;
pub use dispatch::{DispatchSummary, Dispatcher};
pub use error::ConfigError;
pub use generator::{CandidateGenerator, RuleSet};
pub use journal::{Journal, JournalHandle, JournalPaths, JournalStats};
pub use pool::WorkerPool;
pub use progress::ProgressTracker;
pub use run::{RunSummary, run, run_with_registry};
pub use state::SharedState;
