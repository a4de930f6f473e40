use clap::Parser;
use std::path::PathBuf;

use crate::attack::Stage;

#[derive(Parser, Debug, Clone)]
#[command(name = "runlock")]
#[command(version)]
#[command(about = "Recover passwords of encrypted archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  runlock -z ~/archives -p words.txt              attack every archive under ~/archives\n  \
  runlock -z . -p words.txt -j 16 -a 2            16 parallel tests, at most 2 archives at once\n  \
  runlock -z . -p words.txt --stages common,dictionary   only try known and user passwords")]
pub struct Cli {
    /// Directory searched recursively for archives
    #[arg(short = 'z', long = "dir", value_name = "DIR")]
    pub dir: PathBuf,

    /// File with one candidate password per line
    #[arg(short = 'p', long = "passwords", value_name = "FILE")]
    pub passwords: PathBuf,

    /// Common-password list (default: <DIR>/common_passwords.txt)
    #[arg(long, value_name = "FILE")]
    pub common: Option<PathBuf>,

    /// Where found passwords are recorded (default: <DIR>/found_passwords.txt)
    #[arg(long, value_name = "FILE")]
    pub found: Option<PathBuf>,

    /// Where archives without a match are recorded (default: <DIR>/not_found.txt)
    #[arg(long, value_name = "FILE")]
    pub not_found: Option<PathBuf>,

    /// Maximum password tests running at once (default: available CPUs)
    #[arg(short = 'j', long, value_name = "NUM")]
    pub jobs: Option<usize>,

    /// Archives attacked in parallel (default: min(4, jobs))
    #[arg(short = 'a', long, value_name = "NUM")]
    pub archives: Option<usize>,

    /// Bound of the archive queue
    #[arg(long, default_value_t = crate::dispatch::DEFAULT_QUEUE_DEPTH, value_name = "NUM")]
    pub queue_depth: usize,

    /// Password sources, tried in the given order
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = Stage::DEFAULT_ORDER,
        value_name = "STAGE"
    )]
    pub stages: Vec<Stage>,

    /// Expand at most this many substitutable characters per guess
    #[arg(long, default_value_t = crate::generator::DEFAULT_MAX_LEET_POSITIONS, value_name = "NUM")]
    pub max_leet_positions: usize,

    /// Skip archives already listed in the not-found file
    #[arg(long)]
    pub skip_exhausted: bool,

    /// 7-Zip compatible program used for 7z, rar and split archives
    #[arg(long, default_value = "7z", value_name = "PROGRAM")]
    pub seven_zip: PathBuf,

    /// More output (-vv => trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only warnings and errors
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// `tracing` filter directive implied by -v/-q.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "runlock=warn,warn";
        }
        match self.verbose {
            0 => "runlock=info,warn",
            1 => "runlock=debug,warn",
            _ => "runlock=trace,warn",
        }
    }
}
