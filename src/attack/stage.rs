use clap::ValueEnum;
use std::fmt;

/// One password source of the attack pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Stage {
    /// Passwords that opened earlier archives
    Common,
    /// Guesses derived from the archive's file name
    Guesses,
    /// Rule mutations of the file-name guesses
    MutatedGuesses,
    /// The user-supplied password file
    Dictionary,
    /// Rule mutations of the user-supplied passwords
    MutatedDictionary,
}

impl Stage {
    /// Order used unless configured otherwise.
    pub const DEFAULT_ORDER: [Stage; 5] = [
        Stage::Common,
        Stage::Guesses,
        Stage::MutatedGuesses,
        Stage::Dictionary,
        Stage::MutatedDictionary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Common => "common",
            Stage::Guesses => "guesses",
            Stage::MutatedGuesses => "mutated-guesses",
            Stage::Dictionary => "dictionary",
            Stage::MutatedDictionary => "mutated-dictionary",
        }
    }

    /// Whether a password found here is new to the common list.
    pub fn teaches_common(self) -> bool {
        self != Stage::Common
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
