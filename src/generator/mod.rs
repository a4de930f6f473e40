//! Candidate password generation from archive file names.
//!
//! People name protected archives after what they contain and then pick a
//! password that looks a lot like the name. [`CandidateGenerator`] turns a
//! file name into those look-alikes:
//!
//! 1. the name without extension and each of its words (split on space,
//!    hyphen, underscore and dot) in original, upper, lower and title case;
//! 2. every contiguous run of two or more words joined without separator,
//!    in the same case variants plus an alternating-case variant;
//! 3. every candidate so far expanded through the [`leet`] table, varying
//!    at most `max_leet_positions` leading substitutable characters.
//!
//! [`RuleSet`] mutations are kept separate and applied by the attack stages
//! that ask for them.

pub mod leet;
pub mod rules;

pub use rules::{Rule, RuleSet};

use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Default cap on substitutable characters expanded per candidate.
pub const DEFAULT_MAX_LEET_POSITIONS: usize = 6;

const WORD_SEPARATORS: [char; 4] = [' ', '-', '_', '.'];

#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    max_leet_positions: usize,
}

impl Default for CandidateGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LEET_POSITIONS)
    }
}

impl CandidateGenerator {
    pub fn new(max_leet_positions: usize) -> Self {
        Self { max_leet_positions }
    }

    /// All guesses for `file_name`, first occurrence order, no duplicates.
    pub fn generate(&self, file_name: &str) -> Vec<String> {
        let stem = strip_extension(file_name);
        let mut base = Candidates::default();

        add_case_variants(&mut base, stem);

        let words = split_words(stem);
        for word in &words {
            add_case_variants(&mut base, word);
        }

        for len in 2..=words.len() {
            for run in words.windows(len) {
                let joined = run.concat();
                add_case_variants(&mut base, &joined);
                base.add(alternating_case(&joined));
            }
        }

        let mut out = Candidates::default();
        for candidate in base.into_vec() {
            if leet::substitutable_positions(&candidate) > self.max_leet_positions {
                debug!(
                    candidate = %candidate,
                    limit = self.max_leet_positions,
                    "Expanding only the leading substitutable characters"
                );
            }
            for variant in leet::expand_limited(&candidate, self.max_leet_positions) {
                out.add(variant);
            }
        }
        out.into_vec()
    }
}

/// Insertion-ordered set.
#[derive(Default)]
struct Candidates {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl Candidates {
    fn add(&mut self, candidate: String) {
        if !candidate.is_empty() && self.seen.insert(candidate.clone()) {
            self.ordered.push(candidate);
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}

fn strip_extension(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
}

fn split_words(text: &str) -> Vec<&str> {
    text.split(WORD_SEPARATORS)
        .filter(|w| !w.is_empty())
        .collect()
}

fn add_case_variants(set: &mut Candidates, word: &str) {
    set.add(word.to_string());
    set.add(word.to_uppercase());
    set.add(word.to_lowercase());
    set.add(title_case(word));
}

/// Upper-case the first letter of every word, lower-case the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if WORD_SEPARATORS.contains(&c) {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Upper-case characters at even positions, keep the others.
fn alternating_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        if i % 2 == 0 {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}
