//! Rule-based mutations.
//!
//! A [`RuleSet`] turns one word into a handful of close relatives: common
//! suffixes and prefixes, years, reversals and capitalisation. It is applied
//! only where a stage asks for it, never as part of candidate generation.

use std::collections::HashSet;

/// A single mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Append(String),
    Prepend(String),
    /// Append every year in the rule set's year window
    AppendYears,
    /// Prepend every year in the rule set's year window
    PrependYears,
    /// Append the last two digits of the current year
    AppendShortYear,
    Reverse,
    CapitalizeFirst,
    /// `word` -> `wordword`
    Double,
    /// `word` -> `worddrow`
    Mirror,
}

/// Ordered list of rules plus the year window they use.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    current_year: i32,
    year_span: i32,
}

const SUFFIXES: [&str; 22] = [
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "12", "123", "1234", "!", "!!", "?", "@",
    "#", "$", "111", "777", "000",
];
const PREFIXES: [&str; 3] = ["123", "!", "my"];

/// How many years back the year rules reach.
const YEAR_SPAN: i32 = 30;

impl RuleSet {
    pub fn new(rules: Vec<Rule>, current_year: i32) -> Self {
        Self {
            rules,
            current_year,
            year_span: YEAR_SPAN,
        }
    }

    /// The rules used when nothing else is configured.
    pub fn standard(current_year: i32) -> Self {
        let mut rules: Vec<Rule> = SUFFIXES
            .iter()
            .map(|s| Rule::Append((*s).to_string()))
            .collect();
        rules.extend(PREFIXES.iter().map(|p| Rule::Prepend((*p).to_string())));
        rules.extend([
            Rule::AppendYears,
            Rule::PrependYears,
            Rule::AppendShortYear,
            Rule::Reverse,
            Rule::CapitalizeFirst,
            Rule::Double,
            Rule::Mirror,
        ]);
        Self::new(rules, current_year)
    }

    /// Standard rules anchored at the local calendar year.
    pub fn for_today() -> Self {
        use chrono::Datelike;
        Self::standard(chrono::Local::now().year())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every mutation of `word`, in rule order, without duplicates and
    /// without `word` itself.
    pub fn apply(&self, word: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        seen.insert(word.to_string());
        let mut out = Vec::new();

        let mut push = |candidate: String| {
            if seen.insert(candidate.clone()) {
                out.push(candidate);
            }
        };

        let years = (self.current_year - self.year_span)..=self.current_year;
        for rule in &self.rules {
            match rule {
                Rule::Append(s) => push(format!("{word}{s}")),
                Rule::Prepend(s) => push(format!("{s}{word}")),
                Rule::AppendYears => years.clone().for_each(|y| push(format!("{word}{y}"))),
                Rule::PrependYears => years.clone().for_each(|y| push(format!("{y}{word}"))),
                Rule::AppendShortYear => {
                    push(format!("{word}{:02}", self.current_year.rem_euclid(100)))
                }
                Rule::Reverse => push(word.chars().rev().collect()),
                Rule::CapitalizeFirst => push(capitalize_first(word)),
                Rule::Double => push(word.repeat(2)),
                Rule::Mirror => {
                    let reversed: String = word.chars().rev().collect();
                    push(format!("{word}{reversed}"))
                }
            }
        }
        out
    }
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_rules_cover_suffixes_years_and_shape() {
        let rules = RuleSet::standard(2024);
        let out = rules.apply("invoice2023");

        for expected in [
            "invoice2023!",
            "invoice20231234",
            "myinvoice2023",
            "invoice20231994",
            "2024invoice2023",
            "invoice202324",
            "3202eciovni",
            "Invoice2023",
            "invoice2023invoice2023",
            "invoice20233202eciovni",
        ] {
            assert!(out.iter().any(|c| c == expected), "missing {expected}");
        }
        assert!(!out.iter().any(|c| c == "invoice20231993"));
    }

    #[test]
    fn output_excludes_word_and_duplicates() {
        let rules = RuleSet::standard(2024);
        // Palindrome: reverse is the word itself
        let out = rules.apply("abba");
        assert!(!out.iter().any(|c| c == "abba"));

        let mut sorted = out.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), out.len());
    }

    #[test]
    fn custom_rule_set_only_applies_its_rules() {
        let rules = RuleSet::new(vec![Rule::CapitalizeFirst, Rule::Append("1".into())], 2024);
        assert_eq!(rules.apply("pass"), vec!["Pass", "pass1"]);
        assert!(RuleSet::new(Vec::new(), 2024).apply("pass").is_empty());
    }

    #[test]
    fn capitalize_handles_empty_and_unicode() {
        assert_eq!(capitalize_first(""), "");
        assert_eq!(capitalize_first("élan"), "Élan");
    }
}
