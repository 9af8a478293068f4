//! # Deterministic Checks Module
//!
//! ## Purpose
//! Pure-regex style checks that run on every citation regardless of LLM
//! availability: quote-character style, non-breaking-space placement, and
//! parenthetical capitalization.
//!
//! ## Input/Output Specification
//! - **Input**: Citation text
//! - **Output**: Zero or more [`ValidationFinding`]s per check
//! - **Determinism**: No I/O, no state; identical input yields identical
//!   findings
//!
//! ## Key Features
//! - At most one quote-style finding per quote-character family
//! - Fixed table of token-pair patterns requiring a non-breaking space
//! - Last-parenthetical capitalization check with subsequent-history and
//!   quotation skips

use crate::errors::{CheckError, Result};
use crate::{RuleSource, ValidationFinding};
use regex::Regex;
use std::collections::HashSet;

/// Parenthetical prefixes that exempt the capitalization check
const PAREN_SKIP_PREFIXES: &[&str] = &[
    "aff'd",
    "rev'd",
    "cert. denied",
    "sub nom.",
    "id.",
    "citing",
    "quoting",
    "alterations in original",
];

/// One entry of the non-breaking-space pattern table
struct NbspPattern {
    /// What the pattern joins, for the finding description
    label: &'static str,
    regex: Regex,
}

/// The always-on deterministic style checks
pub struct DeterministicCheckSet {
    nbsp_patterns: Vec<NbspPattern>,
    paren_regex: Regex,
}

impl DeterministicCheckSet {
    /// Build the check set, compiling every pattern
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| -> Result<Regex> {
            Regex::new(pattern).map_err(|e| CheckError::Internal {
                message: format!("Invalid check regex: {}", e),
            })
        };

        // Token pairs whose separating space must be non-breaking. Each
        // pattern matches the offending plain-space form.
        let nbsp_patterns = vec![
            NbspPattern {
                label: "section symbol and number",
                regex: compile(r"§§? \d")?,
            },
            NbspPattern {
                label: "paragraph symbol and number",
                regex: compile(r"¶¶? \d")?,
            },
            NbspPattern {
                label: "labeled identifier and value",
                regex: compile(r"\bNos?\. \d")?,
            },
            NbspPattern {
                label: "list marker and letter",
                regex: compile(r"\b(?:app|pt|ch|ex)\. [A-Z0-9]")?,
            },
            NbspPattern {
                label: "time and meridiem marker",
                regex: compile(r"\d{1,2}(?::\d{2})? [APap]\.?[Mm]\.?")?,
            },
            NbspPattern {
                label: "abbreviated month and day",
                regex: compile(r"\b(?:Jan|Feb|Mar|Apr|Aug|Sept|Oct|Nov|Dec)\. \d")?,
            },
            NbspPattern {
                label: "word before v. in a case name",
                regex: compile(r"[A-Za-z'’.]+ v\.")?,
            },
        ];

        Ok(Self {
            nbsp_patterns,
            paren_regex: compile(r"\(([^)]*)\)")?,
        })
    }

    /// Run every check and collect the findings
    pub fn run(&self, citation_text: &str) -> Vec<ValidationFinding> {
        let mut findings = Vec::new();
        findings.extend(self.check_quote_style(citation_text));
        findings.extend(self.check_non_breaking_spaces(citation_text));
        findings.extend(self.check_parenthetical_capitalization(citation_text));
        findings
    }

    /// Flag straight quote characters; style mandates curly quotes.
    /// At most one finding per quote-character family.
    fn check_quote_style(&self, text: &str) -> Vec<ValidationFinding> {
        let mut findings = Vec::new();

        if text.contains('"') {
            findings.push(ValidationFinding {
                error_type: "curly_quotes_error".to_string(),
                description: "Straight double quotation mark; style requires curly quotes"
                    .to_string(),
                local_rule_id: None,
                general_rule_id: None,
                rule_source: Some(RuleSource::LocalStyle),
                confidence: 1.0,
                current: Some("\"".to_string()),
                correct: Some("\u{201C} or \u{201D}".to_string()),
                rule_text_quote: None,
            });
        }

        if text.contains('\'') {
            findings.push(ValidationFinding {
                error_type: "curly_quotes_error".to_string(),
                description: "Straight single quotation mark; style requires curly quotes"
                    .to_string(),
                local_rule_id: None,
                general_rule_id: None,
                rule_source: Some(RuleSource::LocalStyle),
                confidence: 1.0,
                current: Some("'".to_string()),
                correct: Some("\u{2018} or \u{2019}".to_string()),
                rule_text_quote: None,
            });
        }

        findings
    }

    /// Flag plain spaces where the pattern table requires a non-breaking
    /// space. Identical findings are deduplicated by serialized field set.
    fn check_non_breaking_spaces(&self, text: &str) -> Vec<ValidationFinding> {
        let mut findings = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for pattern in &self.nbsp_patterns {
            for m in pattern.regex.find_iter(text) {
                let current = m.as_str().to_string();
                let correct = current.replace(' ', "\u{00A0}");

                let finding = ValidationFinding {
                    error_type: "non_breaking_space_error".to_string(),
                    description: format!(
                        "Plain space between {} should be a non-breaking space",
                        pattern.label
                    ),
                    local_rule_id: None,
                    general_rule_id: None,
                    rule_source: Some(RuleSource::LocalStyle),
                    confidence: 1.0,
                    current: Some(current),
                    correct: Some(correct),
                    rule_text_quote: None,
                };

                let key = serde_json::to_string(&finding).unwrap_or_default();
                if seen.insert(key) {
                    findings.push(finding);
                }
            }
        }

        findings
    }

    /// Inspect the final explanatory parenthetical: it must open lowercase
    /// unless it starts with a quotation mark or a subsequent-history or
    /// signal prefix.
    fn check_parenthetical_capitalization(&self, text: &str) -> Vec<ValidationFinding> {
        let last_inner = match self
            .paren_regex
            .captures_iter(text)
            .last()
            .and_then(|caps| caps.get(1))
        {
            Some(m) => m.as_str(),
            None => return Vec::new(),
        };

        let trimmed = last_inner.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let first = match trimmed.chars().next() {
            Some(c) => c,
            None => return Vec::new(),
        };

        if matches!(first, '"' | '\'' | '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}') {
            return Vec::new();
        }

        // Normalize curly apostrophes so aff'd matches either form
        let comparable = trimmed.replace('\u{2019}', "'").to_lowercase();
        if PAREN_SKIP_PREFIXES
            .iter()
            .any(|prefix| comparable.starts_with(prefix))
        {
            return Vec::new();
        }

        if !first.is_uppercase() {
            return Vec::new();
        }

        let mut corrected: String = first.to_lowercase().collect();
        corrected.push_str(&trimmed[first.len_utf8()..]);

        vec![ValidationFinding {
            error_type: "parenthetical_capitalization_error".to_string(),
            description: "Explanatory parenthetical should open lowercase".to_string(),
            local_rule_id: None,
            general_rule_id: None,
            rule_source: Some(RuleSource::LocalStyle),
            confidence: 0.9,
            current: Some(format!("({})", trimmed)),
            correct: Some(format!("({})", corrected)),
            rule_text_quote: None,
        }]
    }
}
