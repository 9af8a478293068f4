//! # Rule Retrieval Module
//!
//! ## Purpose
//! Ranks the rules relevant to a citation by keyword overlap against the
//! per-corpus inverted indexes and returns a priority-ordered, quota-limited
//! selection with a full coverage audit trail.
//!
//! ## Input/Output Specification
//! - **Input**: Raw citation text, per-corpus retrieval quotas
//! - **Output**: `Vec<RuleMatch>` (local corpus always listed first) plus a
//!   [`RetrievalCoverage`] audit record
//! - **Priority**: The local style corpus takes precedence whenever both
//!   corpora have candidates, regardless of relative scores. This is a hard
//!   business rule, not a scoring artifact
//!
//! ## Key Features
//! - Term extraction from signal words, structural cues, and raw tokens
//! - Per-corpus keyword-overlap scoring, +1.0 per matching term
//! - Ties resolve by flattening order via stable sort
//! - Prompt-ready rendering with the priority corpus section first

use crate::corpus::{KeywordIndex, RuleCorpus, RuleRecord};
use crate::errors::{CheckError, Result};
use crate::{CorpusCoverage, RetrievalCoverage, RuleSource};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Citation signal words that double as retrieval terms
const SIGNAL_WORDS: &[&str] = &[
    "see", "see also", "cf.", "but see", "compare", "e.g.", "accord", "supra", "infra", "id.",
];

/// A scored retrieval result, produced fresh per call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule_id: String,
    pub source: RuleSource,
    pub title: String,
    pub text: String,
    /// Keyword-overlap score
    pub score: f32,
    pub match_type: MatchType,
}

/// How a rule was matched; keyword overlap today, extensible later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Keyword,
}

/// Keyword-overlap rule retriever over an immutable [`RuleCorpus`]
pub struct RuleRetriever {
    corpus: Arc<RuleCorpus>,
    docket_regex: Regex,
    reporter_regex: Regex,
    pincite_regex: Regex,
    token_regex: Regex,
}

impl RuleRetriever {
    /// Build a retriever over a loaded corpus
    pub fn new(corpus: Arc<RuleCorpus>) -> Result<Self> {
        let compile = |pattern: &str| -> Result<Regex> {
            Regex::new(pattern).map_err(|e| CheckError::Internal {
                message: format!("Invalid retrieval regex: {}", e),
            })
        };

        Ok(Self {
            corpus,
            docket_regex: compile(r"\bNo\.\s*\d+[-–:]?\w*")?,
            reporter_regex: compile(r"\d+\s+[A-Z][A-Za-z0-9.'\s]{0,30}?\s\d+")?,
            pincite_regex: compile(r"\bat\s+\d+")?,
            token_regex: compile(r"\b[a-z0-9]{3,}\b")?,
        })
    }

    /// Extract the deduplicated search-term set for a citation.
    ///
    /// Signal words, structural cue tags, and raw tokens are collected
    /// independently and non-exclusively; the result is sorted for
    /// reproducible coverage reporting.
    pub fn extract_terms(&self, citation_text: &str) -> Vec<String> {
        let lowered = citation_text.to_lowercase();
        let mut terms: BTreeSet<String> = BTreeSet::new();

        // (a) citation signal words
        for signal in SIGNAL_WORDS {
            if lowered.contains(signal) {
                terms.insert((*signal).to_string());
            }
        }

        // (b) structural cue tags
        if self.docket_regex.is_match(citation_text) {
            terms.insert("docket".to_string());
            terms.insert("number".to_string());
        }
        if self.reporter_regex.is_match(citation_text) {
            terms.insert("court".to_string());
            terms.insert("abbreviation".to_string());
            terms.insert("reporter".to_string());
        }
        if citation_text.contains('(') && citation_text.contains(')') {
            terms.insert("parenthetical".to_string());
            terms.insert("explanatory".to_string());
        }
        if self.pincite_regex.is_match(&lowered) {
            terms.insert("page".to_string());
            terms.insert("pincite".to_string());
        }
        if citation_text.contains(" v. ") {
            terms.insert("case".to_string());
            terms.insert("name".to_string());
        }

        // (c) raw lowercase alphanumeric tokens
        for token in self.token_regex.find_iter(&lowered) {
            terms.insert(token.as_str().to_string());
        }

        terms.into_iter().collect()
    }

    /// Retrieve the rules relevant to a citation.
    ///
    /// Returns the quota-limited selection (local matches first) and the
    /// coverage statistics required for retrieval auditability.
    pub fn retrieve(
        &self,
        citation_text: &str,
        max_local: usize,
        max_general: usize,
    ) -> (Vec<RuleMatch>, RetrievalCoverage) {
        let terms = self.extract_terms(citation_text);

        let (local_matches, local_coverage) = score_corpus(
            self.corpus.local_records(),
            self.corpus.local_index(),
            &terms,
            max_local,
        );
        let (general_matches, general_coverage) = score_corpus(
            self.corpus.general_records(),
            self.corpus.general_index(),
            &terms,
            max_general,
        );

        tracing::debug!(
            terms = terms.len(),
            local_returned = local_coverage.returned,
            general_returned = general_coverage.returned,
            "Rule retrieval complete"
        );

        // Local corpus first regardless of score: source priority is a hard
        // business rule
        let mut matches = local_matches;
        matches.extend(general_matches);

        let coverage = RetrievalCoverage {
            local: local_coverage,
            general: general_coverage,
            search_terms: terms,
        };

        (matches, coverage)
    }

    /// Render retrieved rules into a prompt-ready text block, priority
    /// corpus section first
    pub fn format_rules_block(matches: &[RuleMatch]) -> String {
        let mut block = String::new();

        block.push_str("=== PRIORITY CORPUS: LOCAL STYLE GUIDE ===\n");
        let mut local_count = 0;
        for m in matches.iter().filter(|m| m.source == RuleSource::LocalStyle) {
            push_rule(&mut block, m);
            local_count += 1;
        }
        if local_count == 0 {
            block.push_str("(no local-style rules matched)\n");
        }

        block.push_str("\n=== SECONDARY CORPUS: GENERAL STYLE MANUAL ===\n");
        let mut general_count = 0;
        for m in matches.iter().filter(|m| m.source == RuleSource::GeneralStyle) {
            push_rule(&mut block, m);
            general_count += 1;
        }
        if general_count == 0 {
            block.push_str("(no general-style rules matched)\n");
        }

        block
    }
}

fn push_rule(block: &mut String, m: &RuleMatch) {
    block.push_str(&format!("\n[{}] {}\n{}\n", m.rule_id, m.title, m.text));
}

/// Score one corpus against the term set and apply its quota.
///
/// Scores accumulate in flattening order; the stable sort keeps that order
/// for equal scores.
fn score_corpus(
    records: &[RuleRecord],
    index: &KeywordIndex,
    terms: &[String],
    quota: usize,
) -> (Vec<RuleMatch>, CorpusCoverage) {
    let mut scores = vec![0.0f32; records.len()];

    for term in terms {
        if let Some(positions) = index.positions(term) {
            for &position in positions {
                scores[position] += 1.0;
            }
        }
    }

    let mut scored: Vec<(usize, f32)> = scores
        .iter()
        .enumerate()
        .filter(|(_, &score)| score > 0.0)
        .map(|(position, &score)| (position, score))
        .collect();

    let matched = scored.len();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(quota);

    let matches: Vec<RuleMatch> = scored
        .iter()
        .map(|&(position, score)| {
            let record = &records[position];
            RuleMatch {
                rule_id: record.rule_id.clone(),
                source: record.source,
                title: record.title.clone(),
                text: record.text.clone(),
                score,
                match_type: MatchType::Keyword,
            }
        })
        .collect();

    let coverage = CorpusCoverage {
        scanned: records.len(),
        matched,
        returned: matches.len(),
    };

    (matches, coverage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::RuleCorpus;

    fn corpus() -> Arc<RuleCorpus> {
        Arc::new(
            RuleCorpus::from_str(
                r#"{
                    "local_style": {
                        "rules": [
                            {"id": "case-names", "title": "Case Names", "text": "Case names use party abbreviations from the reporter tables."},
                            {"id": "parens", "title": "Parentheticals", "text": "Explanatory parenthetical text begins lowercase."}
                        ]
                    },
                    "general_style": {
                        "rules": [
                            {"id": "10", "title": "Cases", "text": "Case citations list reporter volume and page with the court parenthetical."},
                            {"id": "3", "title": "Pages", "text": "Pincite page references follow the word at."},
                            {"id": "16", "title": "Legislative Materials", "text": "Congressional reports cite the chamber and report number."}
                        ]
                    }
                }"#,
            )
            .unwrap(),
        )
    }

    fn retriever() -> RuleRetriever {
        RuleRetriever::new(corpus()).unwrap()
    }

    #[test]
    fn extracts_signal_words_and_cues() {
        let terms = retriever()
            .extract_terms("See Alice Corp. v. CLS Bank Int'l, 573 U.S. 208, at 216 (2014)");

        assert!(terms.contains(&"see".to_string()));
        assert!(terms.contains(&"case".to_string()));
        assert!(terms.contains(&"name".to_string()));
        assert!(terms.contains(&"reporter".to_string()));
        assert!(terms.contains(&"parenthetical".to_string()));
        assert!(terms.contains(&"pincite".to_string()));
        // raw tokens of length >= 3
        assert!(terms.contains(&"alice".to_string()));
        assert!(terms.contains(&"573".to_string()));
    }

    #[test]
    fn local_matches_listed_before_general_regardless_of_score() {
        let (matches, coverage) = retriever().retrieve(
            "Alice Corp. v. CLS Bank Int'l, 573 U.S. 208 (2014)",
            4,
            4,
        );

        assert!(coverage.local.matched >= 1);
        assert!(coverage.general.matched >= 1);

        let first_general = matches
            .iter()
            .position(|m| m.source == RuleSource::GeneralStyle)
            .unwrap();
        let last_local = matches
            .iter()
            .rposition(|m| m.source == RuleSource::LocalStyle)
            .unwrap();
        assert!(last_local < first_general);
    }

    #[test]
    fn quotas_bound_each_corpus_separately() {
        let (matches, coverage) = retriever().retrieve(
            "See case reporter page parenthetical report number at 5 (2020)",
            1,
            2,
        );

        let local = matches
            .iter()
            .filter(|m| m.source == RuleSource::LocalStyle)
            .count();
        let general = matches
            .iter()
            .filter(|m| m.source == RuleSource::GeneralStyle)
            .count();

        assert!(local <= 1);
        assert!(general <= 2);
        assert_eq!(coverage.local.returned, local);
        assert_eq!(coverage.general.returned, general);
        assert!(coverage.local.matched >= coverage.local.returned);
    }

    #[test]
    fn garbage_text_yields_empty_matches_and_zero_coverage() {
        let (matches, coverage) = retriever().retrieve("@@ ## !!", 5, 5);

        assert!(matches.is_empty());
        assert_eq!(coverage.local.matched, 0);
        assert_eq!(coverage.general.matched, 0);
        assert_eq!(coverage.local.returned, 0);
        assert_eq!(coverage.general.returned, 0);
        // scanned still reports corpus size
        assert_eq!(coverage.local.scanned, 2);
        assert_eq!(coverage.general.scanned, 3);
    }

    #[test]
    fn rankings_are_reproducible() {
        let r = retriever();
        let text = "See the case reporter parenthetical at 12";
        let (first, _) = r.retrieve(text, 5, 5);
        let (second, _) = r.retrieve(text, 5, 5);
        assert_eq!(first, second);
    }

    #[test]
    fn higher_overlap_ranks_first_within_a_corpus() {
        let (matches, _) = retriever().retrieve(
            "case reporter volume page court parenthetical",
            5,
            5,
        );

        let general: Vec<&RuleMatch> = matches
            .iter()
            .filter(|m| m.source == RuleSource::GeneralStyle)
            .collect();
        for window in general.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
    }

    #[test]
    fn formats_priority_corpus_section_first() {
        let (matches, _) = retriever().retrieve(
            "Alice Corp. v. CLS Bank Int'l, 573 U.S. 208 (2014)",
            4,
            4,
        );
        let block = RuleRetriever::format_rules_block(&matches);

        let priority_at = block.find("PRIORITY CORPUS: LOCAL STYLE GUIDE").unwrap();
        let secondary_at = block.find("SECONDARY CORPUS: GENERAL STYLE MANUAL").unwrap();
        assert!(priority_at < secondary_at);
        assert!(block.contains("[case-names] Case Names"));
    }

    #[test]
    fn empty_match_list_still_renders_both_sections() {
        let block = RuleRetriever::format_rules_block(&[]);
        assert!(block.contains("no local-style rules matched"));
        assert!(block.contains("no general-style rules matched"));
    }
}
