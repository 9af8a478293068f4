//! # Rule Corpus Module
//!
//! ## Purpose
//! Loads the two-corpus citation rule collection (locally-authored style
//! guide and the general citation-style manual) from its nested JSON form,
//! flattens each rule tree into addressable records, and builds an inverted
//! keyword index per corpus.
//!
//! ## Input/Output Specification
//! - **Input**: Rule corpus JSON: two top-level keys, each a `rules` tree of
//!   `{id, title, text, children}` nodes; the general corpus additionally
//!   carries a `tables` key
//! - **Output**: Flat `RuleRecord` lists and per-corpus `KeywordIndex`es
//! - **Rebuild**: Full rebuild only; the structures are read-only afterward
//!
//! ## Key Features
//! - Dotted hierarchical rule ids built during the recursive walk
//! - Container nodes (no title, no text) contribute nothing but their
//!   children are still visited
//! - Two indexes built completely independently, no cross-corpus token
//!   sharing, so retrieval can quota each corpus separately

use crate::errors::{CheckError, Result};
use crate::RuleSource;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One node of a flattened rule corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Dotted hierarchical path, unique within its corpus
    pub rule_id: String,
    /// Corpus this record belongs to
    pub source: RuleSource,
    /// Rule heading
    pub title: String,
    /// Full rule prose; the only field ever quoted as evidence
    pub text: String,
}

/// Inverted index: lowercase token (length >= 2) -> record positions
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    postings: HashMap<String, Vec<usize>>,
}

impl KeywordIndex {
    /// Build the index over `title + " " + text` of every record
    fn build(records: &[RuleRecord], word_regex: &Regex) -> Self {
        let mut postings: HashMap<String, Vec<usize>> = HashMap::new();

        for (position, record) in records.iter().enumerate() {
            let haystack = format!("{} {}", record.title, record.text);
            let mut seen: HashSet<String> = HashSet::new();
            for token_match in word_regex.find_iter(&haystack) {
                let token = token_match.as_str().to_lowercase();
                if token.len() < 2 {
                    continue;
                }
                if seen.insert(token.clone()) {
                    postings.entry(token).or_default().push(position);
                }
            }
        }

        Self { postings }
    }

    /// Record positions indexed under a token
    pub fn positions(&self, token: &str) -> Option<&[usize]> {
        self.postings.get(token).map(|v| v.as_slice())
    }

    /// Number of distinct tokens in the index
    pub fn token_count(&self) -> usize {
        self.postings.len()
    }
}

/// The loaded two-corpus rule collection with its keyword indexes
#[derive(Debug)]
pub struct RuleCorpus {
    local: Vec<RuleRecord>,
    general: Vec<RuleRecord>,
    local_index: KeywordIndex,
    general_index: KeywordIndex,
    /// General-corpus reference tables, held for rule-processing utilities
    /// outside the retrieval engine
    tables: HashMap<String, serde_json::Value>,
}

// Raw JSON shapes, private to loading

#[derive(Debug, Deserialize)]
struct RawCorpus {
    local_style: RawTree,
    general_style: RawTree,
}

#[derive(Debug, Deserialize)]
struct RawTree {
    rules: Vec<RawNode>,
    #[serde(default)]
    tables: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    children: Vec<RawNode>,
}

impl RuleCorpus {
    /// Load and index the corpus from a JSON file.
    ///
    /// A missing or malformed file is a fatal configuration error; the
    /// orchestrator catches it and runs deterministic-only for the process
    /// lifetime.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CheckError::CorpusLoad {
            path: path.to_string_lossy().to_string(),
            details: e.to_string(),
        })?;
        Self::from_str(&content)
    }

    /// Load and index the corpus from a JSON string
    pub fn from_str(content: &str) -> Result<Self> {
        let raw: RawCorpus =
            serde_json::from_str(content).map_err(|e| CheckError::CorpusFormat {
                details: e.to_string(),
            })?;

        let word_regex = Regex::new(r"\b\w+\b").map_err(|e| CheckError::Internal {
            message: format!("Invalid tokenizer regex: {}", e),
        })?;

        let mut local = Vec::new();
        flatten(&raw.local_style.rules, "", RuleSource::LocalStyle, &mut local);

        let mut general = Vec::new();
        flatten(
            &raw.general_style.rules,
            "",
            RuleSource::GeneralStyle,
            &mut general,
        );

        warn_on_duplicate_ids(&local, RuleSource::LocalStyle);
        warn_on_duplicate_ids(&general, RuleSource::GeneralStyle);

        let local_index = KeywordIndex::build(&local, &word_regex);
        let general_index = KeywordIndex::build(&general, &word_regex);

        tracing::info!(
            local_rules = local.len(),
            general_rules = general.len(),
            local_tokens = local_index.token_count(),
            general_tokens = general_index.token_count(),
            "Rule corpus loaded and indexed"
        );

        Ok(Self {
            local,
            general,
            local_index,
            general_index,
            tables: raw.general_style.tables,
        })
    }

    /// Flat local-style records in flattening order
    pub fn local_records(&self) -> &[RuleRecord] {
        &self.local
    }

    /// Flat general-style records in flattening order
    pub fn general_records(&self) -> &[RuleRecord] {
        &self.general
    }

    /// Keyword index over the local-style corpus
    pub fn local_index(&self) -> &KeywordIndex {
        &self.local_index
    }

    /// Keyword index over the general-style corpus
    pub fn general_index(&self) -> &KeywordIndex {
        &self.general_index
    }

    /// General-corpus reference tables (unused by retrieval)
    pub fn tables(&self) -> &HashMap<String, serde_json::Value> {
        &self.tables
    }

    /// Look up one record by corpus and rule id
    pub fn find(&self, source: RuleSource, rule_id: &str) -> Option<&RuleRecord> {
        let records = match source {
            RuleSource::LocalStyle => &self.local,
            RuleSource::GeneralStyle => &self.general,
        };
        records.iter().find(|r| r.rule_id == rule_id)
    }
}

/// Recursive rule-tree walk.
///
/// A node contributes a record iff it has a non-empty title or text; the
/// walk always continues into children, so pure container nodes still
/// surface their descendants.
fn flatten(nodes: &[RawNode], parent_id: &str, source: RuleSource, out: &mut Vec<RuleRecord>) {
    for node in nodes {
        let rule_id = if parent_id.is_empty() {
            node.id.clone()
        } else {
            format!("{}.{}", parent_id, node.id)
        };

        if !node.title.trim().is_empty() || !node.text.trim().is_empty() {
            out.push(RuleRecord {
                rule_id: rule_id.clone(),
                source,
                title: node.title.clone(),
                text: node.text.clone(),
            });
        }

        flatten(&node.children, &rule_id, source, out);
    }
}

fn warn_on_duplicate_ids(records: &[RuleRecord], source: RuleSource) {
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.rule_id.as_str()) {
            tracing::warn!(
                corpus = source.as_str(),
                rule_id = %record.rule_id,
                "Duplicate rule id in corpus"
            );
        }
    }
}
