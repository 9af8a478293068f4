//! # Citation Checking Engine
//!
//! ## Overview
//! This library implements the citation-resolution and rule-matching engine used
//! by a law review's editorial workflow: it classifies raw citation text into a
//! source type, retrieves the formatting rules relevant to that citation from a
//! two-corpus rule collection, and validates citation text against both
//! deterministic style checks and LLM-sourced findings whose rule quotes are
//! verified against the retrieved rules (evidence binding).
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `classifier`: Source type classification and component extraction
//! - `strategy`: Retrieval-strategy lookup per source type
//! - `corpus`: Rule corpus flattening and keyword index construction
//! - `retrieval`: Keyword-overlap rule retrieval with source priority
//! - `checks`: Deterministic regex style checks
//! - `evidence`: Verbatim-quote grounding of claimed rule violations
//! - `llm`: Completion client seam, boundary decoding, rate limiting
//! - `validator`: Orchestration of the full validation pipeline
//! - `storage`: Persistent result store and review-queue scan
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: Raw citation text plus footnote context, rule corpus JSON
//! - **Output**: `ValidationResult` with merged findings and retrieval coverage
//! - **Guarantee**: any LLM-claimed violation lacking a verbatim rule quote from
//!   the retrieved set marks the whole response evidence-invalid (fail-closed)
//!
//! ## Usage
//! ```rust,no_run
//! use std::sync::Arc;
//! use citecheck::{config::Config, validator::CitationValidator, CitationRequest};
//! use citecheck::llm::http::HttpCompletionClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::from_file("config.toml")?);
//!     let client = Arc::new(HttpCompletionClient::new(config.llm.clone())?);
//!     let validator = CitationValidator::new(config, client)?;
//!     let result = validator
//!         .validate(CitationRequest::new("Alice Corp. v. CLS Bank Int'l, 573 U.S. 208 (2014)"))
//!         .await?;
//!     println!("correct: {}", result.is_correct);
//!     Ok(())
//! }
//! ```

// Core modules
pub mod checks;
pub mod classifier;
pub mod config;
pub mod corpus;
pub mod errors;
pub mod evidence;
pub mod llm;
pub mod retrieval;
pub mod storage;
pub mod strategy;
pub mod validator;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use errors::{CheckError, Result};
pub use validator::CitationValidator;

// Core types used throughout the system
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Closed enumeration of citation source types.
///
/// Each variant maps to exactly one ordered retrieval-strategy list
/// (see [`strategy::RetrievalStrategyTable`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    SupremeCourt,
    FederalAppellate,
    FederalDistrict,
    FederalStatute,
    FederalRegulation,
    StateHighCourt,
    StateAppellate,
    LawReviewArticle,
    Book,
    CongressionalRecord,
    HouseReport,
    SenateReport,
    Unknown,
}

impl SourceType {
    /// Whether this type refers to a judicial decision
    pub fn is_case(&self) -> bool {
        matches!(
            self,
            SourceType::SupremeCourt
                | SourceType::FederalAppellate
                | SourceType::FederalDistrict
                | SourceType::StateHighCourt
                | SourceType::StateAppellate
        )
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceType::SupremeCourt => "SUPREME_COURT",
            SourceType::FederalAppellate => "FEDERAL_APPELLATE",
            SourceType::FederalDistrict => "FEDERAL_DISTRICT",
            SourceType::FederalStatute => "FEDERAL_STATUTE",
            SourceType::FederalRegulation => "FEDERAL_REGULATION",
            SourceType::StateHighCourt => "STATE_HIGH_COURT",
            SourceType::StateAppellate => "STATE_APPELLATE",
            SourceType::LawReviewArticle => "LAW_REVIEW_ARTICLE",
            SourceType::Book => "BOOK",
            SourceType::CongressionalRecord => "CONGRESSIONAL_RECORD",
            SourceType::HouseReport => "HOUSE_REPORT",
            SourceType::SenateReport => "SENATE_REPORT",
            SourceType::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// Structured fields extracted from raw citation text.
///
/// Created once per citation by the classifier and immutable thereafter.
/// Which fields are populated depends on the classified [`SourceType`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationComponents {
    /// First party in a case name
    pub party1: Option<String>,
    /// Second party in a case name
    pub party2: Option<String>,
    /// Reporter or journal volume
    pub volume: Option<String>,
    /// Reporter abbreviation
    pub reporter: Option<String>,
    /// First page of the cited source
    pub page: Option<String>,
    /// Year of decision or publication
    pub year: Option<String>,
    /// Deciding court, when stated in the parenthetical
    pub court: Option<String>,
    /// Title number (statutes and regulations)
    pub title_number: Option<String>,
    /// Section number (statutes and regulations)
    pub section: Option<String>,
    /// Author (articles and books)
    pub author: Option<String>,
    /// Work title (articles and books)
    pub title: Option<String>,
    /// Journal abbreviation (articles)
    pub journal: Option<String>,
}

impl CitationComponents {
    /// True when no field was extracted at all
    pub fn is_empty(&self) -> bool {
        self.party1.is_none()
            && self.party2.is_none()
            && self.volume.is_none()
            && self.reporter.is_none()
            && self.page.is_none()
            && self.year.is_none()
            && self.court.is_none()
            && self.title_number.is_none()
            && self.section.is_none()
            && self.author.is_none()
            && self.title.is_none()
            && self.journal.is_none()
    }

    /// Short human-readable label for filenames and report rows
    pub fn short_label(&self) -> String {
        if let (Some(p1), Some(p2)) = (&self.party1, &self.party2) {
            return format!("{} v. {}", p1, p2);
        }
        if let (Some(title), Some(section)) = (&self.title_number, &self.section) {
            return format!("{} sec. {}", title, section);
        }
        if let Some(title) = &self.title {
            return title.clone();
        }
        "unclassified citation".to_string()
    }
}

/// Which corpus a rule or finding is attributed to.
///
/// The local style corpus always takes retrieval precedence over the
/// general citation-style manual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    LocalStyle,
    GeneralStyle,
}

impl RuleSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSource::LocalStyle => "local_style",
            RuleSource::GeneralStyle => "general_style",
        }
    }
}

/// A single claimed rule violation, deterministic or LLM-sourced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFinding {
    /// Machine-readable error category, e.g. `curly_quotes_error`
    pub error_type: String,
    /// Human-readable description of the problem
    pub description: String,
    /// Cited local-style rule id, when applicable
    #[serde(default)]
    pub local_rule_id: Option<String>,
    /// Cited general-style rule id, when applicable
    #[serde(default)]
    pub general_rule_id: Option<String>,
    /// Corpus the cited rule belongs to
    #[serde(default)]
    pub rule_source: Option<RuleSource>,
    /// Confidence in the finding, 0.0 to 1.0
    #[serde(default)]
    pub confidence: f32,
    /// Offending substring of the citation text
    #[serde(default)]
    pub current: Option<String>,
    /// Suggested replacement text
    #[serde(default)]
    pub correct: Option<String>,
    /// Verbatim quote from the cited rule's text.
    /// Mandatory for LLM-sourced findings; checked by the evidence validator.
    #[serde(default)]
    pub rule_text_quote: Option<String>,
}

/// Per-corpus retrieval statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusCoverage {
    /// Total rule records scanned
    pub scanned: usize,
    /// Records with a nonzero keyword-overlap score
    pub matched: usize,
    /// Records returned after the quota cut
    pub returned: usize,
}

/// Audit trail for a retrieval call: why rules were or weren't surfaced.
///
/// Always present on a [`ValidationResult`], even when retrieval found
/// nothing (all counts zero).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCoverage {
    pub local: CorpusCoverage,
    pub general: CorpusCoverage,
    /// The deduplicated search-term set used for scoring
    pub search_terms: Vec<String>,
}

/// Aggregate outcome of validating one citation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Unique result identifier
    pub id: Uuid,
    /// When the validation ran
    pub checked_at: DateTime<Utc>,
    /// Footnote the citation appeared in
    pub footnote_number: u32,
    /// Ordinal of the citation within the footnote
    pub citation_ordinal: u32,
    /// The citation text that was checked
    pub citation_text: String,
    /// Classified source type
    pub source_type: SourceType,
    /// Extracted citation components
    pub components: CitationComponents,
    /// Whether the citation passed every check
    pub is_correct: bool,
    /// Merged findings, deterministic and LLM-sourced
    pub errors: Vec<ValidationFinding>,
    /// Fully corrected citation text, when the LLM supplied one
    pub corrected_version: Option<String>,
    /// Rule-retrieval audit statistics
    pub coverage: RetrievalCoverage,
    /// False when any LLM claim failed evidence validation
    pub evidence_validated: bool,
    /// Itemized evidence-validation issues, empty on success
    pub evidence_issues: Vec<String>,
    /// Explanatory note, set when the result is deterministic-only
    pub note: Option<String>,
}

impl ValidationResult {
    /// Whether a human reviewer should look at this result rather than
    /// auto-approving it
    pub fn needs_review(&self) -> bool {
        !self.is_correct || !self.evidence_validated || self.note.is_some()
    }
}

/// Input to a single citation validation call.
///
/// The context fields feed the prompt only; they never affect algorithmic
/// branching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationRequest {
    /// Raw citation text to validate
    pub citation_text: String,
    /// Footnote the citation appears in
    pub footnote_number: u32,
    /// Ordinal of the citation within the footnote (1-based)
    pub citation_ordinal: u32,
    /// Position within the footnote: "start", "middle", or "end"
    pub position: String,
}

impl CitationRequest {
    /// Build a request with default context (footnote 0, first citation)
    pub fn new(citation_text: impl Into<String>) -> Self {
        Self {
            citation_text: citation_text.into(),
            footnote_number: 0,
            citation_ordinal: 1,
            position: "start".to_string(),
        }
    }

    /// Attach footnote context
    pub fn with_context(mut self, footnote_number: u32, citation_ordinal: u32, position: &str) -> Self {
        self.footnote_number = footnote_number;
        self.citation_ordinal = citation_ordinal;
        self.position = position.to_string();
        self
    }
}

/// Application state shared across components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Config>,
    pub validator: Arc<validator::CitationValidator>,
    pub store: Option<Arc<storage::ResultStore>>,
}
