//! # Retrieval Strategy Module
//!
//! ## Purpose
//! Static lookup from a classified [`SourceType`] to the ordered list of
//! document sources the external retrieval subsystem should attempt.
//!
//! ## Input/Output Specification
//! - **Input**: A `SourceType`
//! - **Output**: Ordered slice of retrieval-source identifiers
//! - **Ordering**: Free/official sources first, general web search second,
//!   paid/proprietary databases last
//!
//! ## Key Features
//! - Built once at construction; O(1) lookup afterward
//! - Missing key falls back to the `Unknown` list rather than failing

use crate::SourceType;
use std::collections::HashMap;

/// Static mapping from source type to an ordered retrieval-source list
pub struct RetrievalStrategyTable {
    strategies: HashMap<SourceType, Vec<&'static str>>,
    fallback: Vec<&'static str>,
}

impl RetrievalStrategyTable {
    /// Build the table with the handbook's retrieval hierarchy
    pub fn new() -> Self {
        let mut strategies: HashMap<SourceType, Vec<&'static str>> = HashMap::new();

        strategies.insert(
            SourceType::SupremeCourt,
            vec![
                "supreme_court_website",
                "courtlistener",
                "google_scholar",
                "web_search",
                "westlaw",
                "lexis",
            ],
        );
        strategies.insert(
            SourceType::FederalAppellate,
            vec![
                "courtlistener",
                "court_website",
                "google_scholar",
                "web_search",
                "westlaw",
                "lexis",
            ],
        );
        strategies.insert(
            SourceType::FederalDistrict,
            vec![
                "courtlistener",
                "recap_archive",
                "google_scholar",
                "web_search",
                "westlaw",
                "lexis",
            ],
        );
        strategies.insert(
            SourceType::FederalStatute,
            vec!["govinfo", "uscode_house_gov", "web_search", "westlaw", "lexis"],
        );
        strategies.insert(
            SourceType::FederalRegulation,
            vec!["govinfo", "ecfr", "federal_register", "web_search", "westlaw"],
        );
        strategies.insert(
            SourceType::StateHighCourt,
            vec![
                "state_court_website",
                "courtlistener",
                "google_scholar",
                "web_search",
                "westlaw",
                "lexis",
            ],
        );
        strategies.insert(
            SourceType::StateAppellate,
            vec![
                "state_court_website",
                "courtlistener",
                "google_scholar",
                "web_search",
                "westlaw",
                "lexis",
            ],
        );
        strategies.insert(
            SourceType::LawReviewArticle,
            vec!["journal_website", "ssrn", "google_scholar", "web_search", "heinonline"],
        );
        strategies.insert(
            SourceType::Book,
            vec!["google_books", "worldcat", "web_search", "heinonline"],
        );
        strategies.insert(
            SourceType::CongressionalRecord,
            vec!["govinfo", "congress_gov", "web_search"],
        );
        strategies.insert(
            SourceType::HouseReport,
            vec!["govinfo", "congress_gov", "web_search", "proquest_congressional"],
        );
        strategies.insert(
            SourceType::SenateReport,
            vec!["govinfo", "congress_gov", "web_search", "proquest_congressional"],
        );

        Self {
            strategies,
            fallback: vec!["web_search", "google_scholar"],
        }
    }

    /// Ordered retrieval sources for a source type.
    ///
    /// `Unknown` and any unmapped type return the short generic fallback.
    pub fn strategies(&self, source_type: SourceType) -> &[&'static str] {
        self.strategies
            .get(&source_type)
            .map(|v| v.as_slice())
            .unwrap_or(&self.fallback)
    }
}

impl Default for RetrievalStrategyTable {
    fn default() -> Self {
        Self::new()
    }
}
