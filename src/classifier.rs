//! # Source Classification Module
//!
//! ## Purpose
//! Classifies raw citation text into a [`SourceType`] and extracts structured
//! [`CitationComponents`] using an ordered list of signature tests.
//!
//! ## Input/Output Specification
//! - **Input**: Raw citation text (one citation)
//! - **Output**: `(SourceType, CitationComponents)` tuple, never an error
//! - **Determinism**: Pure function of its input; identical input yields
//!   identical output
//!
//! ## Key Features
//! - Fixed-priority signature list: specific patterns (Supreme Court
//!   reporters, U.S.C., C.F.R.) are tested before generic ones
//! - First match wins; unmatched text degrades to `Unknown` with best-effort
//!   partial extraction rather than failing
//! - Field extraction retries alternate patterns in sequence until one
//!   succeeds or all are exhausted

use crate::errors::{CheckError, Result};
use crate::{CitationComponents, SourceType};
use regex::Regex;

/// Ordered-signature citation classifier
pub struct SourceClassifier {
    signatures: Vec<Signature>,
    fallback_year: Regex,
    fallback_parties: Regex,
}

/// One classification signature: a trigger test plus an extraction recipe
struct Signature {
    source_type: SourceType,
    trigger: Regex,
    extractor: Extractor,
}

/// How capture groups map onto citation components for a signature family
enum Extractor {
    /// Case citations: parties, volume, reporter, page, court, year.
    /// Patterns are tried in sequence; the first that matches wins.
    Case { patterns: Vec<Regex> },
    /// Statutes and regulations: title number, section, year
    TitleSection { pattern: Regex },
    /// House/Senate reports: report number, pincite, year
    Report { pattern: Regex },
    /// Congressional Record: volume, page, year
    Record { pattern: Regex },
    /// Law review articles: author, title, volume, journal, page, year
    Article { pattern: Regex },
    /// Books: author, title, year
    Book { pattern: Regex },
}

impl SourceClassifier {
    /// Build the classifier, compiling every signature pattern
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| -> Result<Regex> {
            Regex::new(pattern).map_err(|e| CheckError::Internal {
                message: format!("Invalid classifier regex: {}", e),
            })
        };

        // Case-name extraction, most common punctuation first. The second
        // pattern retries without the comma before the volume.
        let case_patterns = vec![
            compile(
                r"(?P<p1>[^,;]+?)\s+v\.\s+(?P<p2>[^,]+?),\s+(?P<vol>\d+)\s+(?P<rep>[A-Z][A-Za-z0-9.'\s]*?)\s+(?P<page>\d+)\b(?:,\s+\d+(?:[-–]\d+)?)?(?:\s+\((?P<court>[^)]*?)\s*(?P<year>\d{4})\))?",
            )?,
            compile(
                r"(?P<p1>.+?)\s+v\.\s+(?P<p2>.+?)\s+(?P<vol>\d+)\s+(?P<rep>[A-Z][A-Za-z0-9.'\s]*?)\s+(?P<page>\d+)\b(?:\s+\((?P<court>[^)]*?)\s*(?P<year>\d{4})\))?",
            )?,
        ];

        let signatures = vec![
            // Federal regulation before statute: "C.F.R." is unambiguous
            Signature {
                source_type: SourceType::FederalRegulation,
                trigger: compile(r"C\.F\.R\.")?,
                extractor: Extractor::TitleSection {
                    pattern: compile(
                        r"(?P<title>\d+)\s+C\.F\.R\.\s+§{1,2}\s*(?P<sec>[0-9][0-9a-zA-Z.\-]*(?:\([0-9a-zA-Z]+\))*)(?:\s+\((?:[^)]*?)?(?P<year>\d{4})\))?",
                    )?,
                },
            },
            Signature {
                source_type: SourceType::FederalStatute,
                trigger: compile(r"U\.S\.C\.")?,
                extractor: Extractor::TitleSection {
                    pattern: compile(
                        r"(?P<title>\d+)\s+U\.S\.C\.(?:A\.|S\.)?\s+§{1,2}\s*(?P<sec>[0-9][0-9a-zA-Z.\-]*(?:\([0-9a-zA-Z]+\))*)(?:\s+\((?:[^)]*?)?(?P<year>\d{4})\))?",
                    )?,
                },
            },
            Signature {
                source_type: SourceType::HouseReport,
                trigger: compile(r"H\.R\.\s?Rep\.\s?No\.")?,
                extractor: Extractor::Report {
                    pattern: compile(
                        r"H\.R\.\s?Rep\.\s?No\.\s+(?P<num>[\d–-]+)(?:,?\s+at\s+(?P<page>\d+))?(?:\s+\((?P<year>\d{4})\))?",
                    )?,
                },
            },
            Signature {
                source_type: SourceType::SenateReport,
                trigger: compile(r"S\.\s?Rep\.\s?No\.")?,
                extractor: Extractor::Report {
                    pattern: compile(
                        r"S\.\s?Rep\.\s?No\.\s+(?P<num>[\d–-]+)(?:,?\s+at\s+(?P<page>\d+))?(?:\s+\((?P<year>\d{4})\))?",
                    )?,
                },
            },
            Signature {
                source_type: SourceType::CongressionalRecord,
                trigger: compile(r"Cong\.\s?Rec\.")?,
                extractor: Extractor::Record {
                    pattern: compile(
                        r"(?P<vol>\d+)\s+Cong\.\s?Rec\.\s+(?P<page>[HSE]?\d+(?:[–-]\d+)?)(?:\s+\((?:[^)]*?)(?P<year>\d{4})\))?",
                    )?,
                },
            },
            // Supreme Court reporters are checked before generic case patterns
            Signature {
                source_type: SourceType::SupremeCourt,
                trigger: compile(r"\sv\.\s.*\d+\s+(?:U\.S\.|S\.\s?Ct\.)\s+\d+")?,
                extractor: Extractor::Case {
                    patterns: case_patterns.clone(),
                },
            },
            Signature {
                source_type: SourceType::FederalAppellate,
                trigger: compile(r"\sv\.\s.*\d+\s+(?:F\.(?:2d|3d|4th)|F\.\s?App'x)\s+\d+")?,
                extractor: Extractor::Case {
                    patterns: case_patterns.clone(),
                },
            },
            Signature {
                source_type: SourceType::FederalDistrict,
                trigger: compile(r"\sv\.\s.*\d+\s+F\.\s?Supp\.(?:\s?[23]d)?\s+\d+")?,
                extractor: Extractor::Case {
                    patterns: case_patterns.clone(),
                },
            },
            // State appellate before state high court: the intermediate-court
            // parenthetical is the more specific signal
            Signature {
                source_type: SourceType::StateAppellate,
                trigger: compile(
                    r"\sv\.\s.*\d+\s+(?:P\.|N\.E\.|N\.W\.|S\.E\.|S\.W\.|A\.|So\.)[A-Za-z0-9.\s]*\d+.*\([^)]*(?:Ct\.\s?App\.|App\.)[^)]*\d{4}\)",
                )?,
                extractor: Extractor::Case {
                    patterns: case_patterns.clone(),
                },
            },
            Signature {
                source_type: SourceType::StateHighCourt,
                trigger: compile(
                    r"\sv\.\s.*\d+\s+(?:P\.|N\.E\.|N\.W\.|S\.E\.|S\.W\.|A\.|So\.)[A-Za-z0-9.\s]*\d+",
                )?,
                extractor: Extractor::Case {
                    patterns: case_patterns.clone(),
                },
            },
            Signature {
                source_type: SourceType::LawReviewArticle,
                trigger: compile(r"\d+\s+[A-Z][A-Za-z.&'\s]*?(?:L\.\s?Rev\.|L\.\s?J\.|J\.)\s+[A-Za-z0-9]")?,
                extractor: Extractor::Article {
                    pattern: compile(
                        r"(?P<author>[^,]+?),\s+(?P<title>.+?),\s+(?P<vol>\d+)\s+(?P<journal>[A-Z][A-Za-z.&'\s]+?)\s+(?P<page>\d+)(?:,\s+\d+(?:[-–]\d+)?)?\s+\((?P<year>\d{4})\)",
                    )?,
                },
            },
            Signature {
                source_type: SourceType::Book,
                trigger: compile(r"\([^)]*\bed\.[^)]*\d{4}\)")?,
                extractor: Extractor::Book {
                    pattern: compile(
                        r"(?P<author>[^,]+?),\s+(?P<title>.+?)\s+\((?:[^)]*?)?(?P<year>\d{4})\)",
                    )?,
                },
            },
        ];

        Ok(Self {
            signatures,
            fallback_year: compile(r"\b(1[6-9]\d{2}|20\d{2})\b")?,
            fallback_parties: compile(r"(?P<p1>[^,;]+?)\s+v\.\s+(?P<p2>[^,(]+)")?,
        })
    }

    /// Classify citation text and extract structured components.
    ///
    /// Signatures run in fixed priority order; the first whose trigger
    /// matches determines the type. Unmatched input returns
    /// `SourceType::Unknown` with whatever partial fields could be salvaged.
    pub fn classify(&self, citation_text: &str) -> (SourceType, CitationComponents) {
        let text = citation_text.trim();
        if text.is_empty() {
            return (SourceType::Unknown, CitationComponents::default());
        }

        for signature in &self.signatures {
            if signature.trigger.is_match(text) {
                let mut components = signature.extractor.extract(text);
                if components.year.is_none() {
                    components.year = self.extract_year(text);
                }
                tracing::debug!(
                    source_type = %signature.source_type,
                    "Classified citation: {}",
                    crate::utils::TextUtils::truncate(text, 60)
                );
                return (signature.source_type, components);
            }
        }

        // No signature matched: degrade to Unknown with best-effort fields
        let mut components = CitationComponents::default();
        components.year = self.extract_year(text);
        if let Some(caps) = self.fallback_parties.captures(text) {
            components.party1 = capture_trimmed(&caps, "p1");
            components.party2 = capture_trimmed(&caps, "p2");
        }

        (SourceType::Unknown, components)
    }

    /// First plausible 4-digit year anywhere in the text
    fn extract_year(&self, text: &str) -> Option<String> {
        self.fallback_year
            .find(text)
            .map(|m| m.as_str().to_string())
    }
}

impl Extractor {
    fn extract(&self, text: &str) -> CitationComponents {
        let mut components = CitationComponents::default();

        match self {
            Extractor::Case { patterns } => {
                for pattern in patterns {
                    if let Some(caps) = pattern.captures(text) {
                        components.party1 = capture_trimmed(&caps, "p1");
                        components.party2 = capture_trimmed(&caps, "p2");
                        components.volume = capture_trimmed(&caps, "vol");
                        components.reporter = capture_trimmed(&caps, "rep");
                        components.page = capture_trimmed(&caps, "page");
                        components.court = capture_trimmed(&caps, "court");
                        components.year = capture_trimmed(&caps, "year");
                        break;
                    }
                }
            }
            Extractor::TitleSection { pattern } => {
                if let Some(caps) = pattern.captures(text) {
                    components.title_number = capture_trimmed(&caps, "title");
                    components.section = capture_trimmed(&caps, "sec");
                    components.year = capture_trimmed(&caps, "year");
                }
            }
            Extractor::Report { pattern } => {
                if let Some(caps) = pattern.captures(text) {
                    components.title_number = capture_trimmed(&caps, "num");
                    components.page = capture_trimmed(&caps, "page");
                    components.year = capture_trimmed(&caps, "year");
                }
            }
            Extractor::Record { pattern } => {
                if let Some(caps) = pattern.captures(text) {
                    components.volume = capture_trimmed(&caps, "vol");
                    components.page = capture_trimmed(&caps, "page");
                    components.year = capture_trimmed(&caps, "year");
                }
            }
            Extractor::Article { pattern } => {
                if let Some(caps) = pattern.captures(text) {
                    components.author = capture_trimmed(&caps, "author");
                    components.title = capture_trimmed(&caps, "title");
                    components.volume = capture_trimmed(&caps, "vol");
                    components.journal = capture_trimmed(&caps, "journal");
                    components.page = capture_trimmed(&caps, "page");
                    components.year = capture_trimmed(&caps, "year");
                }
            }
            Extractor::Book { pattern } => {
                if let Some(caps) = pattern.captures(text) {
                    components.author = capture_trimmed(&caps, "author");
                    components.title = capture_trimmed(&caps, "title");
                    components.year = capture_trimmed(&caps, "year");
                }
            }
        }

        components
    }
}

/// Trimmed named capture, `None` when absent or empty
fn capture_trimmed(caps: &regex::Captures<'_>, name: &str) -> Option<String> {
    caps.name(name).and_then(|m| {
        let trimmed = m.as_str().trim().trim_end_matches(',');
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
