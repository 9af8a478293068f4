//! # Evidence Validation Module
//!
//! ## Purpose
//! Enforces the evidence-binding contract: every LLM-claimed rule violation
//! must carry a verbatim quote traceable to a rule that was actually
//! retrieved and shown to the model.
//!
//! ## Input/Output Specification
//! - **Input**: Claimed findings and the retrieved rule set they cite
//! - **Output**: [`EvidenceReport`] with pass/fail status and itemized issues
//! - **Policy**: Fail-closed. A single ungrounded claim invalidates the
//!   entire response; there is no partial acceptance
//!
//! ## Key Features
//! - Exact case-sensitive substring matching against retrieved rule text
//! - Itemized issues naming the offending finding index
//! - Empty findings lists pass trivially

use crate::retrieval::RuleMatch;
use crate::ValidationFinding;
use serde::{Deserialize, Serialize};

/// The result of grounding every claimed finding against retrieved rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceReport {
    /// True only if every finding is grounded
    pub passed: bool,
    /// All grounding failures collected during this run; empty on pass
    pub issues: Vec<String>,
}

/// Verbatim-quote grounding validator
pub struct EvidenceValidator;

impl EvidenceValidator {
    /// Check that every finding's `rule_text_quote` appears verbatim in at
    /// least one retrieved rule's text.
    ///
    /// An LLM is never trusted to cite a rule it was not actually shown:
    /// any fabricated quote is detected here and fails the whole response.
    pub fn require_evidence(
        findings: &[ValidationFinding],
        retrieved: &[RuleMatch],
    ) -> EvidenceReport {
        if findings.is_empty() {
            return EvidenceReport {
                passed: true,
                issues: Vec::new(),
            };
        }

        let mut issues = Vec::new();

        for (index, finding) in findings.iter().enumerate() {
            let quote = match finding.rule_text_quote.as_deref() {
                Some(q) if !q.trim().is_empty() => q,
                _ => {
                    issues.push(format!(
                        "error {}: missing rule_text_quote for claimed violation '{}'",
                        index, finding.error_type
                    ));
                    continue;
                }
            };

            let grounded = retrieved.iter().any(|rule| rule.text.contains(quote));
            if !grounded {
                issues.push(format!(
                    "error {}: rule_text_quote not found verbatim in any retrieved rule: \"{}\"",
                    index,
                    crate::utils::TextUtils::truncate(quote, 80)
                ));
            }
        }

        if !issues.is_empty() {
            tracing::warn!(
                issue_count = issues.len(),
                "Evidence validation failed: response contains ungrounded claims"
            );
        }

        EvidenceReport {
            passed: issues.is_empty(),
            issues,
        }
    }
}
