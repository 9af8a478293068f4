//! # Citation Validation Orchestrator
//!
//! ## Purpose
//! Wires the classifier, rule retriever, deterministic checks, LLM
//! completion capability, and evidence validator into the full per-citation
//! validation pipeline.
//!
//! ## Input/Output Specification
//! - **Input**: [`CitationRequest`] (citation text plus footnote context)
//! - **Output**: [`ValidationResult`], or an error only when the LLM path
//!   fails and no deterministic findings exist
//! - **Pipeline**: deterministic checks -> rule retrieval -> prompt assembly
//!   -> LLM call -> evidence validation -> merge
//!
//! ## Key Features
//! - Deterministic checks run unconditionally, with or without the LLM
//! - Corpus load failure degrades to deterministic-only validation for the
//!   process lifetime, logged once as a warning
//! - Evidence failures annotate the result rather than suppressing the
//!   LLM's claims: reviewers see both the claim and the grounding failure
//! - A merged non-empty findings list forces `is_correct = false`
//! - No shared mutable state between concurrent validations; the rule
//!   corpus and index are immutable after construction

use crate::checks::DeterministicCheckSet;
use crate::classifier::SourceClassifier;
use crate::config::Config;
use crate::corpus::RuleCorpus;
use crate::errors::{CheckError, Result};
use crate::evidence::EvidenceValidator;
use crate::llm::{
    CompletionClient, CompletionOutcome, CompletionRequest, RateLimiter, ResponseFormat,
};
use crate::retrieval::{RuleMatch, RuleRetriever};
use crate::utils::{TextUtils, Timer};
use crate::{
    CitationRequest, RetrievalCoverage, SourceType, ValidationFinding, ValidationResult,
};
use dashmap::DashMap;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

/// System prompt establishing the checker role and the evidence contract
const SYSTEM_PROMPT: &str = "You are a law review citation checker. You verify citation text \
against the formatting rules provided to you and respond only with JSON of the shape \
{\"is_correct\": bool, \"errors\": [...], \"corrected_version\": string|null}. Each entry of \
\"errors\" must contain: error_type, description, local_rule_id or general_rule_id, \
rule_source (\"local_style\" or \"general_style\"), confidence (0.0-1.0), current, correct, \
and rule_text_quote. rule_text_quote must be copied verbatim from the text of one of the \
rules provided below; never cite a rule you were not shown. Rules from the local style guide \
take precedence over the general style manual whenever both apply.";

/// Full citation validation pipeline
pub struct CitationValidator {
    config: Arc<Config>,
    classifier: SourceClassifier,
    strategy_table: crate::strategy::RetrievalStrategyTable,
    checks: DeterministicCheckSet,
    retriever: Option<RuleRetriever>,
    llm: Arc<dyn CompletionClient>,
    rate_limiter: Arc<RateLimiter>,
    result_cache: DashMap<String, ValidationResult>,
}

impl CitationValidator {
    /// Build the validator, loading the rule corpus from the configured
    /// path.
    ///
    /// A corpus that fails to load disables rule-based retrieval for the
    /// process lifetime; validation continues deterministic-only.
    pub fn new(config: Arc<Config>, llm: Arc<dyn CompletionClient>) -> Result<Self> {
        let corpus = match RuleCorpus::from_file(&config.corpus.path) {
            Ok(corpus) => Some(Arc::new(corpus)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Rule corpus unavailable; running in degraded deterministic-only retrieval mode"
                );
                None
            }
        };

        Self::with_corpus(config, corpus, llm)
    }

    /// Build the validator over an already-loaded corpus (or none)
    pub fn with_corpus(
        config: Arc<Config>,
        corpus: Option<Arc<RuleCorpus>>,
        llm: Arc<dyn CompletionClient>,
    ) -> Result<Self> {
        let retriever = match corpus {
            Some(corpus) => Some(RuleRetriever::new(corpus)?),
            None => None,
        };

        let rate_limiter = Arc::new(RateLimiter::new(config.llm.rate_limit.clone()));

        Ok(Self {
            classifier: SourceClassifier::new()?,
            strategy_table: crate::strategy::RetrievalStrategyTable::new(),
            checks: DeterministicCheckSet::new()?,
            retriever,
            llm,
            rate_limiter,
            result_cache: DashMap::new(),
            config,
        })
    }

    /// Share a rate limiter with other validators in the process
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Ordered retrieval sources for a classified source type, for the
    /// external document-retrieval subsystem
    pub fn retrieval_plan(&self, source_type: SourceType) -> &[&'static str] {
        self.strategy_table.strategies(source_type)
    }

    /// Deterministic findings only, without touching the LLM.
    /// Used by the batch dry-run path.
    pub fn deterministic_findings(&self, citation_text: &str) -> Vec<ValidationFinding> {
        let text: String = citation_text.nfc().collect();
        self.checks.run(&text)
    }

    /// Validate one citation through the full pipeline.
    ///
    /// Returns `Err` only when the LLM path fails and deterministic checks
    /// found nothing to report.
    pub async fn validate(&self, request: CitationRequest) -> Result<ValidationResult> {
        let timer = Timer::new("validate_citation");
        let text: String = request.citation_text.nfc().collect();

        let cache_key = format!(
            "{}:{}:{}",
            request.footnote_number,
            request.citation_ordinal,
            TextUtils::text_hash(&text)
        );
        if let Some(cached) = self.result_cache.get(&cache_key) {
            tracing::debug!(footnote = request.footnote_number, "Validation cache hit");
            return Ok(cached.clone());
        }

        let (source_type, components) = self.classifier.classify(&text);

        let deterministic = self.checks.run(&text);
        tracing::debug!(
            stage = "deterministic_checked",
            findings = deterministic.len(),
            footnote = request.footnote_number,
            "Deterministic checks complete"
        );

        let (retrieved, coverage) = self.retrieve_rules(&text);
        tracing::debug!(
            stage = "rules_retrieved",
            local = coverage.local.returned,
            general = coverage.general.returned,
            "Rule retrieval complete"
        );

        let completion_request = CompletionRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: build_user_prompt(&request, &text, &retrieved),
            response_format: ResponseFormat::Json,
        };

        self.rate_limiter.acquire().await;
        let outcome = self.llm.complete(&completion_request).await;
        tracing::debug!(stage = "llm_called", client = self.llm.name(), "LLM call complete");

        let result = match outcome {
            CompletionOutcome::Success(assessment) => {
                let report = EvidenceValidator::require_evidence(&assessment.errors, &retrieved);
                tracing::debug!(
                    stage = "evidence_checked",
                    passed = report.passed,
                    "Evidence validation complete"
                );

                // LLM findings first, deterministic appended: merging never
                // removes an LLM-reported error
                let mut errors = assessment.errors;
                errors.extend(deterministic);

                let is_correct = if errors.is_empty() {
                    assessment.is_correct
                } else {
                    false
                };

                ValidationResult {
                    id: Uuid::new_v4(),
                    checked_at: chrono::Utc::now(),
                    footnote_number: request.footnote_number,
                    citation_ordinal: request.citation_ordinal,
                    citation_text: text,
                    source_type,
                    components,
                    is_correct,
                    errors,
                    corrected_version: assessment.corrected_version,
                    coverage,
                    evidence_validated: report.passed,
                    evidence_issues: report.issues,
                    note: None,
                }
            }
            CompletionOutcome::TransportFailure { reason } => {
                self.deterministic_fallback(
                    &request,
                    text,
                    source_type,
                    components,
                    deterministic,
                    coverage,
                    format!("LLM transport failure: {}", reason),
                )?
            }
            CompletionOutcome::ParseFailure { raw, reason } => {
                tracing::warn!(
                    raw_preview = %TextUtils::truncate(&raw, 120),
                    "LLM output did not decode"
                );
                self.deterministic_fallback(
                    &request,
                    text,
                    source_type,
                    components,
                    deterministic,
                    coverage,
                    format!("LLM response unparseable: {}", reason),
                )?
            }
        };

        if self.result_cache.len() < self.config.performance.result_cache_size {
            self.result_cache.insert(cache_key, result.clone());
        }

        tracing::debug!(
            stage = "merged",
            is_correct = result.is_correct,
            errors = result.errors.len(),
            elapsed_ms = timer.elapsed_ms(),
            "Validation complete"
        );

        Ok(result)
    }

    /// Rule retrieval with the configured quotas; empty set in degraded mode
    fn retrieve_rules(&self, text: &str) -> (Vec<RuleMatch>, RetrievalCoverage) {
        match &self.retriever {
            Some(retriever) => retriever.retrieve(
                text,
                self.config.corpus.max_local_rules,
                self.config.corpus.max_general_rules,
            ),
            None => (Vec::new(), RetrievalCoverage::default()),
        }
    }

    /// Deterministic-only result when the LLM path failed.
    ///
    /// With no deterministic findings either, the whole call fails: this is
    /// the only case where the public contract reports outright failure.
    #[allow(clippy::too_many_arguments)]
    fn deterministic_fallback(
        &self,
        request: &CitationRequest,
        text: String,
        source_type: SourceType,
        components: crate::CitationComponents,
        deterministic: Vec<ValidationFinding>,
        coverage: RetrievalCoverage,
        reason: String,
    ) -> Result<ValidationResult> {
        if deterministic.is_empty() {
            return Err(CheckError::CheckFailed {
                footnote: request.footnote_number,
                details: reason,
            });
        }

        tracing::warn!(
            footnote = request.footnote_number,
            %reason,
            "Returning deterministic-only validation result"
        );

        Ok(ValidationResult {
            id: Uuid::new_v4(),
            checked_at: chrono::Utc::now(),
            footnote_number: request.footnote_number,
            citation_ordinal: request.citation_ordinal,
            citation_text: text,
            source_type,
            components,
            is_correct: false,
            errors: deterministic,
            corrected_version: None,
            coverage,
            evidence_validated: true,
            evidence_issues: Vec::new(),
            note: Some(format!("{}; deterministic checks only", reason)),
        })
    }
}

/// Assemble the user prompt: retrieved rules (priority corpus first), the
/// citation text, and its footnote context
fn build_user_prompt(
    request: &CitationRequest,
    text: &str,
    retrieved: &[RuleMatch],
) -> String {
    format!(
        "Relevant formatting rules:\n{}\n\nCitation to check:\n{}\n\nContext: footnote {}, \
         citation {} of the footnote, position: {}.",
        RuleRetriever::format_rules_block(retrieved),
        text,
        request.footnote_number,
        request.citation_ordinal,
        request.position,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmAssessment;
    use crate::RuleSource;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    const CORPUS: &str = r#"{
        "local_style": {
            "rules": [
                {"id": "quotes", "title": "Quotation Marks", "text": "Citations must use curly quotation marks throughout."},
                {"id": "case-names", "title": "Case Names", "text": "Case names abbreviate parties per the reporter tables."}
            ]
        },
        "general_style": {
            "rules": [
                {"id": "10", "title": "Cases", "text": "Case citations list reporter volume and page with the court parenthetical."}
            ]
        }
    }"#;

    /// Scripted completion client: returns the queued outcome once, then
    /// transport failures
    struct ScriptedClient {
        outcomes: Mutex<Vec<CompletionOutcome>>,
    }

    impl ScriptedClient {
        fn with(outcome: CompletionOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(vec![outcome]),
            })
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: &CompletionRequest) -> CompletionOutcome {
            self.outcomes
                .lock()
                .pop()
                .unwrap_or(CompletionOutcome::TransportFailure {
                    reason: "script exhausted".to_string(),
                })
        }
    }

    fn validator(outcome: CompletionOutcome) -> CitationValidator {
        let config = Arc::new(Config::default());
        let corpus = Arc::new(RuleCorpus::from_str(CORPUS).unwrap());
        CitationValidator::with_corpus(config, Some(corpus), ScriptedClient::with(outcome))
            .unwrap()
    }

    fn llm_finding(quote: &str) -> ValidationFinding {
        ValidationFinding {
            error_type: "quotation_mark_error".to_string(),
            description: "straight quotes in citation".to_string(),
            local_rule_id: Some("quotes".to_string()),
            general_rule_id: None,
            rule_source: Some(RuleSource::LocalStyle),
            confidence: 0.9,
            current: Some("\"".to_string()),
            correct: Some("\u{201C}".to_string()),
            rule_text_quote: Some(quote.to_string()),
        }
    }

    // Uses a non-breaking space before "v." so deterministic checks pass
    const CLEAN_CITATION: &str = "Bilski\u{00A0}v. Kappos, 561 U.S. 593 (2010)";

    #[tokio::test]
    async fn clean_citation_with_clean_assessment_is_correct() {
        let v = validator(CompletionOutcome::Success(LlmAssessment {
            is_correct: true,
            errors: vec![],
            corrected_version: None,
        }));

        let result = v.validate(CitationRequest::new(CLEAN_CITATION)).await.unwrap();

        assert!(result.is_correct);
        assert!(result.errors.is_empty());
        assert!(result.evidence_validated);
        assert_eq!(result.source_type, SourceType::SupremeCourt);
        assert!(result.coverage.local.scanned > 0);
    }

    #[tokio::test]
    async fn grounded_llm_finding_passes_evidence_validation() {
        let v = validator(CompletionOutcome::Success(LlmAssessment {
            is_correct: false,
            errors: vec![llm_finding("must use curly quotation marks")],
            corrected_version: Some(CLEAN_CITATION.to_string()),
        }));

        let result = v.validate(CitationRequest::new(CLEAN_CITATION)).await.unwrap();

        assert!(!result.is_correct);
        assert!(result.evidence_validated);
        assert!(result.evidence_issues.is_empty());
        assert_eq!(result.corrected_version.as_deref(), Some(CLEAN_CITATION));
    }

    #[tokio::test]
    async fn ungrounded_claim_is_annotated_but_not_suppressed() {
        let v = validator(CompletionOutcome::Success(LlmAssessment {
            is_correct: false,
            errors: vec![llm_finding("a rule text that was never retrieved")],
            corrected_version: None,
        }));

        let result = v.validate(CitationRequest::new(CLEAN_CITATION)).await.unwrap();

        assert!(!result.evidence_validated);
        assert_eq!(result.evidence_issues.len(), 1);
        // The claim itself is still surfaced for the reviewer
        assert!(result
            .errors
            .iter()
            .any(|e| e.error_type == "quotation_mark_error"));
        assert!(result.needs_review());
    }

    #[tokio::test]
    async fn merge_is_additive_and_forces_incorrect() {
        // Citation with a straight double quote triggers deterministic
        // findings alongside the LLM's
        let dirty = "\"Bilski\" v. Kappos, 561 U.S. 593 (2010)";
        let v = validator(CompletionOutcome::Success(LlmAssessment {
            is_correct: true,
            errors: vec![llm_finding("must use curly quotation marks")],
            corrected_version: None,
        }));

        let result = v.validate(CitationRequest::new(dirty)).await.unwrap();

        let llm_count = 1;
        let deterministic_count = v.deterministic_findings(dirty).len();
        assert!(result.errors.len() >= llm_count);
        assert!(result.errors.len() >= deterministic_count);
        assert_eq!(result.errors.len(), llm_count + deterministic_count);
        // Non-empty merged list forces incorrect despite the LLM's claim
        assert!(!result.is_correct);
    }

    #[tokio::test]
    async fn llm_failure_with_deterministic_findings_returns_partial_result() {
        let dirty = "\"Bilski\" v. Kappos, 561 U.S. 593 (2010)";
        let v = validator(CompletionOutcome::TransportFailure {
            reason: "connection refused".to_string(),
        });

        let result = v.validate(CitationRequest::new(dirty)).await.unwrap();

        assert!(!result.is_correct);
        assert!(!result.errors.is_empty());
        assert!(result.note.as_deref().unwrap().contains("transport failure"));
        assert!(result.needs_review());
    }

    #[tokio::test]
    async fn llm_failure_without_findings_is_an_error() {
        let v = validator(CompletionOutcome::TransportFailure {
            reason: "connection refused".to_string(),
        });

        let err = v
            .validate(CitationRequest::new(CLEAN_CITATION))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[tokio::test]
    async fn parse_failure_behaves_like_transport_failure() {
        let dirty = "\"Bilski\" v. Kappos, 561 U.S. 593 (2010)";
        let v = validator(CompletionOutcome::ParseFailure {
            raw: "not json".to_string(),
            reason: "expected value".to_string(),
        });

        let result = v.validate(CitationRequest::new(dirty)).await.unwrap();
        assert!(result.note.as_deref().unwrap().contains("unparseable"));
    }

    #[tokio::test]
    async fn degraded_mode_validates_with_empty_coverage() {
        let config = Arc::new(Config::default());
        let v = CitationValidator::with_corpus(
            config,
            None,
            ScriptedClient::with(CompletionOutcome::Success(LlmAssessment {
                is_correct: true,
                errors: vec![],
                corrected_version: None,
            })),
        )
        .unwrap();

        let result = v.validate(CitationRequest::new(CLEAN_CITATION)).await.unwrap();

        assert!(result.is_correct);
        assert_eq!(result.coverage.local.scanned, 0);
        assert_eq!(result.coverage.general.scanned, 0);
    }

    #[tokio::test]
    async fn repeated_validation_hits_the_cache() {
        let v = validator(CompletionOutcome::Success(LlmAssessment {
            is_correct: true,
            errors: vec![],
            corrected_version: None,
        }));

        let request = CitationRequest::new(CLEAN_CITATION).with_context(12, 1, "start");
        let first = v.validate(request.clone()).await.unwrap();
        // The scripted client is exhausted; only the cache can answer now
        let second = v.validate(request).await.unwrap();

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn retrieval_plan_follows_source_type() {
        let v = validator(CompletionOutcome::TransportFailure {
            reason: "unused".to_string(),
        });
        let plan = v.retrieval_plan(SourceType::SupremeCourt);
        assert_eq!(plan[0], "supreme_court_website");
    }
}
