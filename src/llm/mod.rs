//! # LLM Interface Module
//!
//! ## Purpose
//! Defines the seam between the validation pipeline and the external LLM
//! completion capability: the [`CompletionClient`] trait, the tagged
//! [`CompletionOutcome`] result type, boundary JSON decoding, and an explicit
//! rate limiter shared across validations.
//!
//! ## Input/Output Specification
//! - **Input**: System and user prompts, JSON response format
//! - **Output**: `CompletionOutcome`: success with a decoded assessment, or
//!   a tagged transport/parse failure
//! - **Boundary**: Untyped model output is decoded into [`LlmAssessment`]
//!   immediately at this layer; no untyped values flow into the pipeline
//!
//! ## Key Features
//! - Trait-based client seam so transports are swappable and testable
//! - Rate limiting as an explicit object passed by reference, with its
//!   counters behind a mutex
//! - Markdown code-fence stripping before JSON decoding

pub mod http;

use crate::config::RateLimitConfig;
use crate::ValidationFinding;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A completion request: prompts plus the required response format
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub response_format: ResponseFormat,
}

/// Response formats the capability can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Json,
}

/// The structured assessment the LLM is asked to produce.
///
/// `is_correct` and `errors` are required; everything else is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmAssessment {
    pub is_correct: bool,
    pub errors: Vec<ValidationFinding>,
    #[serde(default)]
    pub corrected_version: Option<String>,
}

/// Tagged result of a completion call, decoded at the boundary
#[derive(Debug)]
pub enum CompletionOutcome {
    /// Transport succeeded and the output decoded cleanly
    Success(LlmAssessment),
    /// The request never produced usable output (network, HTTP status,
    /// exhausted retries)
    TransportFailure { reason: String },
    /// The model answered but its output did not decode
    ParseFailure { raw: String, reason: String },
}

/// External completion capability consumed by the orchestrator
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Short identifier for logging
    fn name(&self) -> &str;

    /// Issue one completion request
    async fn complete(&self, request: &CompletionRequest) -> CompletionOutcome;
}

/// Decode raw model output into an assessment.
///
/// Models often wrap JSON in markdown fences; those are stripped first.
pub fn decode_assessment(raw: &str) -> CompletionOutcome {
    let stripped = strip_code_fences(raw);

    match serde_json::from_str::<LlmAssessment>(stripped) {
        Ok(assessment) => CompletionOutcome::Success(assessment),
        Err(e) => CompletionOutcome::ParseFailure {
            raw: raw.to_string(),
            reason: e.to_string(),
        },
    }
}

/// Strip a leading/trailing markdown code fence, if present
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Explicit request rate limiter shared across concurrent validations.
///
/// Counters live behind a mutex; the lock is never held across an await.
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<RateLimiterState>,
}

struct RateLimiterState {
    window_start: Instant,
    requests_in_window: u32,
    next_allowed: Instant,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            state: Mutex::new(RateLimiterState {
                window_start: now,
                requests_in_window: 0,
                next_allowed: now,
            }),
        }
    }

    /// Wait until the next request is allowed, then record it.
    pub async fn acquire(&self) {
        let wait = {
            let mut state = self.state.lock();
            let now = Instant::now();

            if now.duration_since(state.window_start) >= Duration::from_secs(60) {
                state.window_start = now;
                state.requests_in_window = 0;
            }

            let mut earliest = state.next_allowed.max(now);
            if state.requests_in_window >= self.config.requests_per_minute {
                let window_end = state.window_start + Duration::from_secs(60);
                earliest = earliest.max(window_end);
                state.window_start = window_end;
                state.requests_in_window = 0;
            }

            state.requests_in_window += 1;
            state.next_allowed = earliest + Duration::from_millis(self.config.min_delay_ms);

            earliest.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limiter pausing");
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_json_assessment() {
        let raw = r#"{"is_correct": true, "errors": []}"#;
        match decode_assessment(raw) {
            CompletionOutcome::Success(assessment) => {
                assert!(assessment.is_correct);
                assert!(assessment.errors.is_empty());
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn decodes_fenced_json_assessment() {
        let raw = "```json\n{\"is_correct\": false, \"errors\": []}\n```";
        match decode_assessment(raw) {
            CompletionOutcome::Success(assessment) => assert!(!assessment.is_correct),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn non_json_output_is_a_parse_failure_with_raw_text() {
        let raw = "The citation looks fine to me.";
        match decode_assessment(raw) {
            CompletionOutcome::ParseFailure { raw: kept, .. } => {
                assert_eq!(kept, raw);
            }
            other => panic!("expected parse failure, got {:?}", other),
        }
    }

    #[test]
    fn missing_required_field_is_a_parse_failure() {
        let raw = r#"{"errors": []}"#;
        assert!(matches!(
            decode_assessment(raw),
            CompletionOutcome::ParseFailure { .. }
        ));
    }

    #[test]
    fn assessment_errors_deserialize_findings() {
        let raw = r#"{
            "is_correct": false,
            "errors": [{
                "error_type": "reporter_abbreviation_error",
                "description": "wrong reporter form",
                "local_rule_id": null,
                "general_rule_id": "10.2",
                "rule_source": "general_style",
                "confidence": 0.85,
                "current": "U. S.",
                "correct": "U.S.",
                "rule_text_quote": "Abbreviate United States Reports as U.S."
            }],
            "corrected_version": "Alice Corp. v. CLS Bank Int'l, 573 U.S. 208 (2014)"
        }"#;

        match decode_assessment(raw) {
            CompletionOutcome::Success(assessment) => {
                assert_eq!(assessment.errors.len(), 1);
                assert_eq!(
                    assessment.errors[0].general_rule_id.as_deref(),
                    Some("10.2")
                );
                assert!(assessment.corrected_version.is_some());
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn rate_limiter_allows_immediate_first_request() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_minute: 60,
            min_delay_ms: 0,
        });
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn rate_limiter_spaces_requests_by_min_delay() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_minute: 600,
            min_delay_ms: 30,
        });
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        // Two min-delay gaps after the first request
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
