//! # Result Storage Module
//!
//! ## Purpose
//! Persists validation results so editors can audit past checks and route
//! flagged citations into the human-review queue.
//!
//! ## Input/Output Specification
//! - **Input**: `ValidationResult` records from the validation pipeline
//! - **Output**: Persistent storage, per-footnote retrieval, review-queue
//!   scans
//! - **Storage**: Sled embedded database, bincode-encoded records
//!
//! ## Key Features
//! - Footnote-ordered keys for ordered iteration
//! - Review queue: results that are incorrect, evidence-invalid, or
//!   deterministic-only are surfaced for a human reviewer
//! - Health check on open

use crate::config::StorageConfig;
use crate::errors::{CheckError, Result};
use crate::ValidationResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Persistent store of validation results
pub struct ResultStore {
    config: StorageConfig,
    db: Arc<sled::Db>,
    results_tree: Arc<sled::Tree>,
}

/// Storage statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_results: usize,
    pub needs_review: usize,
    pub database_size_bytes: u64,
}

impl ResultStore {
    /// Open (or create) the store at the configured path
    pub async fn new(config: StorageConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db = sled::open(&config.db_path).map_err(|e| CheckError::Storage {
            db_path: config.db_path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;

        let results_tree = db
            .open_tree("validation_results")
            .map_err(|e| CheckError::Storage {
                db_path: config.db_path.to_string_lossy().to_string(),
                reason: format!("Failed to open results tree: {}", e),
            })?;

        let store = Self {
            config,
            db: Arc::new(db),
            results_tree: Arc::new(results_tree),
        };

        store.health_check()?;
        tracing::info!(
            results = store.results_tree.len(),
            "Result store initialized"
        );

        Ok(store)
    }

    /// Footnote-ordered key so iteration follows document order
    fn key_for(result: &ValidationResult) -> String {
        format!(
            "{:08}:{:04}:{}",
            result.footnote_number, result.citation_ordinal, result.id
        )
    }

    /// Persist one validation result
    pub fn store_result(&self, result: &ValidationResult) -> Result<()> {
        let key = Self::key_for(result);
        let value = bincode::serialize(result)?;

        self.results_tree
            .insert(key.as_bytes(), value)
            .map_err(|e| self.storage_error(e))?;

        tracing::debug!(
            footnote = result.footnote_number,
            ordinal = result.citation_ordinal,
            "Stored validation result"
        );
        Ok(())
    }

    /// All stored results for one footnote, in ordinal order
    pub fn results_for_footnote(&self, footnote_number: u32) -> Result<Vec<ValidationResult>> {
        let prefix = format!("{:08}:", footnote_number);
        let mut results = Vec::new();

        for entry in self.results_tree.scan_prefix(prefix.as_bytes()) {
            let (_, value) = entry.map_err(|e| self.storage_error(e))?;
            results.push(bincode::deserialize(&value)?);
        }

        Ok(results)
    }

    /// Every stored result that needs a human reviewer: incorrect,
    /// evidence-invalid, or deterministic-only
    pub fn review_queue(&self) -> Result<Vec<ValidationResult>> {
        let mut queue = Vec::new();

        for entry in self.results_tree.iter() {
            let (_, value) = entry.map_err(|e| self.storage_error(e))?;
            let result: ValidationResult = bincode::deserialize(&value)?;
            if result.needs_review() {
                queue.push(result);
            }
        }

        Ok(queue)
    }

    /// Storage statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let needs_review = self.review_queue()?.len();
        Ok(StoreStats {
            total_results: self.results_tree.len(),
            needs_review,
            database_size_bytes: self.db.size_on_disk().map_err(|e| self.storage_error(e))?,
        })
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| self.storage_error(e))?;
        Ok(())
    }

    /// Verify basic database operations
    pub fn health_check(&self) -> Result<()> {
        let test_key = b"__health_check";

        self.results_tree
            .insert(test_key, b"ok".as_slice())
            .map_err(|e| self.storage_error(e))?;

        if self
            .results_tree
            .get(test_key)
            .map_err(|e| self.storage_error(e))?
            .is_none()
        {
            return Err(CheckError::Storage {
                db_path: self.config.db_path.to_string_lossy().to_string(),
                reason: "Health check value not found".to_string(),
            });
        }

        self.results_tree
            .remove(test_key)
            .map_err(|e| self.storage_error(e))?;

        Ok(())
    }

    fn storage_error(&self, err: sled::Error) -> CheckError {
        CheckError::Storage {
            db_path: self.config.db_path.to_string_lossy().to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CitationComponents, RetrievalCoverage, SourceType};
    use uuid::Uuid;

    fn store_config(dir: &tempfile::TempDir) -> StorageConfig {
        StorageConfig {
            enabled: true,
            db_path: dir.path().join("results.db"),
        }
    }

    fn sample_result(footnote: u32, ordinal: u32, is_correct: bool) -> ValidationResult {
        ValidationResult {
            id: Uuid::new_v4(),
            checked_at: chrono::Utc::now(),
            footnote_number: footnote,
            citation_ordinal: ordinal,
            citation_text: "35 U.S.C. § 101 (2018)".to_string(),
            source_type: SourceType::FederalStatute,
            components: CitationComponents::default(),
            is_correct,
            errors: Vec::new(),
            corrected_version: None,
            coverage: RetrievalCoverage::default(),
            evidence_validated: true,
            evidence_issues: Vec::new(),
            note: None,
        }
    }

    #[tokio::test]
    async fn stores_and_retrieves_by_footnote() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(store_config(&dir)).await.unwrap();

        store.store_result(&sample_result(12, 1, true)).unwrap();
        store.store_result(&sample_result(12, 2, false)).unwrap();
        store.store_result(&sample_result(13, 1, true)).unwrap();

        let results = store.results_for_footnote(12).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].citation_ordinal, 1);
        assert_eq!(results[1].citation_ordinal, 2);
    }

    #[tokio::test]
    async fn review_queue_surfaces_flagged_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(store_config(&dir)).await.unwrap();

        store.store_result(&sample_result(1, 1, true)).unwrap();
        store.store_result(&sample_result(2, 1, false)).unwrap();

        let mut evidence_failed = sample_result(3, 1, true);
        evidence_failed.evidence_validated = false;
        evidence_failed.evidence_issues = vec!["error 0: missing quote".to_string()];
        store.store_result(&evidence_failed).unwrap();

        let queue = store.review_queue().unwrap();
        assert_eq!(queue.len(), 2);
        assert!(queue.iter().all(|r| r.needs_review()));
    }

    #[tokio::test]
    async fn stats_count_results_and_review_items() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(store_config(&dir)).await.unwrap();

        store.store_result(&sample_result(1, 1, true)).unwrap();
        store.store_result(&sample_result(2, 1, false)).unwrap();
        store.flush().await.unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_results, 2);
        assert_eq!(stats.needs_review, 1);
    }

    #[tokio::test]
    async fn round_trips_full_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(store_config(&dir)).await.unwrap();

        let mut original = sample_result(7, 3, false);
        original.note = Some("LLM transport failure; deterministic checks only".to_string());
        store.store_result(&original).unwrap();

        let loaded = store.results_for_footnote(7).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, original.id);
        assert_eq!(loaded[0].note, original.note);
        assert_eq!(loaded[0].source_type, SourceType::FederalStatute);
    }
}
