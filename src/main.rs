//! # Citation Checker Main Driver
//!
//! ## Purpose
//! Command-line entry point for the citation checking engine: validates a
//! single citation or a batch file, optionally persisting results for the
//! review queue.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration file, rule corpus JSON, citation text or a
//!   batch file (one citation per line)
//! - **Output**: JSON validation results on stdout, persisted results when
//!   storage is enabled
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Load the rule corpus and build the validator
//! 4. Run the requested mode: single citation, batch, or health check
//! 5. Persist results and print a summary

use clap::{Arg, Command};
use futures::StreamExt;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{info, warn};

use citecheck::{
    config::Config,
    errors::{CheckError, Result},
    llm::http::HttpCompletionClient,
    storage::ResultStore,
    validator::CitationValidator,
    AppState, CitationRequest,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("citecheck")
        .version("0.1.0")
        .author("Law Review Tools Team")
        .about("Citation-resolution and evidence-validated rule-matching engine")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("corpus")
                .long("corpus")
                .value_name("FILE")
                .help("Rule corpus JSON path (overrides configuration)"),
        )
        .arg(
            Arg::new("citation")
                .long("citation")
                .value_name("TEXT")
                .help("Validate a single citation"),
        )
        .arg(
            Arg::new("batch")
                .long("batch")
                .value_name("FILE")
                .help("Validate every line of a batch file"),
        )
        .arg(
            Arg::new("footnote")
                .long("footnote")
                .value_name("N")
                .help("Footnote number for single-citation context")
                .value_parser(clap::value_parser!(u32))
                .default_value("0"),
        )
        .arg(
            Arg::new("deterministic-only")
                .long("deterministic-only")
                .help("Run only the deterministic checks, no LLM call")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check-health")
                .long("check-health")
                .help("Run health checks and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").unwrap();
    let mut config = Config::from_file(config_path)?;

    if let Some(corpus_path) = matches.get_one::<String>("corpus") {
        config.corpus.path = corpus_path.into();
    }

    let config = Arc::new(config);
    init_logging(&config)?;

    info!("Starting citecheck v0.1.0");
    info!("Configuration loaded from: {}", config_path);

    if matches.get_flag("check-health") {
        return run_health_checks(&config).await;
    }

    let app_state = initialize_components(config.clone()).await?;
    let deterministic_only = matches.get_flag("deterministic-only");

    if let Some(citation) = matches.get_one::<String>("citation") {
        let footnote = *matches.get_one::<u32>("footnote").unwrap();
        return validate_single(&app_state, citation, footnote, deterministic_only).await;
    }

    if let Some(batch_path) = matches.get_one::<String>("batch") {
        return validate_batch(&app_state, batch_path, deterministic_only).await;
    }

    Err(CheckError::Config {
        message: "Nothing to do: pass --citation, --batch, or --check-health".to_string(),
    })
}

/// Initialize logging and tracing
fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.level).map_err(|_| {
        CheckError::Config {
            message: format!("Invalid log level: {}", config.logging.level),
        }
    })?;

    if config.logging.json_format {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    Ok(())
}

/// Initialize all application components
async fn initialize_components(config: Arc<Config>) -> Result<AppState> {
    info!("Initializing components...");

    let client = Arc::new(HttpCompletionClient::new(config.llm.clone())?);
    let validator = Arc::new(CitationValidator::new(config.clone(), client)?);

    let store = if config.storage.enabled {
        info!("Opening result store at {:?}", config.storage.db_path);
        Some(Arc::new(ResultStore::new(config.storage.clone()).await?))
    } else {
        None
    };

    info!("All components initialized");
    Ok(AppState {
        config,
        validator,
        store,
    })
}

/// Run health checks: configuration, corpus, storage
async fn run_health_checks(config: &Arc<Config>) -> Result<()> {
    info!("Running health checks...");

    info!("✓ Configuration is valid");

    match citecheck::corpus::RuleCorpus::from_file(&config.corpus.path) {
        Ok(corpus) => info!(
            "✓ Rule corpus loaded: {} local rules, {} general rules",
            corpus.local_records().len(),
            corpus.general_records().len()
        ),
        Err(e) => warn!("✗ Rule corpus unavailable ({}); validation would run degraded", e),
    }

    if config.storage.enabled {
        let store = ResultStore::new(config.storage.clone()).await?;
        store.health_check()?;
        info!("✓ Result store is healthy");
    }

    info!("Health checks complete");
    Ok(())
}

/// Validate one citation and print the result as JSON
async fn validate_single(
    app_state: &AppState,
    citation: &str,
    footnote: u32,
    deterministic_only: bool,
) -> Result<()> {
    if deterministic_only {
        let findings = app_state.validator.deterministic_findings(citation);
        println!("{}", serde_json::to_string_pretty(&findings)?);
        return Ok(());
    }

    let request = CitationRequest::new(citation).with_context(footnote, 1, "start");
    let result = app_state.validator.validate(request).await?;

    let plan = app_state.validator.retrieval_plan(result.source_type);
    info!(
        "Classified {} as {}, retrieval plan: {}",
        result.components.short_label(),
        result.source_type,
        plan.join(" -> ")
    );

    if let Some(store) = &app_state.store {
        store.store_result(&result)?;
        store.flush().await?;
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Validate every line of a batch file
async fn validate_batch(
    app_state: &AppState,
    batch_path: &str,
    deterministic_only: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(batch_path).map_err(|e| CheckError::Config {
        message: format!("Failed to read batch file {}: {}", batch_path, e),
    })?;

    let citations: Vec<(u32, String)> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| (index as u32 + 1, line.trim().to_string()))
        .collect();

    info!("Validating {} citations from {}", citations.len(), batch_path);

    if deterministic_only {
        // CPU-bound regex work parallelizes across cores
        let flagged: usize = citations
            .par_iter()
            .map(|(line, citation)| {
                let findings = app_state.validator.deterministic_findings(citation);
                if !findings.is_empty() {
                    println!(
                        "line {}: {} finding(s) for {}",
                        line,
                        findings.len(),
                        citecheck::utils::TextUtils::truncate(citation, 60)
                    );
                    1
                } else {
                    0
                }
            })
            .sum();

        info!(
            "Deterministic batch complete: {}/{} citations flagged",
            flagged,
            citations.len()
        );
        return Ok(());
    }

    let concurrency = app_state.config.performance.max_concurrent_validations;
    let validator = app_state.validator.clone();

    let results: Vec<_> = futures::stream::iter(citations.into_iter().map(|(line, citation)| {
        let validator = validator.clone();
        async move {
            let request = CitationRequest::new(citation).with_context(line, 1, "start");
            (line, validator.validate(request).await)
        }
    }))
    .buffer_unordered(concurrency)
    .collect()
    .await;

    let mut correct = 0usize;
    let mut flagged = 0usize;
    let mut failed = 0usize;

    for (line, outcome) in results {
        match outcome {
            Ok(result) => {
                if result.is_correct {
                    correct += 1;
                } else {
                    flagged += 1;
                }
                if let Some(store) = &app_state.store {
                    store.store_result(&result)?;
                }
            }
            Err(e) => {
                failed += 1;
                warn!("line {}: validation failed: {}", line, e);
            }
        }
    }

    if let Some(store) = &app_state.store {
        store.flush().await?;
        let queue = store.review_queue()?;
        info!("{} result(s) in the human-review queue", queue.len());
    }

    info!(
        "Batch complete: {} correct, {} flagged, {} failed",
        correct, flagged, failed
    );
    Ok(())
}
