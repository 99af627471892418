//! Command implementations. Each returns the JSON document printed on stdout.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use serde_json::{json, Value};

use carmatch::{
    CatalogSource, EngineConfig, FsImageSource, JsonCatalog, MatchingEngine, ReferenceEntry,
    Strategy,
};

/// Message printed when no catalog entry qualifies.
pub const NOT_FOUND_MESSAGE: &str = "No matching car found";

/// Exit status for a query that matched nothing.
pub const EXIT_NOT_FOUND: i32 = 2;

/// A rendered command result and the process exit status it implies.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub body: Value,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn ok(body: Value) -> Self {
        Self { body, exit_code: 0 }
    }

    pub fn not_found() -> Self {
        Self {
            body: json!({ "error": NOT_FOUND_MESSAGE }),
            exit_code: EXIT_NOT_FOUND,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Options for the `match` command.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub strategy: Strategy,
    /// Also list this many ranked candidates.
    pub top: usize,
    /// Found results scoring below this are reported as not found.
    pub min_score: Option<f32>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            top: 0,
            min_score: None,
        }
    }
}

/// Load the catalog and build an engine that reads images next to it.
pub fn open_catalog(
    catalog_path: &str,
    config: EngineConfig,
) -> anyhow::Result<(MatchingEngine, Vec<ReferenceEntry>)> {
    let catalog = JsonCatalog::new(catalog_path);
    let entries = catalog
        .entries()
        .with_context(|| format!("Failed to load catalog {catalog_path}"))?;
    let images = Arc::new(FsImageSource::new(catalog.base_dir()));
    let engine = MatchingEngine::new(config, images)?;
    Ok((engine, entries))
}

fn read_image(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))
}

/// Identify the query image against the catalog.
pub fn run_match(
    query: &Path,
    catalog_path: &str,
    config: EngineConfig,
    options: &MatchOptions,
) -> anyhow::Result<CommandOutput> {
    let query_bytes = read_image(query)?;
    let (engine, entries) = open_catalog(catalog_path, config)?;

    let report = engine
        .scan(&query_bytes, &entries, options.strategy)
        .with_context(|| format!("Failed to match {}", query.display()))?;
    let result = report.best_match();

    if !result.found {
        tracing::info!("No usable entry among {} scanned", result.scanned);
        return Ok(CommandOutput::not_found());
    }
    if let Some(min) = options.min_score {
        if result.similarity_score < min {
            tracing::info!(
                "Best score {:.4} is below the threshold {min:.4}",
                result.similarity_score
            );
            return Ok(CommandOutput::not_found());
        }
    }

    let mut body = serde_json::to_value(&result)?;
    body["strategy"] = json!(options.strategy);
    if options.top > 0 {
        body["candidates"] = serde_json::to_value(report.top(options.top))?;
    }
    Ok(CommandOutput::ok(body))
}

/// Similarity between two image files.
pub fn run_compare(
    a: &Path,
    b: &Path,
    config: EngineConfig,
    strategy: Strategy,
) -> anyhow::Result<CommandOutput> {
    let engine = MatchingEngine::new(config, Arc::new(FsImageSource::new(".")))?;
    let score = engine.compare(&read_image(a)?, &read_image(b)?, strategy)?;
    Ok(CommandOutput::ok(json!({
        "a": a.display().to_string(),
        "b": b.display().to_string(),
        "strategy": strategy,
        "similarity_score": score,
    })))
}

#[derive(Debug, Serialize)]
struct EntryFailure {
    index: usize,
    brand: String,
    #[serde(rename = "type")]
    kind: String,
    image: String,
    error: String,
}

/// Check that every catalog entry can be fetched, decoded and described.
///
/// Unusable entries do not fail the command; they are listed in the report
/// and the exit status is nonzero only when no entry is usable.
pub fn run_validate(
    catalog_path: &str,
    config: EngineConfig,
    strategy: Strategy,
) -> anyhow::Result<CommandOutput> {
    let (engine, entries) = open_catalog(catalog_path, config)?;

    let failures: Vec<EntryFailure> = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            engine
                .extract_entry(entry, strategy)
                .err()
                .map(|e| EntryFailure {
                    index,
                    brand: entry.label.brand.clone(),
                    kind: entry.label.kind.clone(),
                    image: entry.image_source.clone(),
                    error: e.to_string(),
                })
        })
        .collect();

    let usable = entries.len() - failures.len();
    tracing::info!("{usable} of {} catalog entries usable", entries.len());

    let body = json!({
        "catalog": catalog_path,
        "strategy": strategy,
        "entries": entries.len(),
        "usable": usable,
        "failures": failures,
    });
    Ok(CommandOutput {
        body,
        exit_code: if usable == 0 { 1 } else { 0 },
    })
}

/// Build and configuration summary.
pub fn info(catalog_path: &str, config_path: Option<&str>, config: &EngineConfig) -> Value {
    json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "strategies": Strategy::ALL,
        "default_strategy": Strategy::default(),
        "catalog": catalog_path,
        "config_file": config_path,
        "config": config,
        "max_decode_dimension": carmatch::MAX_DECODE_DIMENSION,
    })
}
