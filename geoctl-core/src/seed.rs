//! Seeding loader
//!
//! Reads `<dir>/<stem>.json` for each stem in parent-first order and feeds
//! every document through the repository `create` path, so seeded data gets
//! the same validation as API writes. A file holds either a JSON array of
//! documents or a single object.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::GeoError;
use crate::layer::DataLayer;
use crate::models::Payload;

/// Seed stems, parents first
pub const STEMS: &[&str] = &["countries", "states", "cities"];

pub const DEFAULT_SEED_DIR: &str = "data/bkup";

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("unknown seed stem '{0}' (expected one of: countries, states, cities)")]
    UnknownStem(String),

    #[error("seed file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{}: entry {index} is not a JSON object", path.display())]
    NotAnObject { path: PathBuf, index: usize },

    #[error("{stem}: entry {index} rejected: {source}")]
    Rejected {
        stem: &'static str,
        index: usize,
        source: GeoError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SeedOptions {
    pub dir: PathBuf,
    /// Restrict to a single stem; its file must then exist
    pub only: Option<String>,
    /// Count documents without touching the database
    pub dry_run: bool,
}

/// Outcome for one stem
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StemReport {
    pub stem: &'static str,
    /// Documents inserted (or, in a dry run, found)
    pub inserted: usize,
    /// Documents whose key already existed
    pub skipped: usize,
    /// File absent and ignored
    pub missing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub dry_run: bool,
    pub stems: Vec<StemReport>,
}

impl SeedReport {
    pub fn inserted(&self) -> usize {
        self.stems.iter().map(|s| s.inserted).sum()
    }

    pub fn skipped(&self) -> usize {
        self.stems.iter().map(|s| s.skipped).sum()
    }
}

/// Stems to process with their file paths.
fn plan(options: &SeedOptions) -> Result<Vec<(&'static str, PathBuf)>, SeedError> {
    let stems: Vec<&'static str> = match &options.only {
        Some(only) => {
            let stem = STEMS
                .iter()
                .copied()
                .find(|s| *s == only.trim())
                .ok_or_else(|| SeedError::UnknownStem(only.clone()))?;
            vec![stem]
        }
        None => STEMS.to_vec(),
    };
    Ok(stems
        .into_iter()
        .map(|stem| (stem, options.dir.join(format!("{stem}.json"))))
        .collect())
}

/// Load the documents held by one seed file.
pub async fn load_documents(path: &Path) -> Result<Vec<Payload>, SeedError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let value: Value = serde_json::from_str(&raw).map_err(|source| SeedError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let entries = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Object(map) => Ok(map),
            _ => Err(SeedError::NotAnObject {
                path: path.to_path_buf(),
                index,
            }),
        })
        .collect()
}

/// Load the stem's file, or `None` if it is absent and may be skipped.
async fn load_stem(
    options: &SeedOptions,
    stem: &'static str,
    path: &Path,
) -> Result<Option<Vec<Payload>>, SeedError> {
    let exists = tokio::fs::try_exists(path)
        .await
        .map_err(|source| SeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if exists {
        return load_documents(path).await.map(Some);
    }
    if options.only.is_some() {
        return Err(SeedError::MissingFile(path.to_path_buf()));
    }
    debug!(stem, path = %path.display(), "seed file absent, skipping");
    Ok(None)
}

/// Count what a seed run would insert, without a database.
pub async fn count_documents(options: &SeedOptions) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport {
        dry_run: true,
        stems: Vec::new(),
    };
    for (stem, path) in plan(options)? {
        let docs = load_stem(options, stem, &path).await?;
        report.stems.push(StemReport {
            stem,
            inserted: docs.as_ref().map_or(0, Vec::len),
            skipped: 0,
            missing: docs.is_none(),
        });
    }
    Ok(report)
}

/// Insert every seed document through the repositories.
///
/// Existing keys are counted as skipped; any other error aborts the run.
pub async fn seed(layer: &DataLayer, options: &SeedOptions) -> Result<SeedReport, SeedError> {
    if options.dry_run {
        return count_documents(options).await;
    }

    let mut report = SeedReport::default();
    for (stem, path) in plan(options)? {
        let mut stem_report = StemReport {
            stem,
            ..Default::default()
        };
        let Some(docs) = load_stem(options, stem, &path).await? else {
            stem_report.missing = true;
            report.stems.push(stem_report);
            continue;
        };

        for (index, doc) in docs.iter().enumerate() {
            let created = match stem {
                "countries" => layer.countries().create(doc).await.map(|_| ()),
                "states" => layer.states().create(doc).await.map(|_| ()),
                _ => layer.cities().create(doc).await.map(|_| ()),
            };
            match created {
                Ok(()) => stem_report.inserted += 1,
                Err(GeoError::DuplicateKey { .. }) => stem_report.skipped += 1,
                Err(source) => {
                    return Err(SeedError::Rejected {
                        stem,
                        index,
                        source,
                    })
                }
            }
        }
        info!(
            stem,
            inserted = stem_report.inserted,
            skipped = stem_report.skipped,
            "seeded"
        );
        report.stems.push(stem_report);
    }
    Ok(report)
}
