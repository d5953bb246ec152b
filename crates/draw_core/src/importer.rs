//! Candidate importers. Only the shape of the data matters to the core: a list
//! of raw values, one per coupon.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

#[async_trait]
pub trait CandidateImporter: Send + Sync {
    async fn import_candidates(&self) -> Result<Vec<String>>;
}

/// Reads the first column of a sheet exported as CSV. The first row is a header.
#[derive(Debug, Clone)]
pub struct CsvImporter {
    path: PathBuf,
}

impl CsvImporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CandidateImporter for CsvImporter {
    async fn import_candidates(&self) -> Result<Vec<String>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_first_column(&path))
            .await
            .context("csv import task failed")?
    }
}

fn read_first_column(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open coupon sheet '{}'", path.display()))?;

    let mut values = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.with_context(|| {
            format!("failed to read row {} of '{}'", index + 2, path.display())
        })?;
        if let Some(cell) = row.get(0).filter(|cell| !cell.is_empty()) {
            values.push(cell.to_string());
        }
    }
    Ok(values)
}

/// Fixed candidate list.
#[derive(Debug, Clone, Default)]
pub struct StaticImporter(pub Vec<String>);

#[async_trait]
impl CandidateImporter for StaticImporter {
    async fn import_candidates(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
#[path = "tests/importer_tests.rs"]
mod tests;
