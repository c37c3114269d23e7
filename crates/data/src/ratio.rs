use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use edge_lab_core::{SeriesPoint, ValuationRatioProvider};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One row of the Shiller-style valuation file.
#[derive(Debug, Deserialize)]
struct RatioRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "PE10")]
    pe10: Option<f64>,
}

/// Loads the cyclically-adjusted P/E series from a JSON file of
/// `{"Date": "...", "PE10": ...}` rows. Rows without a ratio are dropped;
/// duplicate dates keep the first occurrence.
pub struct RatioFileProvider {
    path: PathBuf,
}

impl RatioFileProvider {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ValuationRatioProvider for RatioFileProvider {
    async fn fetch_ratio(&self) -> Result<Vec<SeriesPoint>> {
        load_ratio_file(&self.path)
    }
}

/// Parses and normalizes the ratio file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid JSON.
pub fn load_ratio_file(path: &Path) -> Result<Vec<SeriesPoint>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ratio file: {}", path.display()))?;
    let rows: Vec<RatioRow> = serde_json::from_str(&raw)
        .with_context(|| format!("Ratio file is not valid JSON: {}", path.display()))?;

    let mut points: Vec<SeriesPoint> = rows
        .into_iter()
        .filter_map(|row| {
            row.pe10.map(|value| SeriesPoint {
                date: row.date,
                value,
            })
        })
        .collect();
    points.sort_by_key(|p| p.date);
    points.dedup_by_key(|p| p.date);
    Ok(points)
}
