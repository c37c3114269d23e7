//! Market data shapes shared across crates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day of primary history as delivered by a data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: f64,
}

/// A dated observation of an auxiliary or valuation series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Technical snapshot of the most recent trading day, fed to the hypothesis
/// generator as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub date: NaiveDate,
    pub close: f64,
    /// Daily return in percent.
    pub return_pct: f64,
    /// Volume relative to the trailing 30-day mean.
    pub volume_rel: f64,
    /// Daily return as a z-score against the trailing 30-day return spread.
    pub volatility_rank: f64,
    /// Optional headlines supplied by an upstream news collaborator.
    #[serde(default)]
    pub headlines: Vec<String>,
}
