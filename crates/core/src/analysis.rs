//! Result types for forward-return analysis.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Distribution statistics for one horizon's forward returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonStats {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Fraction of non-null forward returns strictly above zero.
    pub win_rate: f64,
    /// Compound annual growth rate, present only for the 3Y/5Y/10Y horizons
    /// and null when the mean total return is at or below -100%.
    pub cagr: Option<f64>,
}

/// Per-horizon outcome inside an [`AnalysisResult`].
///
/// Unavailability is data, never an error: a horizon the history cannot
/// support reports `NoData`, and a label that cannot be interpreted reports
/// `InvalidPeriodFormat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "stats", rename_all = "snake_case")]
pub enum HorizonOutcome {
    Ok(HorizonStats),
    NoData,
    InvalidPeriodFormat,
}

impl HorizonOutcome {
    /// True when the horizon produced usable statistics.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// The statistics, when available.
    #[must_use]
    pub fn stats(&self) -> Option<&HorizonStats> {
        match self {
            Self::Ok(stats) => Some(stats),
            _ => None,
        }
    }
}

/// Forward-return statistics for a signal mask across a set of horizons.
///
/// `count` is the mask cardinality regardless of per-horizon nulls; a signal
/// can have a nonzero count while a far horizon still reports no data near
/// the end of history. An empty mask yields count 0 with no horizon entries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub count: usize,
    pub horizons: BTreeMap<String, HorizonOutcome>,
}

impl AnalysisResult {
    /// Labels of requested horizons that did not produce statistics.
    #[must_use]
    pub fn unavailable_horizons(&self) -> Vec<String> {
        self.horizons
            .iter()
            .filter(|(_, outcome)| !outcome.is_ok())
            .map(|(label, _)| label.clone())
            .collect()
    }
}

/// One masked trading day with its forward returns, for audit and plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRow {
    pub date: NaiveDate,
    pub close: Option<f64>,
    /// Forward return per requested horizon label; null where the history
    /// ends before the offset.
    pub forward: BTreeMap<String, Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_horizons_lists_non_ok_entries() {
        let mut result = AnalysisResult {
            count: 12,
            horizons: BTreeMap::new(),
        };
        result.horizons.insert(
            "1M".to_string(),
            HorizonOutcome::Ok(HorizonStats {
                mean: 0.01,
                median: 0.008,
                std: 0.02,
                min: -0.05,
                max: 0.07,
                win_rate: 0.6,
                cagr: None,
            }),
        );
        result
            .horizons
            .insert("3Y".to_string(), HorizonOutcome::NoData);
        result
            .horizons
            .insert("9Q".to_string(), HorizonOutcome::InvalidPeriodFormat);

        assert_eq!(result.unavailable_horizons(), vec!["3Y", "9Q"]);
    }

    #[test]
    fn horizon_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(HorizonOutcome::NoData).unwrap();
        assert_eq!(json["status"], "no_data");

        let json = serde_json::to_value(HorizonOutcome::Ok(HorizonStats {
            mean: 0.02,
            median: 0.02,
            std: 0.0,
            min: 0.02,
            max: 0.02,
            win_rate: 1.0,
            cagr: None,
        }))
        .unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["stats"]["cagr"].is_null());
    }
}
