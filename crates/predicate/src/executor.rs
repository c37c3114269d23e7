//! Contained execution of predicate source against the analysis engine.

use crate::error::PredicateError;
use crate::eval::evaluate_mask;
use edge_lab_backtest::ForwardReturnEngine;
use edge_lab_core::{AnalysisResult, SignalRow};
use std::sync::Arc;

/// Default cap on raw signal rows packaged with a report.
pub const DEFAULT_SIGNAL_ROW_CAP: usize = 25;

/// Everything produced by one successful predicate execution, packaged with
/// the source for audit and replay.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalReport {
    pub source: String,
    pub mask: Vec<bool>,
    pub occurrences: usize,
    pub analysis: AnalysisResult,
    pub baseline: AnalysisResult,
    /// First rows of the masked subset, capped.
    pub rows: Vec<SignalRow>,
}

/// Evaluates predicate source inside the restricted language and, on
/// success, runs signal/baseline/raw-row analysis for the requested
/// horizons. Every fault is a typed [`PredicateError`]; nothing propagates
/// unguarded.
pub struct SignalExecutor {
    engine: Arc<ForwardReturnEngine>,
    signal_row_cap: usize,
}

impl SignalExecutor {
    #[must_use]
    pub fn new(engine: Arc<ForwardReturnEngine>) -> Self {
        Self {
            engine,
            signal_row_cap: DEFAULT_SIGNAL_ROW_CAP,
        }
    }

    #[must_use]
    pub fn with_signal_row_cap(mut self, cap: usize) -> Self {
        self.signal_row_cap = cap;
        self
    }

    /// Runs one predicate.
    ///
    /// # Errors
    ///
    /// Returns the classified [`PredicateError`] for any compilation or
    /// evaluation fault, including a result of the wrong shape.
    pub fn execute(
        &self,
        source: &str,
        horizons: &[String],
    ) -> Result<SignalReport, PredicateError> {
        let mask = evaluate_mask(self.engine.store(), source)?;

        let analysis = self
            .engine
            .analyze(&mask, horizons)
            .map_err(|e| PredicateError::Analysis(e.to_string()))?;
        let baseline = self
            .engine
            .get_baseline_stats(horizons)
            .map_err(|e| PredicateError::Analysis(e.to_string()))?;
        let mut rows = self
            .engine
            .get_signals(&mask, horizons)
            .map_err(|e| PredicateError::Analysis(e.to_string()))?;
        rows.truncate(self.signal_row_cap);

        let occurrences = analysis.count;
        tracing::debug!(occurrences, "Predicate executed");

        Ok(SignalReport {
            source: source.to_string(),
            mask,
            occurrences,
            analysis,
            baseline,
            rows,
        })
    }
}
