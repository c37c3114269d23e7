//! Forward-return analysis over the daily series store.
//!
//! The engine precomputes forward-return columns for the canonical horizons
//! at construction and memoizes any other parseable horizon on first use.
//! All statistics run on the calling thread over plain vectors.

use anyhow::{ensure, Result};
use edge_lab_core::{
    AnalysisResult, Horizon, HorizonOutcome, HorizonStats, SignalRow, CANONICAL_HORIZONS,
};
use edge_lab_data::{Column, SeriesStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

pub struct ForwardReturnEngine {
    store: Arc<SeriesStore>,
    /// Memoized forward-return columns keyed by trading-day offset. The
    /// canonical set is inserted eagerly; on-demand offsets are computed
    /// under the write lock so concurrent readers never observe a partial
    /// column.
    forward: RwLock<HashMap<usize, Column>>,
}

impl ForwardReturnEngine {
    /// Wraps a store and precomputes the canonical forward-return columns.
    #[must_use]
    pub fn new(store: Arc<SeriesStore>) -> Self {
        let engine = Self {
            store,
            forward: RwLock::new(HashMap::new()),
        };
        for (_, days) in CANONICAL_HORIZONS {
            engine.forward_column(days);
        }
        engine
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SeriesStore> {
        &self.store
    }

    /// The forward-return column for an offset, computing and memoizing it
    /// when absent.
    #[must_use]
    pub fn forward_column(&self, days: usize) -> Column {
        {
            let guard = self.forward.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(column) = guard.get(&days) {
                return Arc::clone(column);
            }
        }

        let mut guard = self.forward.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(column) = guard.get(&days) {
            return Arc::clone(column);
        }
        tracing::debug!(days, "Computing forward-return column");
        let column: Column = Arc::new(self.compute_forward(days));
        guard.insert(days, Arc::clone(&column));
        column
    }

    /// Forward return at offset `days`: `close[i+days] / close[i] - 1`,
    /// null when fewer than `days` future trading days remain.
    fn compute_forward(&self, days: usize) -> Vec<Option<f64>> {
        let close = self.store.close();
        let len = close.len();
        (0..len)
            .map(|i| {
                let future = i.checked_add(days)?;
                if future >= len {
                    return None;
                }
                match (close[i], close[future]) {
                    (Some(now), Some(later)) if now != 0.0 => Some(later / now - 1.0),
                    _ => None,
                }
            })
            .collect()
    }

    /// Forward-return statistics for the masked days across the requested
    /// horizons.
    ///
    /// `count` is the mask cardinality; an empty mask short-circuits to a
    /// count of zero with no horizon entries. Per horizon, null forward
    /// returns are dropped before computing statistics; an empty remainder
    /// reports no data and an unparsable label reports an invalid period
    /// format. Neither is an error.
    ///
    /// # Errors
    ///
    /// Returns an error only when the mask is not aligned with the store.
    pub fn analyze(&self, mask: &[bool], horizons: &[String]) -> Result<AnalysisResult> {
        ensure!(
            mask.len() == self.store.len(),
            "mask length {} does not match store length {}",
            mask.len(),
            self.store.len()
        );

        let count = mask.iter().filter(|selected| **selected).count();
        let mut result = AnalysisResult {
            count,
            horizons: BTreeMap::new(),
        };
        if count == 0 {
            return Ok(result);
        }

        for label in horizons {
            let outcome = match Horizon::parse(label) {
                Err(_) => HorizonOutcome::InvalidPeriodFormat,
                Ok(horizon) => {
                    let column = self.forward_column(horizon.days());
                    let values: Vec<f64> = mask
                        .iter()
                        .zip(column.iter())
                        .filter(|(selected, _)| **selected)
                        .filter_map(|(_, value)| *value)
                        .collect();
                    if values.is_empty() {
                        HorizonOutcome::NoData
                    } else {
                        HorizonOutcome::Ok(horizon_stats(&values, horizon.cagr_years()))
                    }
                }
            };
            result.horizons.insert(label.clone(), outcome);
        }

        Ok(result)
    }

    /// Baseline statistics: [`Self::analyze`] over the all-true mask.
    ///
    /// # Errors
    ///
    /// Never fails in practice; shares [`Self::analyze`]'s signature.
    pub fn get_baseline_stats(&self, horizons: &[String]) -> Result<AnalysisResult> {
        let mask = vec![true; self.store.len()];
        self.analyze(&mask, horizons)
    }

    /// Raw per-day rows (close plus each horizon's forward return) for the
    /// masked days, for audit and plotting. Unparsable horizon labels are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only when the mask is not aligned with the store.
    pub fn get_signals(&self, mask: &[bool], horizons: &[String]) -> Result<Vec<SignalRow>> {
        ensure!(
            mask.len() == self.store.len(),
            "mask length {} does not match store length {}",
            mask.len(),
            self.store.len()
        );

        let mut columns: Vec<(String, Column)> = Vec::new();
        for label in horizons {
            if let Ok(horizon) = Horizon::parse(label) {
                columns.push((label.clone(), self.forward_column(horizon.days())));
            }
        }

        let close = self.store.close();
        let dates = self.store.dates();
        let mut rows = Vec::new();
        for (i, selected) in mask.iter().enumerate() {
            if !selected {
                continue;
            }
            let forward = columns
                .iter()
                .map(|(label, column)| (label.clone(), column[i]))
                .collect();
            rows.push(SignalRow {
                date: dates[i],
                close: close[i],
                forward,
            });
        }
        Ok(rows)
    }
}

/// Distribution statistics over the non-null forward returns of one
/// horizon. CAGR uses the arithmetic mean of total returns (the average
/// outcome of the signal, not a compounded path) and is null at or below
/// -100% to avoid complex roots.
#[allow(clippy::cast_precision_loss)]
fn horizon_stats(values: &[f64], cagr_years: Option<f64>) -> HorizonStats {
    let len = values.len() as f64;
    let mean = values.iter().sum::<f64>() / len;

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    let std = if values.len() < 2 {
        0.0
    } else {
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (len - 1.0);
        variance.sqrt()
    };

    let wins = values.iter().filter(|v| **v > 0.0).count() as f64;

    let cagr = cagr_years.and_then(|years| {
        if mean > -1.0 {
            Some((1.0 + mean).powf(1.0 / years) - 1.0)
        } else {
            None
        }
    });

    HorizonStats {
        mean,
        median,
        std,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        win_rate: wins / len,
        cagr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};
    use edge_lab_data::StoreBuilder;
    use edge_lab_core::DailyBar;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn weekday_dates(start: &str, count: usize) -> Vec<NaiveDate> {
        let mut out = Vec::with_capacity(count);
        let mut day: NaiveDate = start.parse().unwrap();
        while out.len() < count {
            if day.weekday().num_days_from_monday() < 5 {
                out.push(day);
            }
            day = day.succ_opt().unwrap();
        }
        out
    }

    fn store_from_closes(closes: &[f64]) -> Arc<SeriesStore> {
        let dates = weekday_dates("2010-01-04", closes.len());
        let bars: Vec<DailyBar> = dates
            .iter()
            .zip(closes.iter())
            .map(|(date, close)| DailyBar {
                date: *date,
                close: *close,
                volume: 1_000_000.0,
            })
            .collect();
        Arc::new(StoreBuilder::from_primary(bars).build().unwrap())
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    /// A 10-year weekday series where every 5-trading-day forward return is
    /// exactly `weekly_drift`, with an intra-week dip so every Friday closes
    /// below its Thursday.
    fn drifting_weekly_store(weeks: usize, weekly_drift: f64) -> Arc<SeriesStore> {
        // Mon..Fri pattern; Friday below Thursday.
        let pattern = [100.0, 101.0, 102.0, 103.0, 99.0];
        let mut closes = Vec::with_capacity(weeks * 5);
        let mut scale = 1.0;
        for _ in 0..weeks {
            for base in pattern {
                closes.push(base * scale);
            }
            scale *= 1.0 + weekly_drift;
        }
        store_from_closes(&closes)
    }

    // ============================================
    // Forward-column Tests
    // ============================================

    #[test]
    fn forward_return_is_null_when_history_runs_out() {
        let store = store_from_closes(&[100.0, 110.0, 121.0, 133.1]);
        let engine = ForwardReturnEngine::new(store);

        let column = engine.forward_column(2);
        assert!((column[0].unwrap() - 0.21).abs() < 1e-12);
        assert!((column[1].unwrap() - 0.21).abs() < 1e-12);
        assert_eq!(column[2], None);
        assert_eq!(column[3], None);
    }

    #[test]
    fn forward_column_is_memoized() {
        let store = store_from_closes(&[100.0, 101.0, 102.0]);
        let engine = ForwardReturnEngine::new(store);
        let first = engine.forward_column(7);
        let second = engine.forward_column(7);
        assert!(Arc::ptr_eq(&first, &second));
    }

    // ============================================
    // analyze Tests
    // ============================================

    #[test]
    fn analyze_all_true_matches_baseline() {
        let closes: Vec<f64> = (0..300).map(|i| 100.0 + (i as f64) * 0.3).collect();
        let store = store_from_closes(&closes);
        let engine = ForwardReturnEngine::new(store.clone());

        let horizons = labels(&["1W", "1M", "3M", "1Y"]);
        let mask = vec![true; store.len()];
        let analyzed = engine.analyze(&mask, &horizons).unwrap();
        let baseline = engine.get_baseline_stats(&horizons).unwrap();
        assert_eq!(analyzed, baseline);
    }

    #[test]
    fn analyze_is_invariant_to_horizon_order() {
        let closes: Vec<f64> = (0..400).map(|i| 100.0 * (1.0_f64 + 0.001).powi(i)).collect();
        let store = store_from_closes(&closes);
        let engine = ForwardReturnEngine::new(store.clone());

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mask: Vec<bool> = (0..store.len()).map(|i| i % 3 == 0).collect();

        let mut horizons = labels(&["1Y", "1W", "3M", "1M"]);
        let first = engine.analyze(&mask, &horizons).unwrap();
        horizons.shuffle(&mut rng);
        let second = engine.analyze(&mask, &horizons).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn count_equals_mask_cardinality_even_when_far_horizon_has_no_data() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + i as f64).collect();
        let store = store_from_closes(&closes);
        let engine = ForwardReturnEngine::new(store.clone());

        // Mask only days near the end: 1Y (252 days) can never resolve.
        let mask: Vec<bool> = (0..store.len()).map(|i| i >= 90).collect();
        let result = engine
            .analyze(&mask, &labels(&["1W", "1Y"]))
            .unwrap();

        assert_eq!(result.count, 10);
        assert_eq!(result.horizons["1Y"], HorizonOutcome::NoData);
        assert!(result.horizons["1W"].is_ok());
    }

    #[test]
    fn empty_mask_reports_count_zero_with_no_horizons() {
        let store = store_from_closes(&[100.0, 101.0, 102.0]);
        let engine = ForwardReturnEngine::new(store.clone());
        let mask = vec![false; store.len()];
        let result = engine.analyze(&mask, &labels(&["1M"])).unwrap();
        assert_eq!(result.count, 0);
        assert!(result.horizons.is_empty());
    }

    #[test]
    fn unparsable_horizon_reports_invalid_period_format() {
        let store = store_from_closes(&[100.0, 101.0, 102.0, 103.0]);
        let engine = ForwardReturnEngine::new(store.clone());
        let mask = vec![true; store.len()];
        let result = engine
            .analyze(&mask, &labels(&["1D", "bogus"]))
            .unwrap();
        assert_eq!(
            result.horizons["bogus"],
            HorizonOutcome::InvalidPeriodFormat
        );
        assert!(result.horizons["1D"].is_ok());
    }

    #[test]
    fn misaligned_mask_is_rejected() {
        let store = store_from_closes(&[100.0, 101.0]);
        let engine = ForwardReturnEngine::new(store);
        assert!(engine.analyze(&[true], &labels(&["1W"])).is_err());
    }

    // ============================================
    // Statistics Tests
    // ============================================

    #[test]
    fn cagr_matches_closed_form_for_multi_year_horizons() {
        let values = [0.5, 0.7, 0.6];
        let mean: f64 = values.iter().sum::<f64>() / 3.0;
        for (label, years) in [("3Y", 3.0), ("5Y", 5.0), ("10Y", 10.0)] {
            let horizon = Horizon::parse(label).unwrap();
            let stats = horizon_stats(&values, horizon.cagr_years());
            let expected = (1.0 + mean).powf(1.0 / years) - 1.0;
            assert!(
                (stats.cagr.unwrap() - expected).abs() < 1e-12,
                "cagr for {label}"
            );
        }
    }

    #[test]
    fn cagr_is_null_not_nan_when_mean_at_or_below_minus_one() {
        let stats = horizon_stats(&[-1.5, -0.9], Some(3.0));
        assert_eq!(stats.cagr, None);
    }

    #[test]
    fn one_year_horizon_never_gets_cagr() {
        let horizon = Horizon::parse("1Y").unwrap();
        let stats = horizon_stats(&[0.1, 0.2], horizon.cagr_years());
        assert_eq!(stats.cagr, None);
    }

    #[test]
    fn win_rate_counts_strictly_positive_returns() {
        let stats = horizon_stats(&[0.1, -0.1, 0.0, 0.2], None);
        assert!((stats.win_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn median_averages_middle_pair_for_even_samples() {
        let stats = horizon_stats(&[0.4, 0.1, 0.2, 0.3], None);
        assert!((stats.median - 0.25).abs() < 1e-12);
        assert!((stats.min - 0.1).abs() < 1e-12);
        assert!((stats.max - 0.4).abs() < 1e-12);
    }

    #[test]
    fn single_sample_std_is_zero() {
        let stats = horizon_stats(&[0.25], None);
        assert!((stats.std - 0.0).abs() < f64::EPSILON);
    }

    // ============================================
    // Scenario Tests
    // ============================================

    #[test]
    fn negative_fridays_capture_the_injected_weekly_drift() {
        let weeks = 520; // ten years
        let drift = 0.002;
        let store = drifting_weekly_store(weeks, drift);
        let engine = ForwardReturnEngine::new(store.clone());

        let returns = store.column("return").unwrap();
        let mask: Vec<bool> = store
            .dates()
            .iter()
            .zip(returns.iter())
            .map(|(date, ret)| {
                date.weekday().num_days_from_monday() == 4
                    && ret.map(|r| r < 0.0).unwrap_or(false)
            })
            .collect();

        let result = engine.analyze(&mask, &labels(&["1W"])).unwrap();
        // Every Friday closes below its Thursday, so every Friday qualifies.
        assert_eq!(result.count, weeks);
        let stats = result.horizons["1W"].stats().unwrap();
        // The final week's Friday has no 1W forward return and drops out of
        // the distribution; the rest equal the injected drift exactly.
        assert!((stats.mean - drift).abs() < 1e-9, "mean was {}", stats.mean);
        assert!((stats.win_rate - 1.0).abs() < 1e-12);
    }

    #[test]
    fn get_signals_returns_masked_rows_with_forward_returns() {
        let store = store_from_closes(&[100.0, 110.0, 121.0, 133.1, 146.41, 161.051]);
        let engine = ForwardReturnEngine::new(store.clone());

        let mut mask = vec![false; store.len()];
        mask[1] = true;
        mask[4] = true;

        let rows = engine
            .get_signals(&mask, &labels(&["1D", "nonsense"]))
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, store.dates()[1]);
        assert!((rows[0].forward["1D"].unwrap() - 0.10).abs() < 1e-9);
        // Unparsable labels are skipped, not errored.
        assert!(!rows[0].forward.contains_key("nonsense"));
        // Last masked day near the end may still resolve a 1D horizon here.
        assert!((rows[1].forward["1D"].unwrap() - 0.10).abs() < 1e-9);
    }
}
