//! Ordinal period keys and coarse-to-daily mask expansion.
//!
//! Aggregate conditions (e.g. "the month closed down 5%") are evaluated on
//! an ordinal key (year times 100 plus the period number) and joined back
//! to the daily index on that key. Timestamp-based resample/map is
//! deliberately not offered: period-end timestamps rarely coincide with
//! trading days, and joining on timestamps silently drops periods.

use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;

/// Aggregation grain for coarse predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodGrain {
    Month,
    Week,
}

/// The ordinal key of the period containing `date`.
///
/// Months key as `year * 100 + month`; weeks as ISO `year * 100 + week`,
/// so late-December days belonging to ISO week 1 key into the next year and
/// never collide with the same week number a year earlier.
#[must_use]
pub fn period_key(grain: PeriodGrain, date: NaiveDate) -> i64 {
    match grain {
        PeriodGrain::Month => i64::from(date.year()) * 100 + i64::from(date.month()),
        PeriodGrain::Week => {
            let iso = date.iso_week();
            i64::from(iso.year()) * 100 + i64::from(iso.week())
        }
    }
}

/// Period key per trading day, aligned with the date index.
#[must_use]
pub fn daily_period_keys(grain: PeriodGrain, dates: &[NaiveDate]) -> Vec<i64> {
    dates.iter().map(|date| period_key(grain, *date)).collect()
}

/// Distinct period keys in index order.
#[must_use]
pub fn distinct_period_keys(daily_keys: &[i64]) -> Vec<i64> {
    let mut keys = Vec::new();
    for key in daily_keys {
        if keys.last() != Some(key) {
            keys.push(*key);
        }
    }
    keys
}

/// Broadcasts a coarse mask to daily granularity: every trading day whose
/// period key is marked true becomes true; days in periods absent from the
/// coarse mask are false.
#[must_use]
pub fn expand_period_mask(coarse: &[(i64, bool)], daily_keys: &[i64]) -> Vec<bool> {
    let by_key: HashMap<i64, bool> = coarse.iter().copied().collect();
    daily_keys
        .iter()
        .map(|key| by_key.get(key).copied().unwrap_or(false))
        .collect()
}

/// Marks only the last trading day of each true period, for signals
/// anchored at period end.
#[must_use]
pub fn period_last_day_mask(coarse: &[(i64, bool)], daily_keys: &[i64]) -> Vec<bool> {
    let by_key: HashMap<i64, bool> = coarse.iter().copied().collect();
    let len = daily_keys.len();
    daily_keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let is_period_end = i + 1 == len || daily_keys[i + 1] != *key;
            is_period_end && by_key.get(key).copied().unwrap_or(false)
        })
        .collect()
}

/// Per-period aggregate of a daily series: the last non-null value in each
/// period, `None` when the period has no observations.
#[must_use]
pub fn aggregate_last(values: &[Option<f64>], daily_keys: &[i64]) -> Vec<(i64, Option<f64>)> {
    aggregate(values, daily_keys, |slice| {
        slice.iter().rev().find_map(|v| *v)
    })
}

/// Per-period mean over non-null values.
#[must_use]
pub fn aggregate_mean(values: &[Option<f64>], daily_keys: &[i64]) -> Vec<(i64, Option<f64>)> {
    aggregate(values, daily_keys, |slice| {
        let present: Vec<f64> = slice.iter().filter_map(|v| *v).collect();
        if present.is_empty() {
            None
        } else {
            #[allow(clippy::cast_precision_loss)]
            let mean = present.iter().sum::<f64>() / present.len() as f64;
            Some(mean)
        }
    })
}

/// Per-period minimum over non-null values.
#[must_use]
pub fn aggregate_min(values: &[Option<f64>], daily_keys: &[i64]) -> Vec<(i64, Option<f64>)> {
    aggregate(values, daily_keys, |slice| {
        slice.iter().filter_map(|v| *v).reduce(f64::min)
    })
}

/// Per-period maximum over non-null values.
#[must_use]
pub fn aggregate_max(values: &[Option<f64>], daily_keys: &[i64]) -> Vec<(i64, Option<f64>)> {
    aggregate(values, daily_keys, |slice| {
        slice.iter().filter_map(|v| *v).reduce(f64::max)
    })
}

fn aggregate<F>(
    values: &[Option<f64>],
    daily_keys: &[i64],
    combine: F,
) -> Vec<(i64, Option<f64>)>
where
    F: Fn(&[Option<f64>]) -> Option<f64>,
{
    let mut out = Vec::new();
    let mut start = 0usize;
    while start < daily_keys.len() {
        let key = daily_keys[start];
        let mut end = start + 1;
        while end < daily_keys.len() && daily_keys[end] == key {
            end += 1;
        }
        out.push((key, combine(&values[start..end])));
        start = end;
    }
    out
}
