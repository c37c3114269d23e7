//! The merged daily series store.
//!
//! One row per trading date, ascending and unique. Columns are nullable f64
//! vectors aligned 1:1 with the date index; the store is immutable once
//! built and is shared across the process behind an `Arc`.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use edge_lab_core::{DailyBar, SeriesPoint};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A nullable column aligned with the store's date index.
pub type Column = Arc<Vec<Option<f64>>>;

pub const COL_CLOSE: &str = "close";
pub const COL_RETURN: &str = "return";
pub const COL_VOLUME: &str = "volume";
pub const COL_RATIO: &str = "pe";

/// Immutable merged daily series: primary close/return/volume plus any
/// auxiliary and valuation columns.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    dates: Vec<NaiveDate>,
    close: Column,
    columns: BTreeMap<String, Column>,
}

impl SeriesStore {
    /// Number of trading days.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// The trading-date index, ascending and unique.
    #[must_use]
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// The primary close column.
    #[must_use]
    pub fn close(&self) -> &Column {
        &self.close
    }

    /// Looks up a column by name, case-insensitively.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(&name.to_lowercase())
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(&name.to_lowercase())
    }

    /// Column names in sorted order, for the data catalog fed to the
    /// generator.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }
}

/// Assembles a [`SeriesStore`] from primary bars, auxiliary series, and an
/// optional valuation ratio, mirroring the merge order the engine depends
/// on: primary index is master, auxiliaries join on exact dates, the ratio
/// is forward-filled.
#[derive(Debug, Default)]
pub struct StoreBuilder {
    bars: Vec<DailyBar>,
    auxiliary: Vec<(String, Vec<SeriesPoint>)>,
    ratio: Option<Vec<SeriesPoint>>,
}

impl StoreBuilder {
    /// Starts a builder from primary daily bars (any order; duplicates on a
    /// date keep the first occurrence).
    #[must_use]
    pub fn from_primary(bars: Vec<DailyBar>) -> Self {
        Self {
            bars,
            auxiliary: Vec::new(),
            ratio: None,
        }
    }

    /// Adds an auxiliary series joined left-outer on the primary index
    /// under a simplified column name.
    #[must_use]
    pub fn with_auxiliary(mut self, name: &str, points: Vec<SeriesPoint>) -> Self {
        self.auxiliary.push((name.to_lowercase(), points));
        self
    }

    /// Adds the valuation-ratio series, forward-filled onto the index as
    /// the `pe` column.
    #[must_use]
    pub fn with_ratio(mut self, points: Vec<SeriesPoint>) -> Self {
        self.ratio = Some(points);
        self
    }

    /// Builds the store.
    ///
    /// # Errors
    ///
    /// Returns an error when no primary bars were supplied.
    pub fn build(self) -> Result<SeriesStore> {
        if self.bars.is_empty() {
            bail!("cannot build a series store from an empty primary history");
        }

        let mut bars = self.bars;
        bars.sort_by_key(|bar| bar.date);
        bars.dedup_by_key(|bar| bar.date);

        let dates: Vec<NaiveDate> = bars.iter().map(|bar| bar.date).collect();
        let close: Vec<Option<f64>> = bars.iter().map(|bar| Some(bar.close)).collect();
        let volume: Vec<Option<f64>> = bars.iter().map(|bar| Some(bar.volume)).collect();

        // Daily return from the previous trading day's close; first row has
        // no predecessor.
        let mut daily_return: Vec<Option<f64>> = Vec::with_capacity(bars.len());
        daily_return.push(None);
        for window in bars.windows(2) {
            let prev = window[0].close;
            let curr = window[1].close;
            if prev != 0.0 {
                daily_return.push(Some(curr / prev - 1.0));
            } else {
                daily_return.push(None);
            }
        }

        let close: Column = Arc::new(close);
        let mut columns: BTreeMap<String, Column> = BTreeMap::new();
        columns.insert(COL_CLOSE.to_string(), Arc::clone(&close));
        columns.insert(COL_RETURN.to_string(), Arc::new(daily_return));
        columns.insert(COL_VOLUME.to_string(), Arc::new(volume));

        for (name, points) in self.auxiliary {
            let joined = join_exact(&dates, points);
            columns.insert(name, Arc::new(joined));
        }

        if let Some(points) = self.ratio {
            let filled = forward_fill(&dates, points);
            columns.insert(COL_RATIO.to_string(), Arc::new(filled));
        }

        Ok(SeriesStore {
            dates,
            close,
            columns,
        })
    }
}

/// Left join on exact dates; days without an observation stay null.
fn join_exact(dates: &[NaiveDate], mut points: Vec<SeriesPoint>) -> Vec<Option<f64>> {
    points.sort_by_key(|p| p.date);
    points.dedup_by_key(|p| p.date);

    let by_date: BTreeMap<NaiveDate, f64> = points.into_iter().map(|p| (p.date, p.value)).collect();
    dates.iter().map(|d| by_date.get(d).copied()).collect()
}

/// Carries the most recent observation at or before each trading day
/// forward, so observation dates that are not trading days still land.
fn forward_fill(dates: &[NaiveDate], mut points: Vec<SeriesPoint>) -> Vec<Option<f64>> {
    points.sort_by_key(|p| p.date);
    points.dedup_by_key(|p| p.date);

    let mut out = Vec::with_capacity(dates.len());
    let mut cursor = 0usize;
    let mut last: Option<f64> = None;
    for date in dates {
        while cursor < points.len() && points[cursor].date <= *date {
            last = Some(points[cursor].value);
            cursor += 1;
        }
        out.push(last);
    }
    out
}
