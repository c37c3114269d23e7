use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use csv::Writer;
use edge_lab_core::{DailyBar, HistoricalDataProvider};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Reads daily history from per-symbol CSV files in a directory.
///
/// Format: `date,symbol,close,volume` with dates as `YYYY-MM-DD`. Used to
/// run the engine offline against history cached by `write_daily`.
pub struct CsvHistoryProvider {
    dir: PathBuf,
}

impl CsvHistoryProvider {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", file_stem(symbol)))
    }
}

#[async_trait]
impl HistoricalDataProvider for CsvHistoryProvider {
    async fn fetch_daily(&self, symbol: &str, start: NaiveDate) -> Result<Vec<DailyBar>> {
        let path = self.path_for(symbol);
        let bars = read_daily(&path)?;
        Ok(bars.into_iter().filter(|bar| bar.date >= start).collect())
    }
}

/// Reads a daily-history CSV.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a row fails to parse.
pub fn read_daily(path: &Path) -> Result<Vec<DailyBar>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open history CSV: {}", path.display()))?;
    let mut bars = Vec::new();

    for result in reader.records() {
        let record = result?;
        let date: NaiveDate = record[0].parse()?;
        let close: f64 = record[2].parse()?;
        let volume: f64 = record[3].parse()?;
        bars.push(DailyBar {
            date,
            close,
            volume,
        });
    }

    // Sort by date to ensure chronological order regardless of file order.
    bars.sort_by_key(|bar| bar.date);
    Ok(bars)
}

/// Writes daily history to CSV compatible with [`CsvHistoryProvider`].
///
/// # Errors
///
/// Returns an error if the file cannot be created or writing fails.
pub fn write_daily(path: &Path, symbol: &str, bars: &[DailyBar]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create history CSV: {}", path.display()))?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(["date", "symbol", "close", "volume"])?;

    let mut sorted = bars.to_vec();
    sorted.sort_by_key(|bar| bar.date);

    for bar in sorted {
        writer.write_record(&[
            bar.date.to_string(),
            symbol.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Maps a provider ticker to a filesystem-safe stem, e.g. `^GSPC` to `GSPC`.
fn file_stem(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}
