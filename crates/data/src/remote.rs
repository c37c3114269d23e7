use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use edge_lab_core::{DailyBar, HistoricalDataProvider};
use reqwest::Client;

/// Thin wrapper around the Stooq daily-quotes CSV endpoint.
///
/// The endpoint returns `Date,Open,High,Low,Close,Volume`; only close and
/// volume survive into [`DailyBar`]. Rows with a missing or unparsable close
/// are skipped rather than failing the whole fetch.
pub struct StooqClient {
    http_client: Client,
    base_url: String,
}

impl StooqClient {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            http_client: Client::new(),
            base_url,
        }
    }
}

impl Default for StooqClient {
    fn default() -> Self {
        Self::new("https://stooq.com".to_string())
    }
}

#[async_trait]
impl HistoricalDataProvider for StooqClient {
    async fn fetch_daily(&self, symbol: &str, start: NaiveDate) -> Result<Vec<DailyBar>> {
        let end = Utc::now().date_naive();
        let url = format!(
            "{}/q/d/l/?s={}&d1={}&d2={}&i=d",
            self.base_url,
            symbol.to_lowercase(),
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
        );

        let body = self
            .http_client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("History request failed for {symbol}"))?
            .error_for_status()
            .with_context(|| format!("History request rejected for {symbol}"))?
            .text()
            .await?;

        parse_stooq_csv(&body, symbol)
    }
}

fn parse_stooq_csv(body: &str, symbol: &str) -> Result<Vec<DailyBar>> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut bars = Vec::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        let record = result?;
        if record.len() < 6 {
            skipped += 1;
            continue;
        }
        let date: Option<NaiveDate> = record[0].parse().ok();
        let close: Option<f64> = record[4].parse().ok();
        let volume: f64 = record[5].parse().unwrap_or(0.0);
        match (date, close) {
            (Some(date), Some(close)) => bars.push(DailyBar {
                date,
                close,
                volume,
            }),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(symbol, skipped, "Skipped unparsable history rows");
    }
    bars.sort_by_key(|bar| bar.date);
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_rows_and_skips_bad_ones() {
        let body = "Date,Open,High,Low,Close,Volume\n\
                    2024-01-03,4740,4750,4700,4710.5,2100000\n\
                    2024-01-02,4730,4745,4720,4742.83,1900000\n\
                    2024-01-04,4711,4712,4690,N/D,0\n";
        let bars = parse_stooq_csv(body, "^spx").unwrap();
        assert_eq!(bars.len(), 2);
        // Sorted ascending regardless of response order.
        assert_eq!(bars[0].date.to_string(), "2024-01-02");
        assert!((bars[1].close - 4710.5).abs() < 1e-9);
    }

    #[test]
    fn empty_volume_defaults_to_zero() {
        let body = "Date,Open,High,Low,Close,Volume\n2024-01-02,10,11,9,10.5,\n";
        let bars = parse_stooq_csv(body, "tnx").unwrap();
        assert_eq!(bars.len(), 1);
        assert!((bars[0].volume - 0.0).abs() < f64::EPSILON);
    }
}
