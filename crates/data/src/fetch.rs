use chrono::NaiveDate;
use edge_lab_core::{AuxSeriesConfig, HistoricalDataProvider, SeriesPoint};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Fetches auxiliary close series concurrently, bounded by `concurrency`.
///
/// Each symbol runs in its own task; a failed fetch is logged and skipped so
/// one symbol cannot cancel its siblings. Results come back in the order the
/// series were configured.
pub async fn fetch_auxiliary(
    provider: Arc<dyn HistoricalDataProvider>,
    series: &[AuxSeriesConfig],
    start: NaiveDate,
    concurrency: usize,
) -> Vec<(String, Vec<SeriesPoint>)> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks: JoinSet<Option<(usize, String, Vec<SeriesPoint>)>> = JoinSet::new();

    for (index, aux) in series.iter().enumerate() {
        let provider = Arc::clone(&provider);
        let semaphore = Arc::clone(&semaphore);
        let symbol = aux.symbol.clone();
        let name = aux.name.clone();

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return None;
            };
            match provider.fetch_daily(&symbol, start).await {
                Ok(bars) => {
                    info!(%symbol, %name, rows = bars.len(), "Fetched auxiliary series");
                    let points = bars
                        .into_iter()
                        .map(|bar| SeriesPoint {
                            date: bar.date,
                            value: bar.close,
                        })
                        .collect();
                    Some((index, name, points))
                }
                Err(e) => {
                    warn!(%symbol, %name, "Failed to fetch auxiliary series: {e}");
                    None
                }
            }
        });
    }

    let mut fetched = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(result)) => fetched.push(result),
            Ok(None) => {}
            Err(e) => warn!("Auxiliary fetch task failed: {e}"),
        }
    }

    fetched.sort_by_key(|(index, _, _)| *index);
    fetched
        .into_iter()
        .map(|(_, name, points)| (name, points))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use edge_lab_core::DailyBar;

    struct FlakyProvider;

    #[async_trait]
    impl HistoricalDataProvider for FlakyProvider {
        async fn fetch_daily(&self, symbol: &str, start: NaiveDate) -> Result<Vec<DailyBar>> {
            if symbol == "BAD" {
                bail!("no data for {symbol}");
            }
            Ok(vec![DailyBar {
                date: start,
                close: 42.0,
                volume: 1.0,
            }])
        }
    }

    fn aux(symbol: &str, name: &str) -> AuxSeriesConfig {
        AuxSeriesConfig {
            symbol: symbol.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_cancel_siblings() {
        let series = vec![aux("^VIX", "vix"), aux("BAD", "bad"), aux("^TNX", "tnx")];
        let fetched = fetch_auxiliary(
            Arc::new(FlakyProvider),
            &series,
            "2024-01-02".parse().unwrap(),
            2,
        )
        .await;

        let names: Vec<&str> = fetched.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["vix", "tnx"]);
        assert!((fetched[0].1[0].value - 42.0).abs() < f64::EPSILON);
    }
}
