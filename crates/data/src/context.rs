use crate::store::{SeriesStore, COL_RETURN, COL_VOLUME};
use anyhow::{bail, Context, Result};
use edge_lab_core::MarketContext;

/// Trailing window for the relative-volume and volatility stats.
const LOOKBACK_DAYS: usize = 30;

/// Extracts the technical snapshot of the most recent trading day, used as
/// generator context.
///
/// # Errors
///
/// Returns an error when the store is empty or the latest row has no close.
pub fn market_context(store: &SeriesStore) -> Result<MarketContext> {
    if store.is_empty() {
        bail!("cannot extract market context from an empty store");
    }

    let last = store.len() - 1;
    let window_start = last.saturating_sub(LOOKBACK_DAYS);

    let close = store.close()[last].context("latest trading day has no close")?;
    let returns = store
        .column(COL_RETURN)
        .context("store has no return column")?;
    let volumes = store
        .column(COL_VOLUME)
        .context("store has no volume column")?;

    let today_return = returns[last].unwrap_or(0.0);
    let today_volume = volumes[last].unwrap_or(0.0);

    let window_volumes: Vec<f64> = volumes[window_start..last]
        .iter()
        .filter_map(|v| *v)
        .collect();
    let window_returns: Vec<f64> = returns[window_start..last]
        .iter()
        .filter_map(|v| *v)
        .collect();

    let volume_rel = match mean(&window_volumes) {
        Some(avg) if avg != 0.0 => today_volume / avg,
        _ => 0.0,
    };
    let volatility_rank = match std_dev(&window_returns) {
        Some(sd) if sd != 0.0 => today_return / sd,
        _ => 0.0,
    };

    Ok(MarketContext {
        date: store.dates()[last],
        close: round2(close),
        return_pct: round2(today_return * 100.0),
        volume_rel: round2(volume_rel),
        volatility_rank: round2(volatility_rank),
        headlines: Vec::new(),
    })
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[allow(clippy::cast_precision_loss)]
fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreBuilder;
    use edge_lab_core::DailyBar;

    #[test]
    fn context_reports_latest_day_stats() {
        let mut bars = Vec::new();
        for i in 0..40 {
            bars.push(DailyBar {
                date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .checked_add_days(chrono::Days::new(i))
                    .unwrap(),
                close: 100.0 + i as f64,
                volume: 1000.0,
            });
        }
        // Spike the final day's volume to 2x the trailing mean.
        bars.last_mut().unwrap().volume = 2000.0;

        let store = StoreBuilder::from_primary(bars).build().unwrap();
        let context = market_context(&store).unwrap();

        assert_eq!(context.date.to_string(), "2024-02-09");
        assert!((context.volume_rel - 2.0).abs() < 0.01);
        assert!(context.return_pct > 0.0);
    }

    #[test]
    fn flat_history_reports_zero_volatility_rank() {
        let bars: Vec<DailyBar> = (0..10)
            .map(|i| DailyBar {
                date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                    .unwrap()
                    .checked_add_days(chrono::Days::new(i))
                    .unwrap(),
                close: 50.0,
                volume: 0.0,
            })
            .collect();

        let store = StoreBuilder::from_primary(bars).build().unwrap();
        let context = market_context(&store).unwrap();
        assert!((context.volatility_rank - 0.0).abs() < f64::EPSILON);
        assert!((context.volume_rel - 0.0).abs() < f64::EPSILON);
    }
}
