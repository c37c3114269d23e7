use crate::fetch::fetch_auxiliary;
use crate::store::{SeriesStore, StoreBuilder};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use edge_lab_core::{DataConfig, HistoricalDataProvider, ValuationRatioProvider};
use std::sync::Arc;
use tracing::info;

/// Builds the merged store from configuration: primary history, auxiliary
/// series fan-out, and the optional valuation ratio.
///
/// # Errors
///
/// Returns an error when the primary fetch fails, the ratio provider fails,
/// or the configured start date is malformed. Auxiliary failures are
/// tolerated per-symbol.
pub async fn assemble_store(
    config: &DataConfig,
    provider: Arc<dyn HistoricalDataProvider>,
    ratio_provider: Option<Arc<dyn ValuationRatioProvider>>,
) -> Result<SeriesStore> {
    let start: NaiveDate = config
        .start_date
        .parse()
        .with_context(|| format!("Invalid start_date in config: {}", config.start_date))?;

    info!(
        symbol = %config.primary_symbol,
        %start,
        "Fetching primary history"
    );
    let primary = provider
        .fetch_daily(&config.primary_symbol, start)
        .await
        .with_context(|| format!("Failed to fetch primary history {}", config.primary_symbol))?;

    let auxiliary = fetch_auxiliary(
        Arc::clone(&provider),
        &config.auxiliary,
        start,
        config.fetch_concurrency,
    )
    .await;

    let mut builder = StoreBuilder::from_primary(primary);
    for (name, points) in auxiliary {
        builder = builder.with_auxiliary(&name, points);
    }

    if let Some(ratio_provider) = ratio_provider {
        let points = ratio_provider
            .fetch_ratio()
            .await
            .context("Failed to load valuation ratio series")?;
        builder = builder.with_ratio(points);
    }

    let store = builder.build()?;
    info!(
        rows = store.len(),
        columns = store.column_names().len(),
        "Series store assembled"
    );
    Ok(store)
}
