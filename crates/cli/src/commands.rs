use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use edge_lab_backtest::ForwardReturnEngine;
use edge_lab_core::{
    AppConfig, HistoricalDataProvider, HorizonOutcome, HypothesisGenerator, ResultSummarizer,
};
use edge_lab_data::{
    assemble_store, csv_history, CsvHistoryProvider, RatioFileProvider, SeriesStore, StooqClient,
    StoreFactory,
};
use edge_lab_hypothesis::ValidationOrchestrator;
use edge_lab_llm::GeminiClient;
use edge_lab_predicate::SignalExecutor;
use edge_lab_scheduler::ValidationScheduler;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// The reference scenarios from the research notebook, expressed in the
/// predicate language.
const SCENARIOS: [(&str, &str, &[&str]); 3] = [
    (
        "friday",
        "day_of_week() == 4 and return < 0",
        &["1W"],
    ),
    (
        "november",
        "period_last_day(pct_change(monthly_last(close), 1) < 0 and monthly_month() == 11)",
        &["1M", "3M", "6M", "1Y"],
    ),
    (
        "valuation",
        "pe > 23",
        &["1Y", "3Y", "5Y", "10Y"],
    ),
];

pub async fn build_engine(config: &AppConfig) -> Result<Arc<ForwardReturnEngine>> {
    let factory = StoreFactory::new();
    let store = factory
        .get_or_build(|| async { build_store(config).await })
        .await?;
    Ok(Arc::new(ForwardReturnEngine::new(store)))
}

async fn build_store(config: &AppConfig) -> Result<SeriesStore> {
    let provider: Arc<dyn HistoricalDataProvider> = match &config.data.cache_path {
        Some(dir) => {
            info!(dir = %dir, "Using cached CSV history");
            Arc::new(CsvHistoryProvider::new(dir))
        }
        None => Arc::new(StooqClient::default()),
    };

    let ratio_provider = config
        .data
        .ratio_path
        .as_ref()
        .filter(|path| Path::new(path).exists())
        .map(|path| {
            Arc::new(RatioFileProvider::new(path)) as Arc<dyn edge_lab_core::ValuationRatioProvider>
        });

    assemble_store(&config.data, provider, ratio_provider).await
}

fn llm_client(config: &AppConfig, engine: &ForwardReturnEngine) -> Arc<GeminiClient> {
    let catalog = engine.store().column_names().join(", ");
    Arc::new(GeminiClient::new(&config.llm).with_data_catalog(catalog))
}

fn orchestrator(
    config: &AppConfig,
    engine: Arc<ForwardReturnEngine>,
    client: Arc<GeminiClient>,
) -> Arc<ValidationOrchestrator> {
    let generator: Arc<dyn HypothesisGenerator> = client.clone();
    let summarizer: Arc<dyn ResultSummarizer> = client;
    Arc::new(ValidationOrchestrator::new(
        engine,
        generator,
        summarizer,
        config.validation.clone(),
    ))
}

/// Runs one of the canned scenarios and prints its analysis.
pub async fn run_scenario(config: &AppConfig, name: &str) -> Result<()> {
    let Some((_, source, horizons)) = SCENARIOS.iter().find(|(n, _, _)| *n == name) else {
        let known: Vec<&str> = SCENARIOS.iter().map(|(n, _, _)| *n).collect();
        bail!("unknown scenario '{name}'; expected one of {known:?}");
    };

    let engine = build_engine(config).await?;
    let executor = SignalExecutor::new(Arc::clone(&engine))
        .with_signal_row_cap(config.validation.signal_row_cap);
    let horizons: Vec<String> = horizons.iter().map(|h| (*h).to_string()).collect();

    let report = executor
        .execute(source, &horizons)
        .map_err(|e| anyhow::anyhow!("scenario predicate failed: {e}"))?;

    println!("Scenario '{name}': {source}");
    print_report_summary(report.occurrences, &report.analysis, &report.baseline);
    Ok(())
}

/// Answers a free-text question: generate a predicate, execute it, print
/// the analysis.
pub async fn ask(config: &AppConfig, query: &str) -> Result<()> {
    let engine = build_engine(config).await?;
    let client = llm_client(config, &engine);

    let predicate = client
        .predicate_for(query)
        .await
        .context("Failed to generate a predicate for the question")?;
    let horizons = predicate
        .horizons
        .clone()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| config.validation.default_horizons.clone());

    println!("Generated predicate: {}", predicate.source);
    let executor = SignalExecutor::new(Arc::clone(&engine))
        .with_signal_row_cap(config.validation.signal_row_cap);
    let report = executor
        .execute(&predicate.source, &horizons)
        .map_err(|e| anyhow::anyhow!("generated predicate failed: {e}"))?;

    print_report_summary(report.occurrences, &report.analysis, &report.baseline);
    Ok(())
}

/// Prints unconditional baseline statistics for the given horizons.
pub async fn baseline(config: &AppConfig, horizons: &[String]) -> Result<()> {
    let engine = build_engine(config).await?;
    let labels = if horizons.is_empty() {
        config.validation.default_horizons.clone()
    } else {
        horizons.to_vec()
    };
    let result = engine.get_baseline_stats(&labels)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Fetches daily history for a symbol and writes it to a CSV cache file.
pub async fn fetch_data(symbol: &str, start: &str, output: &str) -> Result<()> {
    let start: NaiveDate = start
        .parse()
        .with_context(|| format!("Invalid start date '{start}' (expected YYYY-MM-DD)"))?;

    let client = StooqClient::default();
    let bars = client.fetch_daily(symbol, start).await?;
    if bars.is_empty() {
        bail!("provider returned no rows for {symbol}");
    }
    csv_history::write_daily(Path::new(output), symbol, &bars)?;
    info!(symbol, rows = bars.len(), output, "History written");
    Ok(())
}

/// Runs the daily validation batch once and prints where the report went.
pub async fn run_daily(config: &AppConfig) -> Result<()> {
    let engine = build_engine(config).await?;
    let client = llm_client(config, &engine);
    let orchestrator = orchestrator(config, Arc::clone(&engine), Arc::clone(&client));

    let scheduler = ValidationScheduler::new(
        config.scheduler.clone(),
        engine,
        client as Arc<dyn HypothesisGenerator>,
        orchestrator,
    );
    let report = scheduler.run_once().await?;

    println!(
        "Validated {} hypothesis(es); report at {}",
        report.accepted.len(),
        config.scheduler.report_path
    );
    for record in &report.accepted {
        println!(
            "- {} ({} occurrences, {} attempt(s))",
            record.question, record.occurrences, record.attempts
        );
    }
    Ok(())
}

/// Runs the cron-driven daemon.
pub async fn daemon(config: &AppConfig) -> Result<()> {
    let engine = build_engine(config).await?;
    let client = llm_client(config, &engine);
    let orchestrator = orchestrator(config, Arc::clone(&engine), Arc::clone(&client));

    let scheduler = ValidationScheduler::new(
        config.scheduler.clone(),
        engine,
        client as Arc<dyn HypothesisGenerator>,
        orchestrator,
    );
    scheduler.start().await
}

fn print_report_summary(
    occurrences: usize,
    analysis: &edge_lab_core::AnalysisResult,
    baseline: &edge_lab_core::AnalysisResult,
) {
    println!("Found {occurrences} occurrences.");
    for (label, outcome) in &analysis.horizons {
        match outcome {
            HorizonOutcome::Ok(stats) => {
                let baseline_mean = baseline
                    .horizons
                    .get(label)
                    .and_then(HorizonOutcome::stats)
                    .map(|s| s.mean);
                let mut line = format!(
                    "  {label}: mean {:+.2}%, median {:+.2}%, win rate {:.1}%",
                    stats.mean * 100.0,
                    stats.median * 100.0,
                    stats.win_rate * 100.0
                );
                if let Some(cagr) = stats.cagr {
                    line.push_str(&format!(", CAGR {:+.2}%", cagr * 100.0));
                }
                if let Some(baseline_mean) = baseline_mean {
                    line.push_str(&format!(" (baseline {:+.2}%)", baseline_mean * 100.0));
                }
                println!("{line}");
            }
            HorizonOutcome::NoData => println!("  {label}: no data"),
            HorizonOutcome::InvalidPeriodFormat => println!("  {label}: invalid period format"),
        }
    }
}
