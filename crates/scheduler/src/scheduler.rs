use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use edge_lab_backtest::ForwardReturnEngine;
use edge_lab_core::{
    HypothesisGenerator, MarketContext, SchedulerConfig, ValidatedHypothesis,
};
use edge_lab_data::market_context;
use edge_lab_hypothesis::ValidationOrchestrator;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Outbound surface of the daily batch: the validated set plus the context
/// it was generated from.
#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub generated_at: DateTime<Utc>,
    pub context: MarketContext,
    pub accepted: Vec<ValidatedHypothesis>,
}

pub struct ValidationScheduler {
    config: SchedulerConfig,
    engine: Arc<ForwardReturnEngine>,
    generator: Arc<dyn HypothesisGenerator>,
    orchestrator: Arc<ValidationOrchestrator>,
}

impl ValidationScheduler {
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        engine: Arc<ForwardReturnEngine>,
        generator: Arc<dyn HypothesisGenerator>,
        orchestrator: Arc<ValidationOrchestrator>,
    ) -> Self {
        Self {
            config,
            engine,
            generator,
            orchestrator,
        }
    }

    /// Starts the scheduler and runs the daily batch on the cron schedule.
    ///
    /// # Errors
    /// Returns an error if the scheduler fails to start or job scheduling
    /// fails; batch failures inside the job are logged, never fatal.
    pub async fn start(self) -> Result<()> {
        if !self.config.enabled {
            info!("Validation scheduler is disabled");
            return Ok(());
        }

        info!(
            "Starting validation scheduler with cron: {}",
            self.config.cron_schedule
        );

        let scheduler = JobScheduler::new().await?;
        let config = self.config.clone();
        let engine = Arc::clone(&self.engine);
        let generator = Arc::clone(&self.generator);
        let orchestrator = Arc::clone(&self.orchestrator);
        let cron_schedule = config.cron_schedule.clone();

        let job = Job::new_async(cron_schedule.as_str(), move |_uuid, _lock| {
            let config = config.clone();
            let engine = Arc::clone(&engine);
            let generator = Arc::clone(&generator);
            let orchestrator = Arc::clone(&orchestrator);
            Box::pin(async move {
                if let Err(e) =
                    run_daily_batch(&config, &engine, &generator, &orchestrator).await
                {
                    error!("Daily validation batch failed: {e:#}");
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Validation scheduler started successfully");

        // Keep scheduler running
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;
        }
    }

    /// Runs the daily batch once (manual execution).
    ///
    /// # Errors
    /// Returns an error if context extraction, generation, or report
    /// writing fails.
    pub async fn run_once(&self) -> Result<DailyReport> {
        run_daily_batch(
            &self.config,
            &self.engine,
            &self.generator,
            &self.orchestrator,
        )
        .await
    }
}

async fn run_daily_batch(
    config: &SchedulerConfig,
    engine: &Arc<ForwardReturnEngine>,
    generator: &Arc<dyn HypothesisGenerator>,
    orchestrator: &Arc<ValidationOrchestrator>,
) -> Result<DailyReport> {
    let context = market_context(engine.store())?;
    info!(date = %context.date, "Running daily validation batch");

    let seeds = generator
        .daily_hypotheses(&context)
        .await
        .context("Failed to generate daily hypotheses")?;
    info!(proposed = seeds.len(), "Hypotheses proposed");

    let accepted = Arc::clone(orchestrator).validate_batch(&context, seeds).await;
    info!(accepted = accepted.len(), "Hypotheses accepted");

    let report = DailyReport {
        generated_at: Utc::now(),
        context,
        accepted,
    };
    write_report(&report, &config.report_path)?;
    Ok(report)
}

fn write_report(report: &DailyReport, path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write report to {path}"))?;
    info!(path, "Daily report written");
    Ok(())
}
