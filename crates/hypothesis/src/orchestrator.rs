//! Drives each hypothesis through generate, execute, then accept or repair.

use crate::state::{
    advance, classify_report, FailureReason, HypothesisState, ValidationEvent, MAX_ATTEMPTS,
};
use edge_lab_backtest::ForwardReturnEngine;
use edge_lab_core::{
    HypothesisGenerator, HypothesisSeed, MarketContext, ResultSummarizer, ValidatedHypothesis,
    ValidationConfig,
};
use edge_lab_predicate::{SignalExecutor, SignalReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Stored when the summarizer fails; acceptance never blocks on it.
pub const INTERPRETATION_PLACEHOLDER: &str = "Unable to interpret results.";

pub struct ValidationOrchestrator {
    engine: Arc<ForwardReturnEngine>,
    generator: Arc<dyn HypothesisGenerator>,
    summarizer: Arc<dyn ResultSummarizer>,
    config: ValidationConfig,
}

impl ValidationOrchestrator {
    #[must_use]
    pub fn new(
        engine: Arc<ForwardReturnEngine>,
        generator: Arc<dyn HypothesisGenerator>,
        summarizer: Arc<dyn ResultSummarizer>,
        config: ValidationConfig,
    ) -> Self {
        Self {
            engine,
            generator,
            summarizer,
            config,
        }
    }

    /// Validates one hypothesis, repairing it up to the attempt bound.
    ///
    /// Returns `None` when the hypothesis is exhausted or a replacement
    /// could not be obtained; neither is an error.
    pub async fn validate(
        &self,
        context: &MarketContext,
        seed: HypothesisSeed,
    ) -> Option<ValidatedHypothesis> {
        let mut seed = seed;
        let mut state = HypothesisState::proposed();

        loop {
            let attempt = match state {
                HypothesisState::Proposed { attempt } => attempt,
                _ => return None,
            };
            state = advance(&state, ValidationEvent::ExecutionStarted);

            match self.run_attempt(&seed).await {
                Ok((report, horizons)) => {
                    state = advance(&state, ValidationEvent::Succeeded);
                    debug_assert_eq!(state, HypothesisState::Accepted);
                    info!(
                        question = %seed.question,
                        occurrences = report.occurrences,
                        attempt,
                        "Hypothesis accepted"
                    );
                    return Some(self.accept(seed, report, horizons, attempt).await);
                }
                Err(reason) => {
                    debug!(
                        question = %seed.question,
                        %reason,
                        attempt,
                        "Hypothesis attempt failed"
                    );
                    state = advance(&state, ValidationEvent::Faulted(reason.clone()));
                    if state.is_exhausted() {
                        info!(
                            question = %seed.question,
                            "Hypothesis dropped after {MAX_ATTEMPTS} attempts"
                        );
                        return None;
                    }

                    match self
                        .generator
                        .replacement_for(context, &seed.question, &reason.to_string())
                        .await
                    {
                        Ok(Some(replacement)) => {
                            debug!(
                                replacement = %replacement.question,
                                "Replacement hypothesis received"
                            );
                            seed = replacement;
                            state = advance(&state, ValidationEvent::Replaced);
                        }
                        Ok(None) => {
                            debug!(question = %seed.question, "No replacement offered; dropping");
                            return None;
                        }
                        Err(e) => {
                            warn!(question = %seed.question, "Replacement request failed: {e}");
                            return None;
                        }
                    }
                }
            }
        }
    }

    /// Validates independent hypotheses concurrently, bounded by the
    /// configured concurrency. A hypothesis that fails (or whose task
    /// panics) is simply absent from the result; siblings are unaffected.
    pub async fn validate_batch(
        self: Arc<Self>,
        context: &MarketContext,
        seeds: Vec<HypothesisSeed>,
    ) -> Vec<ValidatedHypothesis> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks: JoinSet<(usize, Option<ValidatedHypothesis>)> = JoinSet::new();

        for (index, seed) in seeds.into_iter().enumerate() {
            let orchestrator = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            let context = context.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, None);
                };
                (index, orchestrator.validate(&context, seed).await)
            });
        }

        let mut accepted: Vec<(usize, ValidatedHypothesis)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Some(record))) => accepted.push((index, record)),
                Ok((_, None)) => {}
                Err(e) => warn!("Validation task failed: {e}"),
            }
        }

        accepted.sort_by_key(|(index, _)| *index);
        accepted.into_iter().map(|(_, record)| record).collect()
    }

    /// One generate-and-execute attempt. Faults classify in a fixed order:
    /// generation failure, execution error, zero occurrences, then data
    /// unavailability.
    async fn run_attempt(
        &self,
        seed: &HypothesisSeed,
    ) -> Result<(SignalReport, Vec<String>), FailureReason> {
        let predicate = match self.generator.predicate_for(&seed.question).await {
            Ok(predicate) if !predicate.source.trim().is_empty() => predicate,
            Ok(_) => return Err(FailureReason::Generation),
            Err(e) => {
                debug!("Predicate generation failed: {e}");
                return Err(FailureReason::Generation);
            }
        };

        let horizons = predicate
            .horizons
            .filter(|requested| !requested.is_empty())
            .unwrap_or_else(|| self.config.default_horizons.clone());

        let report = self
            .execute_with_timeout(predicate.source, horizons.clone())
            .await?;

        match classify_report(&report) {
            Some(reason) => Err(reason),
            None => Ok((report, horizons)),
        }
    }

    /// Runs the executor on a blocking thread under a wall-clock timeout.
    /// The evaluator has no loops, so a timed-out task cannot spin forever;
    /// it is abandoned and its result discarded.
    async fn execute_with_timeout(
        &self,
        source: String,
        horizons: Vec<String>,
    ) -> Result<SignalReport, FailureReason> {
        let engine = Arc::clone(&self.engine);
        let cap = self.config.signal_row_cap;
        let task = tokio::task::spawn_blocking(move || {
            SignalExecutor::new(engine)
                .with_signal_row_cap(cap)
                .execute(&source, &horizons)
        });

        let budget = Duration::from_secs(self.config.predicate_timeout_secs);
        match tokio::time::timeout(budget, task).await {
            Err(_) => Err(FailureReason::Execution(format!(
                "predicate evaluation exceeded {}s",
                self.config.predicate_timeout_secs
            ))),
            Ok(Err(join_error)) => Err(FailureReason::Execution(format!(
                "predicate task failed: {join_error}"
            ))),
            Ok(Ok(Err(predicate_error))) => {
                Err(FailureReason::Execution(predicate_error.to_string()))
            }
            Ok(Ok(Ok(report))) => Ok(report),
        }
    }

    /// Builds the outbound record, asking the summarizer for an
    /// interpretation and degrading to the placeholder on any fault.
    async fn accept(
        &self,
        seed: HypothesisSeed,
        report: SignalReport,
        horizons: Vec<String>,
        attempts: u8,
    ) -> ValidatedHypothesis {
        let interpretation = match self
            .summarizer
            .interpret(&seed.question, &report.analysis, &report.baseline)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(question = %seed.question, "Summarizer failed: {e}");
                INTERPRETATION_PLACEHOLDER.to_string()
            }
        };

        ValidatedHypothesis {
            id: Uuid::new_v4(),
            question: seed.question,
            rationale: seed.rationale,
            predictive_score: seed.predictive_score,
            predicate_source: report.source,
            horizons,
            occurrences: report.occurrences,
            analysis: report.analysis,
            baseline: report.baseline,
            signal_rows: report.rows,
            interpretation,
            attempts,
        }
    }
}
