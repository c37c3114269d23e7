use crate::analysis::AnalysisResult;
use crate::hypothesis::{GeneratedPredicate, HypothesisSeed};
use crate::market::{DailyBar, MarketContext, SeriesPoint};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Source of daily history for a symbol, starting at a given date.
#[async_trait]
pub trait HistoricalDataProvider: Send + Sync {
    async fn fetch_daily(&self, symbol: &str, start: NaiveDate) -> Result<Vec<DailyBar>>;
}

/// Source of date-to-ratio pairs, forward-filled onto the trading-day
/// index by the store builder.
#[async_trait]
pub trait ValuationRatioProvider: Send + Sync {
    async fn fetch_ratio(&self) -> Result<Vec<SeriesPoint>>;
}

/// Upstream language-model collaborator that proposes and repairs
/// hypotheses and turns them into predicate source.
#[async_trait]
pub trait HypothesisGenerator: Send + Sync {
    /// Zero or more hypotheses for today's market context.
    async fn daily_hypotheses(&self, context: &MarketContext) -> Result<Vec<HypothesisSeed>>;

    /// Predicate source for a hypothesis text, plus any horizons the
    /// question explicitly asked about.
    async fn predicate_for(&self, question: &str) -> Result<GeneratedPredicate>;

    /// Exactly one replacement for a hypothesis that failed validation.
    /// `reason` is the verbatim failure classification.
    async fn replacement_for(
        &self,
        context: &MarketContext,
        question: &str,
        reason: &str,
    ) -> Result<Option<HypothesisSeed>>;
}

/// Collaborator that writes a short interpretation of an accepted result.
#[async_trait]
pub trait ResultSummarizer: Send + Sync {
    async fn interpret(
        &self,
        question: &str,
        analysis: &AnalysisResult,
        baseline: &AnalysisResult,
    ) -> Result<String>;
}
