//! Gemini-style `generateContent` client implementing the hypothesis
//! generator and result summarizer traits.
//!
//! Responses are expected as JSON; markdown code fences are stripped before
//! parsing because the model does not always honor the format rule. Every
//! fault degrades the way the orchestrator expects: generation faults
//! surface as errors (classified upstream), replacement faults yield
//! `None`, and interpretation falls back to plain text.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use edge_lab_core::{
    AnalysisResult, GeneratedPredicate, HypothesisGenerator, HypothesisSeed, LlmConfig,
    MarketContext, ResultSummarizer,
};
use governor::{clock::DefaultClock, state::InMemoryState, Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, warn};

const PREDICATE_LANGUAGE_REFERENCE: &str = "\
Predicates are a single boolean expression over daily series, not Python.\n\
Columns: bare identifiers (close, return, volume, pe, vix, tnx, btc, rsp, hyg).\n\
Operators: + - * /, comparisons > >= < <= == !=, connectives and/or/not.\n\
Daily functions: day_of_week() (Mon=0), month(), year(), abs(x),\n\
shift(x, n), pct_change(x, n), rolling_mean(x, n), rolling_std(x, n),\n\
rolling_min(x, n), rolling_max(x, n), rolling_quantile(x, n, q).\n\
Monthly/weekly grain: monthly_last(x), monthly_mean(x), monthly_min(x),\n\
monthly_max(x), monthly_month(), monthly_year(), weekly_last(x),\n\
weekly_mean(x), weekly_min(x), weekly_max(x); combine with shift and\n\
pct_change at the same grain, then map back to days with expand(mask) or\n\
period_last_day(mask). Example: expand(shift(pct_change(monthly_last(close), 1) < -0.05, 1)).\n\
For year-scale thresholds use rolling windows (e.g. rolling_quantile(vix, 252, 0.75)),\n\
never calendar-year grouping.";

pub struct GeminiClient {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: String,
    hypotheses_per_day: usize,
    data_catalog: String,
    rate_limiter: Arc<RateLimiter<governor::state::direct::NotKeyed, InMemoryState, DefaultClock>>,
}

impl GeminiClient {
    #[must_use]
    pub fn new(config: &LlmConfig) -> Self {
        // Generous bound; the daily batch is a handful of calls.
        let quota = Quota::per_minute(NonZeroU32::new(30).unwrap_or(NonZeroU32::MIN));
        Self {
            http_client: Client::new(),
            base_url: config.api_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            hypotheses_per_day: config.hypotheses_per_day,
            data_catalog: "close, return, volume, pe".to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Replaces the column catalog quoted to the model.
    #[must_use]
    pub fn with_data_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.data_catalog = catalog.into();
        self
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        if self.api_key.is_empty() {
            bail!("LLM API key is not configured");
        }
        self.rate_limiter.until_ready().await;

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response: GenerateContentResponse = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("LLM request failed")?
            .error_for_status()
            .context("LLM request rejected")?
            .json()
            .await
            .context("LLM response was not JSON")?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .context("LLM response had no candidates")
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

/// Strips a leading/trailing markdown code fence, tolerating a language
/// tag on the opening fence.
#[must_use]
pub fn strip_fences(text: &str) -> &str {
    let mut trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest,
        };
        trimmed = rest;
    }
    if let Some(rest) = trimmed.strip_suffix("```") {
        trimmed = rest;
    }
    trimmed.trim()
}

#[derive(Debug, Deserialize)]
struct PredicateEnvelope {
    code: String,
    #[serde(default)]
    periods: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct QuestionEnvelope {
    question: String,
    #[serde(default)]
    insight_explanation: String,
    #[serde(default)]
    predictive_score: u8,
}

#[derive(Debug, Deserialize)]
struct DailyEnvelope {
    #[serde(default)]
    questions: Vec<QuestionEnvelope>,
}

#[derive(Debug, Deserialize)]
struct InterpretationEnvelope {
    result_explanation: String,
}

pub(crate) fn parse_predicate(raw: &str) -> Result<GeneratedPredicate> {
    let envelope: PredicateEnvelope =
        serde_json::from_str(strip_fences(raw)).context("predicate envelope was not JSON")?;
    Ok(GeneratedPredicate {
        source: envelope.code,
        horizons: envelope.periods,
    })
}

pub(crate) fn parse_daily(raw: &str) -> Result<Vec<HypothesisSeed>> {
    let envelope: DailyEnvelope =
        serde_json::from_str(strip_fences(raw)).context("daily envelope was not JSON")?;
    Ok(envelope
        .questions
        .into_iter()
        .map(|q| HypothesisSeed {
            question: q.question,
            rationale: q.insight_explanation,
            predictive_score: q.predictive_score.min(100),
        })
        .collect())
}

pub(crate) fn parse_replacement(raw: &str) -> Option<HypothesisSeed> {
    let envelope: QuestionEnvelope = serde_json::from_str(strip_fences(raw)).ok()?;
    Some(HypothesisSeed {
        question: envelope.question,
        rationale: envelope.insight_explanation,
        predictive_score: envelope.predictive_score.min(100),
    })
}

pub(crate) fn parse_interpretation(raw: &str) -> String {
    let cleaned = strip_fences(raw);
    match serde_json::from_str::<InterpretationEnvelope>(cleaned) {
        Ok(envelope) => envelope.result_explanation,
        // Malformed JSON: treat the whole text as the explanation.
        Err(_) => cleaned
            .replace(['{', '}'], "")
            .replace("\"result_explanation\":", "")
            .trim()
            .trim_matches('"')
            .to_string(),
    }
}

#[async_trait]
impl HypothesisGenerator for GeminiClient {
    async fn daily_hypotheses(&self, context: &MarketContext) -> Result<Vec<HypothesisSeed>> {
        let prompt = format!(
            "You are a senior quantitative analyst. Today is {date}: close {close}, \
             daily return {ret}%, relative volume {vol}x, volatility z-score {vz}.\n\
             Headlines: {headlines}\n\
             Propose {count} backtesting questions about the S&P 500 that can be \
             answered from these columns: {catalog}. Prefer macro and inter-market \
             relationships over pure technicals, avoid hyper-specific overfit \
             conditions, and choose forward-return periods (1W,1M,3M,6M,1Y,3Y,5Y,10Y) \
             that match each hypothesis.\n\
             Respond with JSON only: {{\"questions\": [{{\"question\": \"...\", \
             \"insight_explanation\": \"...\", \"predictive_score\": 0-100}}]}}",
            date = context.date,
            close = context.close,
            ret = context.return_pct,
            vol = context.volume_rel,
            vz = context.volatility_rank,
            headlines = serde_json::to_string(&context.headlines).unwrap_or_default(),
            count = self.hypotheses_per_day,
            catalog = self.data_catalog,
        );

        let raw = self.generate(prompt).await?;
        let seeds = parse_daily(&raw)?;
        debug!(count = seeds.len(), "Daily hypotheses generated");
        Ok(seeds)
    }

    async fn predicate_for(&self, question: &str) -> Result<GeneratedPredicate> {
        let prompt = format!(
            "Convert this backtesting question into one predicate expression and \
             extract explicitly requested forward-return periods.\n\
             Question: \"{question}\"\n\
             Available columns: {catalog}\n\
             {reference}\n\
             Respond with JSON only: {{\"code\": \"<expression>\", \
             \"periods\": [\"3M\", \"1Y\"] or null}}",
            catalog = self.data_catalog,
            reference = PREDICATE_LANGUAGE_REFERENCE,
        );

        let raw = self.generate(prompt).await?;
        parse_predicate(&raw)
    }

    async fn replacement_for(
        &self,
        context: &MarketContext,
        question: &str,
        reason: &str,
    ) -> Result<Option<HypothesisSeed>> {
        let prompt = format!(
            "The backtesting question \"{question}\" failed validation: {reason}.\n\
             Market context {date}: return {ret}%.\n\
             Generate ONE replacement question answerable from these columns: \
             {catalog}. It must plausibly have historical occurrences.\n\
             Respond with JSON only: {{\"question\": \"...\", \
             \"insight_explanation\": \"...\", \"predictive_score\": 0-100}}",
            date = context.date,
            ret = context.return_pct,
            catalog = self.data_catalog,
        );

        match self.generate(prompt).await {
            Ok(raw) => Ok(parse_replacement(&raw)),
            Err(e) => {
                warn!("Replacement generation failed: {e}");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ResultSummarizer for GeminiClient {
    async fn interpret(
        &self,
        question: &str,
        analysis: &AnalysisResult,
        baseline: &AnalysisResult,
    ) -> Result<String> {
        let prompt = format!(
            "Interpret these backtest results in 2-3 objective sentences: did the \
             signal beat the baseline, at which horizons, and is the sample size \
             ({count} occurrences) trustworthy?\n\
             Question: \"{question}\"\n\
             Signal stats: {signal}\n\
             Baseline stats: {baseline}\n\
             Respond with JSON only: {{\"result_explanation\": \"...\"}}",
            count = analysis.count,
            signal = serde_json::to_string(analysis).unwrap_or_default(),
            baseline = serde_json::to_string(baseline).unwrap_or_default(),
        );

        let raw = self.generate(prompt).await?;
        Ok(parse_interpretation(&raw))
    }
}
