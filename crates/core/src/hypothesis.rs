//! Hypothesis payloads exchanged with the generator and emitted as the
//! validated outbound surface.

use crate::analysis::{AnalysisResult, SignalRow};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A free-text market hypothesis proposed by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisSeed {
    pub question: String,
    /// One-sentence explanation of why the question is interesting.
    pub rationale: String,
    /// Heuristic 0–100 score of how likely the pattern is a real edge.
    /// Informational only; nothing branches on it.
    pub predictive_score: u8,
}

/// Predicate source generated for a hypothesis, with the horizons the
/// question explicitly asked about (none means caller defaults apply).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPredicate {
    pub source: String,
    pub horizons: Option<Vec<String>>,
}

/// A hypothesis that survived validation, with its full analysis attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedHypothesis {
    pub id: Uuid,
    pub question: String,
    pub rationale: String,
    pub predictive_score: u8,
    pub predicate_source: String,
    /// Horizon labels the analysis was run over, after defaulting.
    pub horizons: Vec<String>,
    pub occurrences: usize,
    pub analysis: AnalysisResult,
    pub baseline: AnalysisResult,
    /// Raw masked rows, capped to a fixed sample size.
    pub signal_rows: Vec<SignalRow>,
    /// Natural-language interpretation from the summarizer, or a fixed
    /// placeholder when the summarizer failed.
    pub interpretation: String,
    /// Attempts consumed before acceptance (1 when the first predicate ran).
    pub attempts: u8,
}
