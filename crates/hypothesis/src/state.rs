//! Hypothesis lifecycle as a tagged-variant state machine.
//!
//! The orchestrator drives [`advance`], a pure transition function, so the
//! whole lifecycle is testable without a generator or an engine.

use edge_lab_predicate::SignalReport;
use serde::Serialize;
use std::fmt;

/// Bound on validation attempts per hypothesis. After the third failure the
/// hypothesis is dropped silently.
pub const MAX_ATTEMPTS: u8 = 3;

/// Why an attempt failed. The `Display` form is fed verbatim into the next
/// repair request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// The generator produced no usable predicate source.
    Generation,
    /// Predicate compilation or evaluation faulted.
    Execution(String),
    /// The predicate matched no historical days.
    ZeroOccurrences,
    /// Requested horizons the history could not support.
    DataUnavailable(Vec<String>),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generation => write!(f, "generation failure"),
            Self::Execution(detail) => write!(f, "execution error: {detail}"),
            Self::ZeroOccurrences => write!(f, "zero occurrences"),
            Self::DataUnavailable(labels) => {
                write!(f, "data not available for periods: {}", labels.join(", "))
            }
        }
    }
}

/// Lifecycle state of one hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub enum HypothesisState {
    Proposed { attempt: u8 },
    Executing { attempt: u8 },
    Accepted,
    Failed { reason: FailureReason, attempt: u8 },
}

impl HypothesisState {
    /// Initial state for a fresh hypothesis.
    #[must_use]
    pub fn proposed() -> Self {
        Self::Proposed { attempt: 1 }
    }

    /// True once the attempt budget is spent.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Failed { attempt, .. } if *attempt >= MAX_ATTEMPTS)
    }
}

/// Events the orchestrator feeds into the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationEvent {
    /// Generation + execution of the current attempt has started.
    ExecutionStarted,
    /// The attempt produced an accepted analysis.
    Succeeded,
    /// The attempt failed with a classified reason.
    Faulted(FailureReason),
    /// A replacement hypothesis was obtained; try again.
    Replaced,
}

/// Pure transition function. Events that make no sense in the current state
/// leave it unchanged.
#[must_use]
pub fn advance(state: &HypothesisState, event: ValidationEvent) -> HypothesisState {
    match (state, event) {
        (HypothesisState::Proposed { attempt }, ValidationEvent::ExecutionStarted) => {
            HypothesisState::Executing { attempt: *attempt }
        }
        (HypothesisState::Executing { .. }, ValidationEvent::Succeeded) => {
            HypothesisState::Accepted
        }
        (HypothesisState::Executing { attempt }, ValidationEvent::Faulted(reason)) => {
            HypothesisState::Failed {
                reason,
                attempt: *attempt,
            }
        }
        (HypothesisState::Failed { attempt, .. }, ValidationEvent::Replaced)
            if *attempt < MAX_ATTEMPTS =>
        {
            HypothesisState::Proposed {
                attempt: attempt + 1,
            }
        }
        (state, _) => state.clone(),
    }
}

/// Classifies a successful execution's report: zero occurrences first, then
/// any requested horizon without data. `None` means the report is
/// acceptable.
#[must_use]
pub fn classify_report(report: &SignalReport) -> Option<FailureReason> {
    if report.occurrences == 0 {
        return Some(FailureReason::ZeroOccurrences);
    }
    let missing = report.analysis.unavailable_horizons();
    if !missing.is_empty() {
        return Some(FailureReason::DataUnavailable(missing));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_are_verbatim() {
        assert_eq!(FailureReason::Generation.to_string(), "generation failure");
        assert_eq!(
            FailureReason::Execution("unknown column 'vvix'".to_string()).to_string(),
            "execution error: unknown column 'vvix'"
        );
        assert_eq!(
            FailureReason::ZeroOccurrences.to_string(),
            "zero occurrences"
        );
        assert_eq!(
            FailureReason::DataUnavailable(vec!["3Y".to_string(), "5Y".to_string()]).to_string(),
            "data not available for periods: 3Y, 5Y"
        );
    }

    #[test]
    fn happy_path_reaches_accepted() {
        let state = HypothesisState::proposed();
        let state = advance(&state, ValidationEvent::ExecutionStarted);
        assert_eq!(state, HypothesisState::Executing { attempt: 1 });
        let state = advance(&state, ValidationEvent::Succeeded);
        assert_eq!(state, HypothesisState::Accepted);
    }

    #[test]
    fn failure_then_replacement_increments_attempt() {
        let state = HypothesisState::proposed();
        let state = advance(&state, ValidationEvent::ExecutionStarted);
        let state = advance(
            &state,
            ValidationEvent::Faulted(FailureReason::ZeroOccurrences),
        );
        assert_eq!(
            state,
            HypothesisState::Failed {
                reason: FailureReason::ZeroOccurrences,
                attempt: 1
            }
        );
        assert!(!state.is_exhausted());

        let state = advance(&state, ValidationEvent::Replaced);
        assert_eq!(state, HypothesisState::Proposed { attempt: 2 });
    }

    #[test]
    fn third_failure_exhausts_and_cannot_be_replaced() {
        let mut state = HypothesisState::proposed();
        for _ in 0..3 {
            state = advance(&state, ValidationEvent::ExecutionStarted);
            state = advance(
                &state,
                ValidationEvent::Faulted(FailureReason::Generation),
            );
            state = advance(&state, ValidationEvent::Replaced);
        }
        assert_eq!(
            state,
            HypothesisState::Failed {
                reason: FailureReason::Generation,
                attempt: 3
            }
        );
        assert!(state.is_exhausted());
    }

    #[test]
    fn nonsensical_events_leave_state_unchanged() {
        let accepted = HypothesisState::Accepted;
        assert_eq!(
            advance(&accepted, ValidationEvent::ExecutionStarted),
            accepted
        );
        let proposed = HypothesisState::proposed();
        assert_eq!(advance(&proposed, ValidationEvent::Succeeded), proposed);
    }
}
