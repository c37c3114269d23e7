//! Fault taxonomy for predicate compilation and evaluation.
//!
//! Every way a generated predicate can go wrong maps to one of these
//! variants; nothing escapes the executor boundary unclassified. The
//! orchestrator folds any of them into its "execution error" repair reason.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredicateError {
    /// The source could not be tokenized or parsed.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// A bare identifier did not resolve to a store column.
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// A call named a function outside the allowed set.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// A function received the wrong number of arguments.
    #[error("{function} expects {expected} argument(s), got {actual}")]
    Arity {
        function: String,
        expected: usize,
        actual: usize,
    },

    /// An operation was applied to operands of the wrong kind.
    #[error("type error: {0}")]
    Type(String),

    /// Two period-grain series of different grains were combined.
    #[error("period grain mismatch: {0}")]
    GrainMismatch(String),

    /// The expression evaluated to something other than a daily boolean
    /// series.
    #[error("predicate must evaluate to a daily boolean series")]
    NotAMask,

    /// Downstream analysis rejected the mask (should not happen for masks
    /// produced here; kept so the executor never panics).
    #[error("analysis failed: {0}")]
    Analysis(String),
}

impl PredicateError {
    pub(crate) fn type_error(detail: impl Into<String>) -> Self {
        Self::Type(detail.into())
    }

    pub(crate) fn syntax(detail: impl Into<String>) -> Self {
        Self::Syntax(detail.into())
    }
}
