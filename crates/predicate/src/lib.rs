pub mod ast;
pub mod error;
pub mod eval;
pub mod executor;
pub mod token;

pub use ast::{parse, BinaryOp, Expr, UnaryOp};
pub use error::PredicateError;
pub use eval::{evaluate_mask, Evaluator, Value};
pub use executor::{SignalExecutor, SignalReport, DEFAULT_SIGNAL_ROW_CAP};
