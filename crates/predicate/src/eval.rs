//! Evaluation of predicate expressions against the series store.
//!
//! Values are either scalars, daily-aligned series/masks, or period-grain
//! series/masks produced by the monthly/weekly aggregation builtins. The
//! only bridge from period grain back to daily grain is `expand` /
//! `period_last_day`, which join on ordinal period keys. A predicate is
//! valid only if it evaluates to a daily boolean mask.

use crate::ast::{parse, BinaryOp, Expr, UnaryOp};
use crate::error::PredicateError;
use chrono::Datelike;
use edge_lab_backtest::{
    aggregate_last, aggregate_max, aggregate_mean, aggregate_min, daily_period_keys,
    distinct_period_keys, expand_period_mask, period_last_day_mask, PeriodGrain,
};
use edge_lab_data::SeriesStore;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Daily(Vec<Option<f64>>),
    DailyMask(Vec<bool>),
    Period {
        grain: PeriodGrain,
        keys: Vec<i64>,
        values: Vec<Option<f64>>,
    },
    PeriodMask {
        grain: PeriodGrain,
        keys: Vec<i64>,
        values: Vec<bool>,
    },
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Daily(_) => "daily series",
            Self::DailyMask(_) => "daily mask",
            Self::Period { .. } => "period series",
            Self::PeriodMask { .. } => "period mask",
        }
    }
}

/// Compiles and evaluates predicate source, requiring a daily boolean mask
/// aligned with the store.
///
/// # Errors
///
/// Any tokenizer, parser, or evaluation fault surfaces as a typed
/// [`PredicateError`]; a well-typed expression of the wrong shape is
/// [`PredicateError::NotAMask`].
pub fn evaluate_mask(store: &SeriesStore, source: &str) -> Result<Vec<bool>, PredicateError> {
    let expr = parse(source)?;
    let evaluator = Evaluator::new(store);
    match evaluator.eval(&expr)? {
        Value::DailyMask(mask) => Ok(mask),
        other => {
            tracing::debug!(kind = other.kind(), "Predicate produced a non-mask value");
            Err(PredicateError::NotAMask)
        }
    }
}

pub struct Evaluator<'a> {
    store: &'a SeriesStore,
    month_keys: Vec<i64>,
    week_keys: Vec<i64>,
}

impl<'a> Evaluator<'a> {
    #[must_use]
    pub fn new(store: &'a SeriesStore) -> Self {
        Self {
            store,
            month_keys: daily_period_keys(PeriodGrain::Month, store.dates()),
            week_keys: daily_period_keys(PeriodGrain::Week, store.dates()),
        }
    }

    /// Evaluates one expression node.
    ///
    /// # Errors
    ///
    /// Returns a typed [`PredicateError`] for unknown columns/functions,
    /// arity violations, and operand type or grain mismatches.
    pub fn eval(&self, expr: &Expr) -> Result<Value, PredicateError> {
        match expr {
            Expr::Number(value) => Ok(Value::Scalar(*value)),
            Expr::Column(name) => self.column(name),
            Expr::Call { name, args } => self.call(name, args),
            Expr::Unary { op, expr } => self.unary(*op, expr),
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
        }
    }

    fn column(&self, name: &str) -> Result<Value, PredicateError> {
        self.store
            .column(name)
            .map(|column| Value::Daily(column.as_ref().clone()))
            .ok_or_else(|| PredicateError::UnknownColumn(name.to_string()))
    }

    fn keys_for(&self, grain: PeriodGrain) -> &[i64] {
        match grain {
            PeriodGrain::Month => &self.month_keys,
            PeriodGrain::Week => &self.week_keys,
        }
    }

    fn call(&self, raw_name: &str, args: &[Expr]) -> Result<Value, PredicateError> {
        let lowered = raw_name.to_ascii_lowercase();
        let name = lowered.as_str();
        match name {
            "day_of_week" => {
                self.expect_arity(name, args, 0)?;
                Ok(Value::Daily(
                    self.store
                        .dates()
                        .iter()
                        .map(|d| Some(f64::from(d.weekday().num_days_from_monday())))
                        .collect(),
                ))
            }
            "month" => {
                self.expect_arity(name, args, 0)?;
                Ok(Value::Daily(
                    self.store
                        .dates()
                        .iter()
                        .map(|d| Some(f64::from(d.month())))
                        .collect(),
                ))
            }
            "year" => {
                self.expect_arity(name, args, 0)?;
                Ok(Value::Daily(
                    self.store
                        .dates()
                        .iter()
                        .map(|d| Some(f64::from(d.year())))
                        .collect(),
                ))
            }
            "monthly_month" => {
                self.expect_arity(name, args, 0)?;
                let keys = distinct_period_keys(&self.month_keys);
                let values = keys.iter().map(|k| Some((k % 100) as f64)).collect();
                Ok(Value::Period {
                    grain: PeriodGrain::Month,
                    keys,
                    values,
                })
            }
            "monthly_year" => {
                self.expect_arity(name, args, 0)?;
                let keys = distinct_period_keys(&self.month_keys);
                let values = keys.iter().map(|k| Some((k / 100) as f64)).collect();
                Ok(Value::Period {
                    grain: PeriodGrain::Month,
                    keys,
                    values,
                })
            }
            "abs" => {
                self.expect_arity(name, args, 1)?;
                match self.eval(&args[0])? {
                    Value::Scalar(v) => Ok(Value::Scalar(v.abs())),
                    Value::Daily(values) => Ok(Value::Daily(
                        values.into_iter().map(|v| v.map(f64::abs)).collect(),
                    )),
                    Value::Period {
                        grain,
                        keys,
                        values,
                    } => Ok(Value::Period {
                        grain,
                        keys,
                        values: values.into_iter().map(|v| v.map(f64::abs)).collect(),
                    }),
                    other => Err(PredicateError::type_error(format!(
                        "abs expects a numeric operand, got {}",
                        other.kind()
                    ))),
                }
            }
            "monthly_last" | "monthly_mean" | "monthly_min" | "monthly_max" => {
                self.aggregate(name, args, PeriodGrain::Month)
            }
            "weekly_last" | "weekly_mean" | "weekly_min" | "weekly_max" => {
                self.aggregate(name, args, PeriodGrain::Week)
            }
            "expand" => {
                self.expect_arity(name, args, 1)?;
                match self.eval(&args[0])? {
                    Value::PeriodMask {
                        grain,
                        keys,
                        values,
                    } => {
                        let coarse: Vec<(i64, bool)> =
                            keys.into_iter().zip(values).collect();
                        Ok(Value::DailyMask(expand_period_mask(
                            &coarse,
                            self.keys_for(grain),
                        )))
                    }
                    other => Err(PredicateError::type_error(format!(
                        "expand expects a period mask, got {}",
                        other.kind()
                    ))),
                }
            }
            "period_last_day" => {
                self.expect_arity(name, args, 1)?;
                match self.eval(&args[0])? {
                    Value::PeriodMask {
                        grain,
                        keys,
                        values,
                    } => {
                        let coarse: Vec<(i64, bool)> =
                            keys.into_iter().zip(values).collect();
                        Ok(Value::DailyMask(period_last_day_mask(
                            &coarse,
                            self.keys_for(grain),
                        )))
                    }
                    other => Err(PredicateError::type_error(format!(
                        "period_last_day expects a period mask, got {}",
                        other.kind()
                    ))),
                }
            }
            "shift" => {
                self.expect_arity(name, args, 2)?;
                let offset = self.expect_int(name, &args[1])?;
                match self.eval(&args[0])? {
                    Value::Daily(values) => Ok(Value::Daily(shift_options(&values, offset))),
                    Value::DailyMask(values) => Ok(Value::DailyMask(shift_bools(&values, offset))),
                    Value::Period {
                        grain,
                        keys,
                        values,
                    } => Ok(Value::Period {
                        grain,
                        keys,
                        values: shift_options(&values, offset),
                    }),
                    Value::PeriodMask {
                        grain,
                        keys,
                        values,
                    } => Ok(Value::PeriodMask {
                        grain,
                        keys,
                        values: shift_bools(&values, offset),
                    }),
                    other => Err(PredicateError::type_error(format!(
                        "shift expects a series, got {}",
                        other.kind()
                    ))),
                }
            }
            "pct_change" => {
                self.expect_arity(name, args, 2)?;
                let offset = self.expect_int(name, &args[1])?;
                if offset < 1 {
                    return Err(PredicateError::type_error(
                        "pct_change offset must be at least 1",
                    ));
                }
                match self.eval(&args[0])? {
                    Value::Daily(values) => {
                        Ok(Value::Daily(pct_change(&values, offset as usize)))
                    }
                    Value::Period {
                        grain,
                        keys,
                        values,
                    } => Ok(Value::Period {
                        grain,
                        keys,
                        values: pct_change(&values, offset as usize),
                    }),
                    other => Err(PredicateError::type_error(format!(
                        "pct_change expects a numeric series, got {}",
                        other.kind()
                    ))),
                }
            }
            "rolling_mean" | "rolling_std" | "rolling_min" | "rolling_max" => {
                self.expect_arity(name, args, 2)?;
                let window = self.expect_window(name, &args[1])?;
                let values = self.expect_daily(name, &args[0])?;
                Ok(Value::Daily(rolling(&values, window, |w| match name {
                    "rolling_mean" => mean(w),
                    "rolling_std" => sample_std(w),
                    "rolling_min" => w.iter().copied().reduce(f64::min),
                    _ => w.iter().copied().reduce(f64::max),
                })))
            }
            "rolling_quantile" => {
                self.expect_arity(name, args, 3)?;
                let window = self.expect_window(name, &args[1])?;
                let q = match self.eval(&args[2])? {
                    Value::Scalar(q) if (0.0..=1.0).contains(&q) => q,
                    _ => {
                        return Err(PredicateError::type_error(
                            "rolling_quantile level must be a scalar in [0, 1]",
                        ))
                    }
                };
                let values = self.expect_daily(name, &args[0])?;
                Ok(Value::Daily(rolling(&values, window, |w| {
                    Some(quantile(w, q))
                })))
            }
            other => Err(PredicateError::UnknownFunction(other.to_string())),
        }
    }

    fn aggregate(
        &self,
        name: &str,
        args: &[Expr],
        grain: PeriodGrain,
    ) -> Result<Value, PredicateError> {
        self.expect_arity(name, args, 1)?;
        let values = self.expect_daily(name, &args[0])?;
        let daily_keys = self.keys_for(grain);
        let pairs = match name.split('_').last() {
            Some("last") => aggregate_last(&values, daily_keys),
            Some("mean") => aggregate_mean(&values, daily_keys),
            Some("min") => aggregate_min(&values, daily_keys),
            _ => aggregate_max(&values, daily_keys),
        };
        let (keys, values): (Vec<i64>, Vec<Option<f64>>) = pairs.into_iter().unzip();
        Ok(Value::Period {
            grain,
            keys,
            values,
        })
    }

    fn unary(&self, op: UnaryOp, expr: &Expr) -> Result<Value, PredicateError> {
        let value = self.eval(expr)?;
        match (op, value) {
            (UnaryOp::Neg, Value::Scalar(v)) => Ok(Value::Scalar(-v)),
            (UnaryOp::Neg, Value::Daily(values)) => Ok(Value::Daily(
                values.into_iter().map(|v| v.map(|x| -x)).collect(),
            )),
            (
                UnaryOp::Neg,
                Value::Period {
                    grain,
                    keys,
                    values,
                },
            ) => Ok(Value::Period {
                grain,
                keys,
                values: values.into_iter().map(|v| v.map(|x| -x)).collect(),
            }),
            (UnaryOp::Not, Value::DailyMask(values)) => {
                Ok(Value::DailyMask(values.into_iter().map(|v| !v).collect()))
            }
            (
                UnaryOp::Not,
                Value::PeriodMask {
                    grain,
                    keys,
                    values,
                },
            ) => Ok(Value::PeriodMask {
                grain,
                keys,
                values: values.into_iter().map(|v| !v).collect(),
            }),
            (UnaryOp::Neg, other) => Err(PredicateError::type_error(format!(
                "cannot negate a {}",
                other.kind()
            ))),
            (UnaryOp::Not, other) => Err(PredicateError::type_error(format!(
                "'not' expects a mask, got {}",
                other.kind()
            ))),
        }
    }

    fn binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, PredicateError> {
        let lhs = self.eval(lhs)?;
        let rhs = self.eval(rhs)?;
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                arithmetic(op, lhs, rhs)
            }
            BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Eq
            | BinaryOp::Ne => comparison(op, lhs, rhs),
            BinaryOp::And | BinaryOp::Or => connective(op, lhs, rhs),
        }
    }

    fn expect_arity(
        &self,
        name: &str,
        args: &[Expr],
        expected: usize,
    ) -> Result<(), PredicateError> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(PredicateError::Arity {
                function: name.to_string(),
                expected,
                actual: args.len(),
            })
        }
    }

    fn expect_int(&self, name: &str, expr: &Expr) -> Result<i64, PredicateError> {
        match self.eval(expr)? {
            Value::Scalar(v) if v.fract() == 0.0 => Ok(v as i64),
            other => Err(PredicateError::type_error(format!(
                "{name} expects an integer argument, got {}",
                other.kind()
            ))),
        }
    }

    fn expect_window(&self, name: &str, expr: &Expr) -> Result<usize, PredicateError> {
        let window = self.expect_int(name, expr)?;
        if window < 1 {
            return Err(PredicateError::type_error(format!(
                "{name} window must be at least 1"
            )));
        }
        Ok(window as usize)
    }

    fn expect_daily(&self, name: &str, expr: &Expr) -> Result<Vec<Option<f64>>, PredicateError> {
        match self.eval(expr)? {
            Value::Daily(values) => Ok(values),
            other => Err(PredicateError::type_error(format!(
                "{name} expects a daily numeric series, got {}",
                other.kind()
            ))),
        }
    }
}

fn arithmetic(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, PredicateError> {
    let apply = |a: f64, b: f64| match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        _ => a / b,
    };

    match (lhs, rhs) {
        (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(apply(a, b))),
        (Value::Daily(a), Value::Scalar(b)) => Ok(Value::Daily(
            a.into_iter().map(|v| v.map(|x| apply(x, b))).collect(),
        )),
        (Value::Scalar(a), Value::Daily(b)) => Ok(Value::Daily(
            b.into_iter().map(|v| v.map(|x| apply(a, x))).collect(),
        )),
        (Value::Daily(a), Value::Daily(b)) => Ok(Value::Daily(
            a.into_iter()
                .zip(b)
                .map(|(x, y)| match (x, y) {
                    (Some(x), Some(y)) => Some(apply(x, y)),
                    _ => None,
                })
                .collect(),
        )),
        (
            Value::Period {
                grain,
                keys,
                values,
            },
            Value::Scalar(b),
        ) => Ok(Value::Period {
            grain,
            keys,
            values: values.into_iter().map(|v| v.map(|x| apply(x, b))).collect(),
        }),
        (
            Value::Scalar(a),
            Value::Period {
                grain,
                keys,
                values,
            },
        ) => Ok(Value::Period {
            grain,
            keys,
            values: values.into_iter().map(|v| v.map(|x| apply(a, x))).collect(),
        }),
        (
            Value::Period {
                grain: lg,
                keys: lk,
                values: lv,
            },
            Value::Period {
                grain: rg,
                keys: rk,
                values: rv,
            },
        ) => {
            ensure_same_grain(lg, &lk, rg, &rk)?;
            Ok(Value::Period {
                grain: lg,
                keys: lk,
                values: lv
                    .into_iter()
                    .zip(rv)
                    .map(|(x, y)| match (x, y) {
                        (Some(x), Some(y)) => Some(apply(x, y)),
                        _ => None,
                    })
                    .collect(),
            })
        }
        (lhs, rhs) => Err(PredicateError::type_error(format!(
            "cannot combine {} and {} arithmetically",
            lhs.kind(),
            rhs.kind()
        ))),
    }
}

fn comparison(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, PredicateError> {
    let test = |a: f64, b: f64| match op {
        BinaryOp::Gt => a > b,
        BinaryOp::Ge => a >= b,
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Eq => a == b,
        _ => a != b,
    };
    // Null observations never satisfy a comparison.
    let opt = |a: Option<f64>, b: Option<f64>| match (a, b) {
        (Some(a), Some(b)) => test(a, b),
        _ => false,
    };

    match (lhs, rhs) {
        (Value::Daily(a), Value::Scalar(b)) => Ok(Value::DailyMask(
            a.into_iter().map(|v| opt(v, Some(b))).collect(),
        )),
        (Value::Scalar(a), Value::Daily(b)) => Ok(Value::DailyMask(
            b.into_iter().map(|v| opt(Some(a), v)).collect(),
        )),
        (Value::Daily(a), Value::Daily(b)) => Ok(Value::DailyMask(
            a.into_iter().zip(b).map(|(x, y)| opt(x, y)).collect(),
        )),
        (
            Value::Period {
                grain,
                keys,
                values,
            },
            Value::Scalar(b),
        ) => Ok(Value::PeriodMask {
            grain,
            keys,
            values: values.into_iter().map(|v| opt(v, Some(b))).collect(),
        }),
        (
            Value::Scalar(a),
            Value::Period {
                grain,
                keys,
                values,
            },
        ) => Ok(Value::PeriodMask {
            grain,
            keys,
            values: values.into_iter().map(|v| opt(Some(a), v)).collect(),
        }),
        (
            Value::Period {
                grain: lg,
                keys: lk,
                values: lv,
            },
            Value::Period {
                grain: rg,
                keys: rk,
                values: rv,
            },
        ) => {
            ensure_same_grain(lg, &lk, rg, &rk)?;
            Ok(Value::PeriodMask {
                grain: lg,
                keys: lk,
                values: lv.into_iter().zip(rv).map(|(x, y)| opt(x, y)).collect(),
            })
        }
        (lhs, rhs) => Err(PredicateError::type_error(format!(
            "cannot compare {} with {}",
            lhs.kind(),
            rhs.kind()
        ))),
    }
}

fn connective(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, PredicateError> {
    let apply = |a: bool, b: bool| match op {
        BinaryOp::And => a && b,
        _ => a || b,
    };

    match (lhs, rhs) {
        (Value::DailyMask(a), Value::DailyMask(b)) => Ok(Value::DailyMask(
            a.into_iter().zip(b).map(|(x, y)| apply(x, y)).collect(),
        )),
        (
            Value::PeriodMask {
                grain: lg,
                keys: lk,
                values: lv,
            },
            Value::PeriodMask {
                grain: rg,
                keys: rk,
                values: rv,
            },
        ) => {
            ensure_same_grain(lg, &lk, rg, &rk)?;
            Ok(Value::PeriodMask {
                grain: lg,
                keys: lk,
                values: lv.into_iter().zip(rv).map(|(x, y)| apply(x, y)).collect(),
            })
        }
        (lhs, rhs) => Err(PredicateError::type_error(format!(
            "boolean connective expects two masks of the same grain, got {} and {}",
            lhs.kind(),
            rhs.kind()
        ))),
    }
}

fn ensure_same_grain(
    lg: PeriodGrain,
    lk: &[i64],
    rg: PeriodGrain,
    rk: &[i64],
) -> Result<(), PredicateError> {
    if lg != rg {
        return Err(PredicateError::GrainMismatch(format!(
            "{lg:?} vs {rg:?}"
        )));
    }
    if lk != rk {
        return Err(PredicateError::GrainMismatch(
            "period series cover different key ranges".to_string(),
        ));
    }
    Ok(())
}

/// Positive offsets pull values from earlier rows (pandas `shift(1)`);
/// negative offsets pull from later rows. Vacated slots are null.
fn shift_options(values: &[Option<f64>], offset: i64) -> Vec<Option<f64>> {
    let len = values.len() as i64;
    (0..len)
        .map(|i| {
            let from = i - offset;
            if from < 0 || from >= len {
                None
            } else {
                values[from as usize]
            }
        })
        .collect()
}

/// Mask shift; vacated slots are false.
fn shift_bools(values: &[bool], offset: i64) -> Vec<bool> {
    let len = values.len() as i64;
    (0..len)
        .map(|i| {
            let from = i - offset;
            if from < 0 || from >= len {
                false
            } else {
                values[from as usize]
            }
        })
        .collect()
}

fn pct_change(values: &[Option<f64>], offset: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i < offset {
                return None;
            }
            match (values[i - offset], values[i]) {
                (Some(base), Some(now)) if base != 0.0 => Some(now / base - 1.0),
                _ => None,
            }
        })
        .collect()
}

/// Trailing window ending at each row; a row is null until the window is
/// full of non-null observations, matching the strict min-periods default
/// the generated predicates assume.
fn rolling<F>(values: &[Option<f64>], window: usize, stat: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let present: Vec<f64> = slice.iter().filter_map(|v| *v).collect();
            if present.len() < window {
                return None;
            }
            stat(&present)
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[allow(clippy::cast_precision_loss)]
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Linear-interpolation quantile over a non-empty sample.
#[allow(clippy::cast_precision_loss)]
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    if sorted.len() == 1 {
        return sorted[0];
    }
    let position = q * (sorted.len() - 1) as f64;
    let low = position.floor() as usize;
    let high = position.ceil() as usize;
    if low == high {
        sorted[low]
    } else {
        let weight = position - low as f64;
        sorted[low] * (1.0 - weight) + sorted[high] * weight
    }
}
