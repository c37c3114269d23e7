pub mod engine;
pub mod period;

pub use engine::ForwardReturnEngine;
pub use period::{
    aggregate_last, aggregate_max, aggregate_mean, aggregate_min, daily_period_keys,
    distinct_period_keys, expand_period_mask, period_key, period_last_day_mask, PeriodGrain,
};
