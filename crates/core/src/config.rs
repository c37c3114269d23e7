use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub data: DataConfig,
    pub llm: LlmConfig,
    pub validation: ValidationConfig,
    pub scheduler: SchedulerConfig,
}

/// Primary and auxiliary series to assemble into the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub primary_symbol: String,
    /// Earliest date requested from the provider, `YYYY-MM-DD`.
    pub start_date: String,
    /// Auxiliary series joined left-outer under simplified column names.
    pub auxiliary: Vec<AuxSeriesConfig>,
    /// Path to a date-to-ratio JSON file merged as the `pe` column.
    pub ratio_path: Option<String>,
    /// CSV cache of primary history, used when present.
    pub cache_path: Option<String>,
    /// Bound on concurrent auxiliary fetches.
    pub fetch_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuxSeriesConfig {
    /// Provider ticker, e.g. `^VIX`.
    pub symbol: String,
    /// Simplified column name, e.g. `vix`.
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    /// API key; usually supplied via the `EDGE_LLM__API_KEY` environment
    /// variable rather than the config file.
    pub api_key: String,
    /// Hypotheses requested per daily batch.
    pub hypotheses_per_day: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Horizons analyzed when a hypothesis does not name its own.
    pub default_horizons: Vec<String>,
    /// Wall-clock bound on a single predicate evaluation.
    pub predicate_timeout_secs: u64,
    /// Hypotheses validated concurrently.
    pub max_concurrent: usize,
    /// Cap on raw signal rows attached to a validated record.
    pub signal_row_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub cron_schedule: String,
    /// Where the daily validated-set report is written.
    pub report_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: DataConfig {
                primary_symbol: "^GSPC".to_string(),
                start_date: "1927-01-01".to_string(),
                auxiliary: vec![
                    AuxSeriesConfig {
                        symbol: "RSP".to_string(),
                        name: "rsp".to_string(),
                    },
                    AuxSeriesConfig {
                        symbol: "HYG".to_string(),
                        name: "hyg".to_string(),
                    },
                    AuxSeriesConfig {
                        symbol: "BTC-USD".to_string(),
                        name: "btc".to_string(),
                    },
                    AuxSeriesConfig {
                        symbol: "^TNX".to_string(),
                        name: "tnx".to_string(),
                    },
                    AuxSeriesConfig {
                        symbol: "^VIX".to_string(),
                        name: "vix".to_string(),
                    },
                ],
                ratio_path: Some("data/pe_data.json".to_string()),
                cache_path: None,
                fetch_concurrency: 4,
            },
            llm: LlmConfig {
                api_url: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-2.5-pro".to_string(),
                api_key: String::new(),
                hypotheses_per_day: 3,
            },
            validation: ValidationConfig {
                default_horizons: vec![
                    "1M".to_string(),
                    "3M".to_string(),
                    "6M".to_string(),
                    "1Y".to_string(),
                ],
                predicate_timeout_secs: 10,
                max_concurrent: 4,
                signal_row_cap: 25,
            },
            scheduler: SchedulerConfig {
                enabled: false,
                cron_schedule: "0 30 21 * * Mon-Fri".to_string(),
                report_path: "data/daily_report.json".to_string(),
            },
        }
    }
}
