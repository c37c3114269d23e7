pub mod analysis;
pub mod config;
pub mod config_loader;
pub mod horizon;
pub mod hypothesis;
pub mod market;
pub mod traits;

pub use analysis::{AnalysisResult, HorizonOutcome, HorizonStats, SignalRow};
pub use config::{
    AppConfig, AuxSeriesConfig, DataConfig, LlmConfig, SchedulerConfig, ValidationConfig,
};
pub use config_loader::ConfigLoader;
pub use horizon::{Horizon, HorizonParseError, CANONICAL_HORIZONS};
pub use hypothesis::{GeneratedPredicate, HypothesisSeed, ValidatedHypothesis};
pub use market::{DailyBar, MarketContext, SeriesPoint};
pub use traits::{
    HistoricalDataProvider, HypothesisGenerator, ResultSummarizer, ValuationRatioProvider,
};
