pub mod assemble;
pub mod context;
pub mod csv_history;
pub mod factory;
pub mod fetch;
pub mod ratio;
pub mod remote;
pub mod store;

pub use assemble::assemble_store;
pub use context::market_context;
pub use csv_history::CsvHistoryProvider;
pub use factory::StoreFactory;
pub use fetch::fetch_auxiliary;
pub use ratio::RatioFileProvider;
pub use remote::StooqClient;
pub use store::{Column, SeriesStore, StoreBuilder, COL_CLOSE, COL_RATIO, COL_RETURN, COL_VOLUME};
