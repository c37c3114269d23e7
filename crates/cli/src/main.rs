use clap::{Parser, Subcommand};
use edge_lab_core::ConfigLoader;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "edge-lab")]
#[command(about = "Forward-return backtesting and hypothesis validation", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a canned scenario (friday, november, valuation)
    Scenario {
        /// Scenario name
        name: String,
    },
    /// Generate and execute a predicate for a free-text question
    Ask {
        /// The backtesting question
        query: String,
    },
    /// Print unconditional baseline statistics
    Baseline {
        /// Horizon labels, e.g. 1M 1Y 10Y (defaults from config)
        horizons: Vec<String>,
    },
    /// Fetch daily history for a symbol into a CSV cache file
    FetchData {
        /// Symbol to fetch, e.g. ^GSPC
        #[arg(long)]
        symbol: String,
        /// Start date, YYYY-MM-DD
        #[arg(long)]
        start: String,
        /// Output CSV file path
        #[arg(short, long)]
        output: String,
    },
    /// Run the daily validation batch once and write the report
    Daily,
    /// Run the cron-driven validation daemon
    Daemon,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::load_from(&cli.config)?;

    match cli.command {
        Commands::Scenario { name } => commands::run_scenario(&config, &name).await,
        Commands::Ask { query } => commands::ask(&config, &query).await,
        Commands::Baseline { horizons } => commands::baseline(&config, &horizons).await,
        Commands::FetchData {
            symbol,
            start,
            output,
        } => commands::fetch_data(&symbol, &start, &output).await,
        Commands::Daily => commands::run_daily(&config).await,
        Commands::Daemon => commands::daemon(&config).await,
    }
}
