//! CLI definition and dispatch.

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{self as backtest_engine, fetch_table};
use crate::domain::config_validation::BacktestRequest;
use crate::domain::error::BacktestError;
use crate::domain::indicator::IndicatorEvaluator;
use crate::domain::report::StrategyReport;
use crate::domain::rule::TradingSystemRule;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Parser, Debug)]
#[command(name = "tilebacktest", about = "Rule-based trading strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Read `<SYMBOL>.csv` files from this directory
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Override `[ticker] symbol`
        #[arg(long)]
        ticker: Option<String>,
        /// Write the full report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration and print the rule tree
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List the indicators rules may reference
    Indicators,
    /// List symbols available in the data source
    Symbols {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Copy every CSV price file in a directory into a SQLite database
    #[cfg(feature = "sqlite")]
    Import {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        db: PathBuf,
    },
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            data_dir,
            ticker,
            output,
        } => backtest(&config, data_dir.as_deref(), ticker.as_deref(), output.as_deref())
            .map(|report| print!("{}", report.summary())),
        Command::Validate { config } => validate(&config).map(|text| print!("{}", text)),
        Command::Indicators => {
            print!("{}", indicator_listing(&IndicatorEvaluator::with_defaults()));
            Ok(())
        }
        Command::Symbols { config, data_dir } => {
            symbols(config.as_deref(), data_dir.as_deref()).map(|symbols| {
                for symbol in &symbols {
                    println!("{}", symbol);
                }
                eprintln!("{} symbols found", symbols.len());
            })
        }
        #[cfg(feature = "sqlite")]
        Command::Import { data_dir, db } => import(&data_dir, &db)
            .map(|rows| eprintln!("Imported {} rows into {}", rows, db.display())),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(&e),
    }
}

fn report_error(err: &BacktestError) -> ExitCode {
    match err {
        BacktestError::RuleParse {
            location,
            input,
            source,
        } => {
            eprintln!("error: invalid rule {}", location);
            eprintln!("{}", source.display_with_context(input));
        }
        other => eprintln!("error: {other}"),
    }
    err.into()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, BacktestError> {
    FileConfigAdapter::from_file(path).map_err(|e| BacktestError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Pick the market-data source: an explicit directory wins, then a
/// configured `[sqlite] path`, then the configured or default CSV directory.
pub fn open_data_source(
    config: &dyn ConfigPort,
    data_dir: Option<&Path>,
    configured_dir: Option<&str>,
) -> Result<Box<dyn DataPort>, BacktestError> {
    if let Some(dir) = data_dir {
        return Ok(Box::new(CsvAdapter::new(dir.to_path_buf())));
    }

    #[cfg(feature = "sqlite")]
    {
        if config.get_string("sqlite", "path").is_some() {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            return Ok(Box::new(SqliteAdapter::from_config(config)?));
        }
    }
    #[cfg(not(feature = "sqlite"))]
    let _ = config;

    let dir = configured_dir.unwrap_or(DEFAULT_DATA_DIR);
    Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
}

pub fn backtest(
    config_path: &Path,
    data_dir: Option<&Path>,
    ticker: Option<&str>,
    output: Option<&Path>,
) -> Result<StrategyReport, BacktestError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let mut request = BacktestRequest::from_config(&config, today())?;
    if let Some(symbol) = ticker {
        request.ticker.symbol = symbol.to_uppercase();
    }

    let data = open_data_source(&config, data_dir, request.data_dir.as_deref())?;
    eprintln!(
        "Fetching {} from {} to {}",
        request.ticker.symbol, request.ticker.start, request.ticker.end
    );
    let mut table = fetch_table(&*data, &request.ticker)?;

    let evaluator = IndicatorEvaluator::with_defaults();
    eprintln!("Running backtest over {} rows", table.len());
    let strategy = backtest_engine::run(
        &mut table,
        &request.rules,
        &request.portfolio,
        &evaluator,
    )?;
    let report = StrategyReport::from_strategy(&request.ticker.symbol, &strategy)?;

    if let Some(path) = output {
        JsonReportAdapter::new().write(&report, &path.to_string_lossy())?;
        eprintln!("Report written to {}", path.display());
    }
    Ok(report)
}

/// Check the whole configuration without reading market data.
pub fn validate(config_path: &Path) -> Result<String, BacktestError> {
    eprintln!("Validating {}", config_path.display());
    let config = load_config(config_path)?;
    let request = BacktestRequest::from_config(&config, today())?;
    let rules = TradingSystemRule::build(&request.rules)?;
    rules.check_indicators(&IndicatorEvaluator::with_defaults())?;

    let portfolio = &request.portfolio;
    let mut out = String::new();
    out.push_str(&format!(
        "ticker: {} from {} to {}\n",
        request.ticker.symbol, request.ticker.start, request.ticker.end
    ));
    out.push_str(&format!(
        "portfolio: {} starting, size {}, take profit {}, stop loss {}\n",
        portfolio.starting_amount,
        portfolio.trade_size,
        portfolio.targets.take_profit,
        portfolio.targets.stop_loss
    ));
    out.push_str(&rules.to_string());
    Ok(out)
}

pub fn indicator_listing(evaluator: &IndicatorEvaluator) -> String {
    let mut out = String::new();
    for name in evaluator.names() {
        match evaluator.get(name) {
            Some(indicator) if !indicator.required.is_empty() => {
                out.push_str(&format!("{}({})\n", name, indicator.required.join(", ")));
            }
            _ => out.push_str(&format!("{}\n", name)),
        }
    }
    out
}

pub fn symbols(
    config_path: Option<&Path>,
    data_dir: Option<&Path>,
) -> Result<Vec<String>, BacktestError> {
    let data: Box<dyn DataPort> = match config_path {
        Some(path) => {
            let config = load_config(path)?;
            let configured = config.get_string("ticker", "data_dir");
            open_data_source(&config, data_dir, configured.as_deref())?
        }
        None => Box::new(CsvAdapter::new(
            data_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
        )),
    };
    data.list_symbols()
}

/// Returns the number of rows written.
#[cfg(feature = "sqlite")]
pub fn import(data_dir: &Path, db: &Path) -> Result<usize, BacktestError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let source = CsvAdapter::new(data_dir.to_path_buf());
    let store = SqliteAdapter::open(&db.to_string_lossy(), 1)?;
    store.initialize_schema()?;

    let mut total = 0;
    for symbol in source.list_symbols()? {
        let bars = source.fetch_prices(&symbol, NaiveDate::MIN, NaiveDate::MAX)?;
        let written = store.insert_bars(&symbol, &bars)?;
        eprintln!("  {}: {} rows", symbol, written);
        total += written;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_backtest_arguments() {
        let cli = Cli::try_parse_from([
            "tilebacktest",
            "backtest",
            "--config",
            "run.ini",
            "--ticker",
            "msft",
            "-o",
            "out.json",
        ])
        .unwrap();
        match cli.command {
            Command::Backtest {
                config,
                data_dir,
                ticker,
                output,
            } => {
                assert_eq!(config, PathBuf::from("run.ini"));
                assert!(data_dir.is_none());
                assert_eq!(ticker.as_deref(), Some("msft"));
                assert_eq!(output, Some(PathBuf::from("out.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn backtest_requires_config() {
        assert!(Cli::try_parse_from(["tilebacktest", "backtest"]).is_err());
    }

    #[test]
    fn indicator_listing_shows_required_parameters() {
        let text = indicator_listing(&IndicatorEvaluator::with_defaults());
        assert!(text.contains("SMA(timeperiod)\n"));
        assert!(text.contains("CLOSE\n"));
    }

    #[test]
    fn missing_config_file_is_config_error() {
        let err = load_config(Path::new("/nonexistent/run.ini")).err().unwrap();
        assert!(matches!(err, BacktestError::ConfigParse { .. }));
    }
}
