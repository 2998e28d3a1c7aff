#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::Write;
use tilebacktest::domain::error::BacktestError;
pub use tilebacktest::domain::price_table::PriceBar;
use tilebacktest::domain::price_table::{PriceTable, Signal};
use tilebacktest::domain::rule_parser;
use tilebacktest::domain::rule_spec::{GroupSpec, OrderTypeSpec, RuleSpec, TradingSystemSpec};
use tilebacktest::domain::strategy::PortfolioConfig;
use tilebacktest::domain::trade::{TradeSize, TradeTargets};
use tilebacktest::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, BacktestError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(BacktestError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start && b.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Bars on consecutive days from 2024-01-01, each `(open, high, low, close)`.
pub fn bars(rows: &[(f64, f64, f64, f64)]) -> Vec<PriceBar> {
    rows.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| PriceBar {
            date: date(2024, 1, 1) + chrono::Duration::days(i as i64),
            open,
            high,
            low,
            close,
        })
        .collect()
}

pub fn table_with_signals(
    rows: &[(f64, f64, f64, f64)],
    signals: &[(usize, Signal)],
) -> PriceTable {
    let mut table = PriceTable::new(bars(rows)).unwrap();
    for &(index, signal) in signals {
        table.set_signal(index, signal);
    }
    table
}

/// Bars whose open is the previous close and whose range brackets the body.
pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
    let mut previous = closes.first().copied().unwrap_or(100.0);
    let rows: Vec<(f64, f64, f64, f64)> = closes
        .iter()
        .map(|&close| {
            let open = previous;
            previous = close;
            (open, open.max(close) + 0.5, open.min(close) - 0.5, close)
        })
        .collect();
    bars(&rows)
}

pub fn wave_closes(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 100.0 + 8.0 * (i as f64 * 0.4).sin() + i as f64 * 0.2)
        .collect()
}

pub fn portfolio(size: TradeSize, take_profit: f64, stop_loss: f64) -> PortfolioConfig {
    PortfolioConfig {
        starting_amount: 10_000.0,
        trade_size: size,
        targets: TradeTargets {
            take_profit,
            stop_loss,
        },
    }
}

/// One group per direction, one rule per group.
pub fn single_rule_spec(entry: Option<&str>, exit: Option<&str>) -> TradingSystemSpec {
    let order_type = |text: Option<&str>| OrderTypeSpec {
        groups: text
            .map(|t| {
                vec![GroupSpec {
                    id: "main".to_string(),
                    rules: vec![RuleSpec {
                        id: "rule".to_string(),
                        comparison: rule_parser::parse(t).unwrap(),
                    }],
                }]
            })
            .unwrap_or_default(),
    };
    TradingSystemSpec {
        entry: order_type(entry),
        exit: order_type(exit),
    }
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn write_csv(dir: &std::path::Path, symbol: &str, bars: &[PriceBar]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},1000\n",
            b.date.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close
        ));
    }
    std::fs::write(dir.join(format!("{}.csv", symbol)), content).unwrap();
}
