//! CSV file data adapter.
//!
//! One file per ticker, `<base_path>/<SYMBOL>.csv`, with a header naming at
//! least `date,open,high,low,close`. Other columns are ignored.

use crate::domain::error::BacktestError;
use crate::domain::price_table::PriceBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker.to_uppercase()))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, BacktestError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| BacktestError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| BacktestError::DataSource {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
                BacktestError::DataSource {
                    reason: format!(
                        "{}: invalid date {:?} on data row {}: {}",
                        path.display(),
                        row.date,
                        line + 1,
                        e
                    ),
                }
            })?;

            if date < start || date > end {
                continue;
            }

            bars.push(PriceBar {
                date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| BacktestError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BacktestError::DataSource {
                reason: format!("directory entry error: {}", e),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                symbols.push(stem.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
