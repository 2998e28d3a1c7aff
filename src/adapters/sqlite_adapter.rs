//! SQLite price store.
//!
//! Daily bars live in one `prices` table keyed by `(symbol, date)`, dates
//! stored as `YYYY-MM-DD` text so range filters compare lexically.

use crate::domain::error::BacktestError;
use crate::domain::price_table::PriceBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::fmt::Display;

fn source_error(e: impl Display) -> BacktestError {
    BacktestError::DataSource {
        reason: e.to_string(),
    }
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    /// Open the database named by `[sqlite] path`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BacktestError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| BacktestError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;
        let pool_size = u32::try_from(config.get_int("sqlite", "pool_size", 4))
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| BacktestError::ConfigInvalid {
                section: "sqlite".into(),
                key: "pool_size".into(),
                reason: "must be a positive integer".into(),
            })?;
        Self::open(&db_path, pool_size)
    }

    pub fn open(path: &str, pool_size: u32) -> Result<Self, BacktestError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(source_error)?;
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, BacktestError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(source_error)?;
        Ok(Self { pool })
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, BacktestError> {
        self.pool.get().map_err(source_error)
    }

    pub fn initialize_schema(&self) -> Result<(), BacktestError> {
        self.connection()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS prices (
                    symbol TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    PRIMARY KEY (symbol, date)
                );",
            )
            .map_err(source_error)
    }

    /// Insert or replace bars for one symbol in a single transaction.
    pub fn insert_bars(&self, symbol: &str, bars: &[PriceBar]) -> Result<usize, BacktestError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(source_error)?;
        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO prices (symbol, date, open, high, low, close)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    symbol.to_uppercase(),
                    bar.date.format("%Y-%m-%d").to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close
                ],
            )
            .map_err(source_error)?;
        }
        tx.commit().map_err(source_error)?;
        Ok(bars.len())
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, BacktestError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close
                 FROM prices
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(source_error)?;

        let rows = stmt
            .query_map(
                params![
                    ticker.to_uppercase(),
                    start.format("%Y-%m-%d").to_string(),
                    end.format("%Y-%m-%d").to_string()
                ],
                |row| {
                    let date_str: String = row.get(0)?;
                    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            0,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                    Ok(PriceBar {
                        date,
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                    })
                },
            )
            .map_err(source_error)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(source_error)
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM prices ORDER BY symbol")
            .map_err(source_error)?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(source_error)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(source_error)
    }
}
