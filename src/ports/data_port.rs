//! Market data access port trait.

use crate::domain::error::BacktestError;
use crate::domain::price_table::PriceBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `ticker` with `start <= date <= end`, sorted by date.
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, BacktestError>;

    /// Tickers this source holds data for, sorted.
    fn list_symbols(&self) -> Result<Vec<String>, BacktestError>;
}
