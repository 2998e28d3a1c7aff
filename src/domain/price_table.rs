//! Price table: raw bars plus derived return columns and the signal column.
//!
//! Derived returns are computed once at construction. Same-day returns are
//! measured from the row's open, prior-close returns from the previous row's
//! close. Any NaN or infinite ratio (row 0, zero prices) is stored as `0.0`.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use super::error::BacktestError;

/// One raw OHLC bar as delivered by the market-data collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Per-period categorical signal derived from the rule tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Entry,
    Exit,
    None,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Entry => write!(f, "ENTRY"),
            Signal::Exit => write!(f, "EXIT"),
            Signal::None => write!(f, "NONE"),
        }
    }
}

/// Return ratios for one row, as fractions (0.05 = +5%).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DerivedReturns {
    pub close_same_day: f64,
    pub high_same_day: f64,
    pub low_same_day: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub bar: PriceBar,
    pub returns: DerivedReturns,
    pub signal: Signal,
}

impl PriceRow {
    pub fn date(&self) -> NaiveDate {
        self.bar.date
    }
}

/// Raw price columns handed to indicator functions.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    rows: Vec<PriceRow>,
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

fn ratio(to: f64, from: f64) -> f64 {
    finite_or_zero((to - from) / from)
}

impl PriceTable {
    /// Validate the bars and compute the derived return columns.
    pub fn new(bars: Vec<PriceBar>) -> Result<Self, BacktestError> {
        if bars.is_empty() {
            return Err(BacktestError::EmptyPriceTable);
        }

        for (i, bar) in bars.iter().enumerate() {
            let prices = [bar.open, bar.high, bar.low, bar.close];
            if prices.iter().any(|p| !p.is_finite()) {
                return Err(BacktestError::MalformedPriceTable {
                    row: i,
                    reason: format!("non-finite price on {}", bar.date),
                });
            }
            if bar.high < bar.low {
                return Err(BacktestError::MalformedPriceTable {
                    row: i,
                    reason: format!("high {} below low {} on {}", bar.high, bar.low, bar.date),
                });
            }
            if i > 0 && bar.date <= bars[i - 1].date {
                return Err(BacktestError::MalformedPriceTable {
                    row: i,
                    reason: format!(
                        "date {} does not follow {}",
                        bar.date,
                        bars[i - 1].date
                    ),
                });
            }
        }

        let mut rows = Vec::with_capacity(bars.len());
        let mut previous_close: Option<f64> = None;
        for bar in bars {
            let returns = match previous_close {
                Some(pc) => DerivedReturns {
                    close_same_day: ratio(bar.close, bar.open),
                    high_same_day: ratio(bar.high, bar.open),
                    low_same_day: ratio(bar.low, bar.open),
                    close: ratio(bar.close, pc),
                    high: ratio(bar.high, pc),
                    low: ratio(bar.low, pc),
                },
                None => DerivedReturns {
                    close_same_day: ratio(bar.close, bar.open),
                    high_same_day: ratio(bar.high, bar.open),
                    low_same_day: ratio(bar.low, bar.open),
                    ..Default::default()
                },
            };
            previous_close = Some(bar.close);
            rows.push(PriceRow {
                bar,
                returns,
                signal: Signal::None,
            });
        }

        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.rows.iter().map(|r| r.signal).collect()
    }

    pub fn set_signal(&mut self, index: usize, signal: Signal) {
        if let Some(row) = self.rows.get_mut(index) {
            row.signal = signal;
        }
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(PriceRow::date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(PriceRow::date)
    }

    pub fn price_series(&self) -> PriceSeries {
        PriceSeries {
            open: self.rows.iter().map(|r| r.bar.open).collect(),
            high: self.rows.iter().map(|r| r.bar.high).collect(),
            low: self.rows.iter().map(|r| r.bar.low).collect(),
            close: self.rows.iter().map(|r| r.bar.close).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bar(day: u32, open: f64, high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open,
            high,
            low,
            close,
        }
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(matches!(
            PriceTable::new(vec![]),
            Err(BacktestError::EmptyPriceTable)
        ));
    }

    #[test]
    fn dates_must_strictly_increase() {
        let result = PriceTable::new(vec![
            bar(2, 10.0, 11.0, 9.0, 10.0),
            bar(2, 10.0, 11.0, 9.0, 10.0),
        ]);
        assert!(matches!(
            result,
            Err(BacktestError::MalformedPriceTable { row: 1, .. })
        ));
    }

    #[test]
    fn non_finite_price_is_rejected() {
        let result = PriceTable::new(vec![bar(1, 10.0, f64::NAN, 9.0, 10.0)]);
        assert!(matches!(
            result,
            Err(BacktestError::MalformedPriceTable { row: 0, .. })
        ));
    }

    #[test]
    fn high_below_low_is_rejected() {
        let result = PriceTable::new(vec![bar(1, 10.0, 8.0, 9.0, 10.0)]);
        assert!(matches!(
            result,
            Err(BacktestError::MalformedPriceTable { row: 0, .. })
        ));
    }

    #[test]
    fn same_day_returns_use_open() {
        let table = PriceTable::new(vec![bar(1, 100.0, 110.0, 95.0, 105.0)]).unwrap();
        let r = table.rows()[0].returns;
        assert_relative_eq!(r.close_same_day, 0.05);
        assert_relative_eq!(r.high_same_day, 0.10);
        assert_relative_eq!(r.low_same_day, -0.05);
    }

    #[test]
    fn prior_close_returns_zero_on_first_row() {
        let table = PriceTable::new(vec![bar(1, 100.0, 110.0, 95.0, 105.0)]).unwrap();
        let r = table.rows()[0].returns;
        assert_eq!(r.close, 0.0);
        assert_eq!(r.high, 0.0);
        assert_eq!(r.low, 0.0);
    }

    #[test]
    fn prior_close_returns_use_previous_close() {
        let table = PriceTable::new(vec![
            bar(1, 100.0, 101.0, 99.0, 100.0),
            bar(2, 101.0, 120.0, 90.0, 110.0),
        ])
        .unwrap();
        let r = table.rows()[1].returns;
        assert_relative_eq!(r.close, 0.10);
        assert_relative_eq!(r.high, 0.20);
        assert_relative_eq!(r.low, -0.10);
    }

    #[test]
    fn zero_prices_produce_zeroed_returns() {
        let table = PriceTable::new(vec![
            bar(1, 0.0, 0.0, 0.0, 0.0),
            bar(2, 0.0, 5.0, 0.0, 5.0),
        ])
        .unwrap();
        for row in table.rows() {
            let r = row.returns;
            for v in [r.close_same_day, r.high_same_day, r.low_same_day, r.close, r.high, r.low] {
                assert!(v.is_finite());
            }
        }
        assert_eq!(table.rows()[1].returns.close, 0.0);
    }

    #[test]
    fn signal_column_starts_empty() {
        let mut table = PriceTable::new(vec![
            bar(1, 10.0, 11.0, 9.0, 10.0),
            bar(2, 10.0, 11.0, 9.0, 10.0),
        ])
        .unwrap();
        assert_eq!(table.signals(), vec![Signal::None, Signal::None]);
        assert_eq!(table.first_date(), NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(table.last_date(), NaiveDate::from_ymd_opt(2024, 1, 2));
        table.set_signal(1, Signal::Exit);
        assert_eq!(table.signals(), vec![Signal::None, Signal::Exit]);
    }

    #[test]
    fn price_series_extracts_columns() {
        let table = PriceTable::new(vec![
            bar(1, 1.0, 2.0, 0.5, 1.5),
            bar(2, 1.5, 3.0, 1.0, 2.5),
        ])
        .unwrap();
        let series = table.price_series();
        assert_eq!(series.len(), 2);
        assert_eq!(series.close, vec![1.5, 2.5]);
        assert_eq!(series.high, vec![2.0, 3.0]);
    }
}
