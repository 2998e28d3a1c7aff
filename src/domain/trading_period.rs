//! One step of an open trade.
//!
//! A period compares the trade's cumulative return multiplier against the
//! thresholds, using the row's high for the upper test and its low for the
//! lower test. The first period of a trade measures from the row's open
//! (same-day returns); later periods measure from the previous close.
//!
//! Result priority is fixed: upper threshold, lower threshold, opposing
//! signal, continue. A breached threshold clamps the outgoing multiplier to
//! the threshold itself.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::domain::price_table::{PriceRow, Signal};
use crate::domain::trade::{Direction, Thresholds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodResult {
    Continue,
    HigherLimit,
    LowerLimit,
    OpposingSignal,
}

impl PeriodResult {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PeriodResult::Continue)
    }
}

impl fmt::Display for PeriodResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeriodResult::Continue => "CONTINUE",
            PeriodResult::HigherLimit => "HIGHER_LIMIT",
            PeriodResult::LowerLimit => "LOWER_LIMIT",
            PeriodResult::OpposingSignal => "OPPOSING_SIGNAL",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradingPeriod {
    pub index: usize,
    pub date: NaiveDate,
    pub is_first: bool,
    pub signal: Signal,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub incoming: f64,
    pub outgoing: f64,
    pub result: PeriodResult,
}

impl TradingPeriod {
    pub fn new(
        index: usize,
        row: &PriceRow,
        incoming: f64,
        direction: Direction,
        thresholds: &Thresholds,
        is_first: bool,
    ) -> Self {
        let r = &row.returns;
        let (high_ret, low_ret, close_ret) = if is_first {
            (r.high_same_day, r.low_same_day, r.close_same_day)
        } else {
            (r.high, r.low, r.close)
        };

        let (result, outgoing) = if incoming * (1.0 + high_ret) >= thresholds.upper {
            (PeriodResult::HigherLimit, thresholds.upper)
        } else if incoming * (1.0 + low_ret) <= thresholds.lower {
            (PeriodResult::LowerLimit, thresholds.lower)
        } else if row.signal == direction.opposing_signal() {
            (PeriodResult::OpposingSignal, incoming * (1.0 + close_ret))
        } else {
            (PeriodResult::Continue, incoming * (1.0 + close_ret))
        };

        TradingPeriod {
            index,
            date: row.bar.date,
            is_first,
            signal: row.signal,
            open: row.bar.open,
            high: row.bar.high,
            low: row.bar.low,
            close: row.bar.close,
            incoming,
            outgoing,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_table::{DerivedReturns, PriceBar};
    use crate::domain::trade::TradeTargets;
    use approx::assert_relative_eq;

    fn row(returns: DerivedReturns, signal: Signal) -> PriceRow {
        PriceRow {
            bar: PriceBar {
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                open: 100.0,
                high: 110.0,
                low: 90.0,
                close: 100.0,
            },
            returns,
            signal,
        }
    }

    fn long_thresholds() -> Thresholds {
        Thresholds::new(
            Direction::Long,
            &TradeTargets {
                take_profit: 0.10,
                stop_loss: -0.10,
            },
        )
    }

    fn long_period(
        index: usize,
        returns: DerivedReturns,
        signal: Signal,
        incoming: f64,
        first: bool,
    ) -> TradingPeriod {
        let thresholds = long_thresholds();
        TradingPeriod::new(
            index,
            &row(returns, signal),
            incoming,
            Direction::Long,
            &thresholds,
            first,
        )
    }

    #[test]
    fn continue_compounds_close_return() {
        let returns = DerivedReturns {
            close: 0.02,
            high: 0.03,
            low: -0.01,
            ..Default::default()
        };
        let p = long_period(4, returns, Signal::None, 1.05, false);
        assert_eq!(p.result, PeriodResult::Continue);
        assert_relative_eq!(p.outgoing, 1.05 * 1.02);
        assert_eq!(p.index, 4);
    }

    #[test]
    fn first_period_uses_same_day_returns() {
        let returns = DerivedReturns {
            high_same_day: 0.12,
            high: 0.0,
            ..Default::default()
        };
        let first = long_period(1, returns, Signal::None, 1.0, true);
        assert_eq!(first.result, PeriodResult::HigherLimit);
        let later = long_period(1, returns, Signal::None, 1.0, false);
        assert_eq!(later.result, PeriodResult::Continue);
    }

    #[test]
    fn breach_clamps_to_threshold() {
        let returns = DerivedReturns {
            low: -0.20,
            close: -0.05,
            ..Default::default()
        };
        let p = long_period(2, returns, Signal::None, 1.0, false);
        assert_eq!(p.result, PeriodResult::LowerLimit);
        assert_relative_eq!(p.outgoing, 0.9);
    }

    #[test]
    fn upper_beats_lower_when_both_breach() {
        let returns = DerivedReturns {
            high: 0.15,
            low: -0.15,
            ..Default::default()
        };
        let p = long_period(2, returns, Signal::None, 1.0, false);
        assert_eq!(p.result, PeriodResult::HigherLimit);
    }

    #[test]
    fn threshold_beats_opposing_signal() {
        let returns = DerivedReturns {
            low: -0.12,
            ..Default::default()
        };
        let p = long_period(2, returns, Signal::Exit, 1.0, false);
        assert_eq!(p.result, PeriodResult::LowerLimit);
    }

    #[test]
    fn opposing_signal_closes_at_close() {
        let returns = DerivedReturns {
            close: 0.01,
            ..Default::default()
        };
        let p = long_period(2, returns, Signal::Exit, 1.0, false);
        assert_eq!(p.result, PeriodResult::OpposingSignal);
        assert_relative_eq!(p.outgoing, 1.01);

        let same = long_period(2, returns, Signal::Entry, 1.0, false);
        assert_eq!(same.result, PeriodResult::Continue);
    }

    #[test]
    fn exact_threshold_touch_counts_as_breach() {
        let returns = DerivedReturns {
            high: 0.0,
            ..Default::default()
        };
        let p = long_period(2, returns, Signal::None, 1.1, false);
        assert_eq!(p.result, PeriodResult::HigherLimit);
    }
}
