//! Trade lifecycle.
//!
//! An ENTRY signal opens a long trade and an EXIT signal opens a short one.
//! The trade accumulates [`TradingPeriod`]s until one is terminal, then it is
//! closed and read-only.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::domain::error::BacktestError;
use crate::domain::price_table::{PriceRow, Signal};
use crate::domain::trading_period::{PeriodResult, TradingPeriod};

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn from_signal(signal: Signal) -> Option<Direction> {
        match signal {
            Signal::Entry => Some(Direction::Long),
            Signal::Exit => Some(Direction::Short),
            Signal::None => None,
        }
    }

    /// The signal that closes a trade in this direction.
    pub fn opposing_signal(self) -> Signal {
        match self {
            Direction::Long => Signal::Exit,
            Direction::Short => Signal::Entry,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// How much of the portfolio a trade commits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TradeSize {
    /// Fixed currency amount.
    Static(f64),
    /// Fraction of the current portfolio amount.
    Dynamic(f64),
}

impl TradeSize {
    pub fn entry_amount(&self, portfolio_amount: f64) -> f64 {
        let amount = match self {
            TradeSize::Static(value) => *value,
            TradeSize::Dynamic(fraction) => fraction * portfolio_amount,
        };
        round_to(amount, 4)
    }
}

impl fmt::Display for TradeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSize::Static(value) => write!(f, "STATIC {}", value),
            TradeSize::Dynamic(fraction) => write!(f, "DYNAMIC {}", fraction),
        }
    }
}

/// Take-profit (> 0) and stop-loss (< 0) as return fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeTargets {
    pub take_profit: f64,
    pub stop_loss: f64,
}

/// Upper and lower cumulative-return multipliers that end a trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub upper: f64,
    pub lower: f64,
}

impl Thresholds {
    pub fn new(direction: Direction, targets: &TradeTargets) -> Self {
        match direction {
            Direction::Long => Thresholds {
                upper: 1.0 + targets.take_profit,
                lower: 1.0 + targets.stop_loss,
            },
            Direction::Short => Thresholds {
                upper: 1.0 - targets.stop_loss,
                lower: 1.0 - targets.take_profit,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeResult {
    Win,
    Loss,
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeResult::Win => write!(f, "WIN"),
            TradeResult::Loss => write!(f, "LOSS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub id: usize,
    pub direction: Direction,
    pub signal_index: usize,
    pub signal_date: NaiveDate,
    pub starting_portfolio_amount: f64,
    pub entry_amount: f64,
    pub thresholds: Thresholds,
    periods: Vec<TradingPeriod>,
    multiplier: f64,
    closed: bool,
    closed_at_end_of_data: bool,
}

impl Trade {
    pub fn open(
        id: usize,
        direction: Direction,
        signal_index: usize,
        signal_date: NaiveDate,
        portfolio_amount: f64,
        size: &TradeSize,
        targets: &TradeTargets,
    ) -> Self {
        Trade {
            id,
            direction,
            signal_index,
            signal_date,
            starting_portfolio_amount: portfolio_amount,
            entry_amount: size.entry_amount(portfolio_amount),
            thresholds: Thresholds::new(direction, targets),
            periods: Vec::new(),
            multiplier: 1.0,
            closed: false,
            closed_at_end_of_data: false,
        }
    }

    /// Append the period for `row` and return its result. A closed trade is
    /// left untouched and reports its final result.
    pub fn advance(&mut self, index: usize, row: &PriceRow) -> PeriodResult {
        if self.closed {
            return self.exit_reason();
        }
        let period = TradingPeriod::new(
            index,
            row,
            self.multiplier,
            self.direction,
            &self.thresholds,
            self.periods.is_empty(),
        );
        let result = period.result;
        self.multiplier = period.outgoing;
        self.periods.push(period);
        if result.is_terminal() {
            self.closed = true;
        }
        result
    }

    /// Close a trade the data ran out on, at its cumulative return.
    pub fn close_at_end_of_data(&mut self) {
        if !self.closed {
            self.closed = true;
            self.closed_at_end_of_data = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn closed_at_end_of_data(&self) -> bool {
        self.closed_at_end_of_data
    }

    pub fn periods(&self) -> &[TradingPeriod] {
        &self.periods
    }

    pub fn first_period(&self) -> Option<&TradingPeriod> {
        self.periods.first()
    }

    pub fn last_period(&self) -> Option<&TradingPeriod> {
        self.periods.last()
    }

    /// Cumulative return multiplier of the underlying price.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn exit_reason(&self) -> PeriodResult {
        self.last_period()
            .map(|p| p.result)
            .unwrap_or(PeriodResult::Continue)
    }

    pub fn exit_amount(&self) -> f64 {
        let amount = match self.direction {
            Direction::Long => self.entry_amount * self.multiplier,
            Direction::Short => self.entry_amount * (2.0 - self.multiplier),
        };
        round_to(amount, 4)
    }

    pub fn exit_portfolio_amount(&self) -> f64 {
        round_to(
            self.starting_portfolio_amount - self.entry_amount + self.exit_amount(),
            4,
        )
    }

    pub fn absolute_return(&self) -> f64 {
        round_to(self.exit_amount() - self.entry_amount, 4)
    }

    /// Return on the committed amount, as a fraction.
    pub fn percentage_return(&self) -> f64 {
        if self.entry_amount == 0.0 {
            return 0.0;
        }
        round_to(self.exit_amount() / self.entry_amount - 1.0, 5)
    }

    /// WIN or LOSS. A trade that exits at exactly its entry amount cannot be
    /// classified and is an error.
    pub fn result(&self) -> Result<TradeResult, BacktestError> {
        let exit = self.exit_amount();
        if exit > self.entry_amount {
            Ok(TradeResult::Win)
        } else if exit < self.entry_amount {
            Ok(TradeResult::Loss)
        } else {
            Err(BacktestError::UndeterminedTradeResult {
                trade_id: self.id,
                entry_amount: self.entry_amount,
                exit_amount: exit,
            })
        }
    }
}
