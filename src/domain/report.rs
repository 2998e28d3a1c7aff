//! Presentation records built from a finished [`Strategy`].

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::error::BacktestError;
use crate::domain::strategy::Strategy;
use crate::domain::trade::{Direction, Trade, TradeResult};
use crate::domain::trading_period::PeriodResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeReport {
    pub id: usize,
    pub direction: Direction,
    pub starting_portfolio_amount: f64,
    pub exit_portfolio_amount: f64,
    pub entry_amount: f64,
    pub exit_amount: f64,
    pub percentage_return: f64,
    pub absolute_return: f64,
    pub result: TradeResult,
    pub signal_date: NaiveDate,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub periods: usize,
    pub exit_reason: PeriodResult,
    pub entry_period_open: f64,
    pub exit_period_close: f64,
    pub exit_period_high: f64,
    pub exit_period_low: f64,
    pub closed_at_end_of_data: bool,
}

impl TradeReport {
    /// Fails for a trade that never advanced or cannot be classified.
    pub fn from_trade(trade: &Trade) -> Result<Self, BacktestError> {
        let (first, last) = match (trade.first_period(), trade.last_period()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(BacktestError::ShapeMismatch {
                    context: format!("periods of trade {}", trade.id),
                    expected: 1,
                    actual: 0,
                })
            }
        };
        Ok(TradeReport {
            id: trade.id,
            direction: trade.direction,
            starting_portfolio_amount: trade.starting_portfolio_amount,
            exit_portfolio_amount: trade.exit_portfolio_amount(),
            entry_amount: trade.entry_amount,
            exit_amount: trade.exit_amount(),
            percentage_return: trade.percentage_return(),
            absolute_return: trade.absolute_return(),
            result: trade.result()?,
            signal_date: trade.signal_date,
            entry_date: first.date,
            exit_date: last.date,
            periods: trade.periods().len(),
            exit_reason: last.result,
            entry_period_open: first.open,
            exit_period_close: last.close,
            exit_period_high: last.high,
            exit_period_low: last.low,
            closed_at_end_of_data: trade.closed_at_end_of_data(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyReport {
    pub ticker: String,
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub percentage_return: f64,
    pub absolute_return: f64,
    pub starting_amount: f64,
    pub current_amount: f64,
    pub trades: Vec<TradeReport>,
}

impl StrategyReport {
    pub fn from_strategy(ticker: &str, strategy: &Strategy) -> Result<Self, BacktestError> {
        let trades = strategy
            .trade_history()
            .iter()
            .map(TradeReport::from_trade)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StrategyReport {
            ticker: ticker.to_string(),
            trade_count: strategy.trades,
            wins: strategy.wins,
            losses: strategy.losses,
            win_rate: strategy.win_rate(),
            percentage_return: strategy.percentage_return(),
            absolute_return: strategy.absolute_return(),
            starting_amount: strategy.starting_amount,
            current_amount: strategy.current_amount,
            trades,
        })
    }

    /// Plain-text summary followed by one line per trade.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Ticker:            {}\n", self.ticker));
        out.push_str(&format!("Trades:            {}\n", self.trade_count));
        out.push_str(&format!("Wins / losses:     {} / {}\n", self.wins, self.losses));
        out.push_str(&format!("Win rate:          {:.2}%\n", self.win_rate * 100.0));
        out.push_str(&format!("Starting amount:   {:.2}\n", self.starting_amount));
        out.push_str(&format!("Final amount:      {:.2}\n", self.current_amount));
        out.push_str(&format!("Absolute return:   {:.2}\n", self.absolute_return));
        out.push_str(&format!(
            "Percentage return: {:.3}%\n",
            self.percentage_return * 100.0
        ));
        if !self.trades.is_empty() {
            out.push('\n');
            out.push_str(&format!(
                "{:>4} {:<5} {:<10} {:<10} {:>12} {:>12} {:<4} {}\n",
                "id", "dir", "entry", "exit", "entry_amt", "exit_amt", "res", "reason"
            ));
            for t in &self.trades {
                out.push_str(&format!(
                    "{:>4} {:<5} {:<10} {:<10} {:>12.2} {:>12.2} {:<4} {}{}\n",
                    t.id,
                    t.direction.to_string(),
                    t.entry_date,
                    t.exit_date,
                    t.entry_amount,
                    t.exit_amount,
                    t.result.to_string(),
                    t.exit_reason,
                    if t.closed_at_end_of_data { " (end of data)" } else { "" }
                ));
            }
        }
        out
    }
}
