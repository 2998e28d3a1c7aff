//! Portfolio configuration and the per-run strategy aggregate.

use tracing::debug;

use crate::domain::error::BacktestError;
use crate::domain::trade::{round_to, Direction, Trade, TradeResult, TradeSize, TradeTargets};

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioConfig {
    pub starting_amount: f64,
    pub trade_size: TradeSize,
    pub targets: TradeTargets,
}

/// Running totals for one backtest. `current_amount` changes only when a
/// trade is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub starting_amount: f64,
    pub current_amount: f64,
    pub trade_size: TradeSize,
    pub targets: TradeTargets,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    history: Vec<Trade>,
}

impl Strategy {
    pub fn new(config: &PortfolioConfig) -> Self {
        Strategy {
            starting_amount: config.starting_amount,
            current_amount: config.starting_amount,
            trade_size: config.trade_size,
            targets: config.targets,
            trades: 0,
            wins: 0,
            losses: 0,
            history: Vec::new(),
        }
    }

    /// Open a trade sized from the current portfolio amount.
    pub fn open_trade(
        &self,
        direction: Direction,
        signal_index: usize,
        signal_date: NaiveDate,
    ) -> Trade {
        Trade::open(
            self.history.len() + 1,
            direction,
            signal_index,
            signal_date,
            self.current_amount,
            &self.trade_size,
            &self.targets,
        )
    }

    /// Classify a closed trade, compound the portfolio and keep the trade.
    pub fn record_trade(&mut self, trade: Trade) -> Result<TradeResult, BacktestError> {
        let result = trade.result()?;
        match result {
            TradeResult::Win => self.wins += 1,
            TradeResult::Loss => self.losses += 1,
        }
        self.trades += 1;
        self.current_amount = trade.exit_portfolio_amount();
        debug!(
            trade = trade.id,
            %result,
            exit_amount = trade.exit_amount(),
            portfolio = self.current_amount,
            "trade recorded"
        );
        self.history.push(trade);
        Ok(result)
    }

    pub fn trade_history(&self) -> &[Trade] {
        &self.history
    }

    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            return 0.0;
        }
        round_to(self.wins as f64 / self.trades as f64, 5)
    }

    pub fn absolute_return(&self) -> f64 {
        round_to(self.current_amount - self.starting_amount, 4)
    }

    pub fn percentage_return(&self) -> f64 {
        if self.starting_amount == 0.0 {
            return 0.0;
        }
        round_to(
            (self.current_amount - self.starting_amount) / self.starting_amount,
            5,
        )
    }
}
