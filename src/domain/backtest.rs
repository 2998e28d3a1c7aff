//! Backtest orchestrator.
//!
//! Walks the signal column forward. An unconsumed ENTRY or EXIT opens a
//! trade whose first period is the following row; the trade advances one
//! row at a time until a period is terminal or the data runs out. Every
//! CONTINUE period is marked consumed so no second trade opens inside an
//! open trade's span. The terminal row stays available, which lets an
//! opposing signal close one trade and open the reverse trade.

use tracing::{debug, info};

use crate::domain::config_validation::TickerRequest;
use crate::domain::error::BacktestError;
use crate::domain::indicator::IndicatorEvaluator;
use crate::domain::price_table::PriceTable;
use crate::domain::rule::TradingSystemRule;
use crate::domain::rule_spec::TradingSystemSpec;
use crate::domain::strategy::{PortfolioConfig, Strategy};
use crate::domain::trade::Direction;
use crate::ports::data_port::DataPort;

/// Fetch the requested range and build the price table.
pub fn fetch_table(
    data: &dyn DataPort,
    request: &TickerRequest,
) -> Result<PriceTable, BacktestError> {
    let bars = data.fetch_prices(&request.symbol, request.start, request.end)?;
    if bars.is_empty() {
        return Err(BacktestError::NoData {
            ticker: request.symbol.clone(),
            start: request.start.to_string(),
            end: request.end.to_string(),
        });
    }
    let table = PriceTable::new(bars)?;
    info!(
        ticker = %request.symbol,
        rows = table.len(),
        first = ?table.first_date(),
        last = ?table.last_date(),
        "price data loaded"
    );
    Ok(table)
}

/// Simulate trades over a table whose signal column is already written.
pub fn run_backtest(
    table: &PriceTable,
    config: &PortfolioConfig,
) -> Result<Strategy, BacktestError> {
    let rows = table.rows();
    let mut strategy = Strategy::new(config);
    let mut consumed = vec![false; rows.len()];

    for (index, row) in rows.iter().enumerate() {
        if consumed[index] {
            continue;
        }
        let Some(direction) = Direction::from_signal(row.signal) else {
            continue;
        };
        if index + 1 >= rows.len() {
            debug!(index, signal = %row.signal, "signal on final row, no trade opened");
            continue;
        }

        let mut trade = strategy.open_trade(direction, index, row.date());
        debug!(
            trade = trade.id,
            %direction,
            date = %row.date(),
            entry_amount = trade.entry_amount,
            "trade opened"
        );

        for (period_index, period_row) in rows.iter().enumerate().skip(index + 1) {
            let result = trade.advance(period_index, period_row);
            debug!(
                trade = trade.id,
                period = period_index,
                %result,
                multiplier = trade.multiplier(),
                "period evaluated"
            );
            if result.is_terminal() {
                break;
            }
            consumed[period_index] = true;
        }

        if !trade.is_closed() {
            trade.close_at_end_of_data();
            debug!(trade = trade.id, "trade closed at end of data");
        }
        strategy.record_trade(trade)?;
    }

    Ok(strategy)
}

/// Build the rule tree, write the signal column and simulate.
///
/// Unknown indicators and missing parameters fail before any indicator is
/// computed.
pub fn run(
    table: &mut PriceTable,
    spec: &TradingSystemSpec,
    portfolio: &PortfolioConfig,
    evaluator: &IndicatorEvaluator,
) -> Result<Strategy, BacktestError> {
    let mut rules = TradingSystemRule::build(spec)?;
    rules.check_indicators(evaluator)?;
    rules.apply(evaluator, table)?;

    let strategy = run_backtest(table, portfolio)?;
    info!(
        rows = table.len(),
        trades = strategy.trades,
        wins = strategy.wins,
        losses = strategy.losses,
        win_rate = strategy.win_rate(),
        percentage_return = strategy.percentage_return(),
        "backtest complete"
    );
    Ok(strategy)
}
