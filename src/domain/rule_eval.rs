//! Rule evaluation engine.
//!
//! Evaluates the rule tree over the whole price table at once, producing one
//! [`SignalMask`] per node.
//!
//! # Evaluation Semantics
//!
//! - Comparison rules compare tile values row by row; constants broadcast
//! - `CROSSES_ABOVE`/`CROSSES_BELOW` also read the previous row, which is
//!   `NaN` at row 0, so they never fire there
//! - A group OR-merges each rule's mask as soon as it is evaluated
//! - An order type AND-merges its groups; with no groups it is all-false
//! - Entry wins over exit on the same row

use tracing::debug;

use crate::domain::error::BacktestError;
use crate::domain::indicator::{IndicatorEvaluator, IndicatorRequest};
use crate::domain::mask::SignalMask;
use crate::domain::price_table::{PriceSeries, PriceTable, Signal};
use crate::domain::rule::{GroupRule, OrderTypeRule, Rule, TradingSystemRule};
use crate::domain::tile::{TileArena, TileId, TileView};

fn view_of_len<'a>(
    rule: &Rule,
    arena: &'a TileArena,
    id: TileId,
    len: usize,
) -> Result<TileView<'a>, BacktestError> {
    let view = arena.view(id)?;
    match view.series_len() {
        Some(actual) if actual != len => Err(BacktestError::ShapeMismatch {
            context: format!("tile {} in rule {}", arena.key(id), rule.id),
            expected: len,
            actual,
        }),
        _ => Ok(view),
    }
}

pub fn evaluate_rule(
    rule: &Rule,
    arena: &TileArena,
    len: usize,
) -> Result<SignalMask, BacktestError> {
    let first = view_of_len(rule, arena, rule.first, len)?;
    let second = view_of_len(rule, arena, rule.second, len)?;
    let crossing = rule.method.is_crossing();

    let values = (0..len)
        .map(|i| {
            let (prev_first, prev_second) = if crossing {
                (first.previous(i), second.previous(i))
            } else {
                (f64::NAN, f64::NAN)
            };
            rule.method
                .compare(first.current(i), second.current(i), prev_first, prev_second)
        })
        .collect();
    Ok(SignalMask::from_vec(values))
}

pub fn evaluate_group(
    group: &GroupRule,
    arena: &TileArena,
    len: usize,
) -> Result<SignalMask, BacktestError> {
    let mut mask = SignalMask::all_false(len);
    for rule in &group.rules {
        let rule_mask = evaluate_rule(rule, arena, len)?;
        debug!(group = %group.id, rule = %rule.id, hits = rule_mask.count(), "rule evaluated");
        mask.merge_or(&rule_mask)?;
    }
    Ok(mask)
}

pub fn evaluate_order_type(
    order_type: &OrderTypeRule,
    arena: &TileArena,
    len: usize,
) -> Result<SignalMask, BacktestError> {
    if order_type.is_disabled() {
        return Ok(SignalMask::all_false(len));
    }
    let mut mask = SignalMask::all_true(len);
    for group in &order_type.groups {
        mask.merge_and(&evaluate_group(group, arena, len)?)?;
    }
    Ok(mask)
}

/// Per-row signal from the entry and exit masks.
pub fn signal_column(entry: &SignalMask, exit: &SignalMask) -> Result<Vec<Signal>, BacktestError> {
    if entry.len() != exit.len() {
        return Err(BacktestError::ShapeMismatch {
            context: "entry and exit masks".to_string(),
            expected: entry.len(),
            actual: exit.len(),
        });
    }
    Ok((0..entry.len())
        .map(|i| {
            if entry.get(i) {
                Signal::Entry
            } else if exit.get(i) {
                Signal::Exit
            } else {
                Signal::None
            }
        })
        .collect())
}

impl TradingSystemRule {
    /// One request per indicator tile that has no series yet.
    pub fn indicator_requests(&self) -> Vec<IndicatorRequest> {
        self.arena
            .unresolved()
            .into_iter()
            .map(|id| {
                let key = self.arena.key(id);
                IndicatorRequest {
                    tile: id,
                    name: key.name.clone(),
                    parameters: key.parameters.clone(),
                }
            })
            .collect()
    }

    /// Fail on unknown indicators or missing parameters before any data is read.
    pub fn check_indicators(&self, evaluator: &IndicatorEvaluator) -> Result<(), BacktestError> {
        for (_, key) in self.arena.indicators() {
            evaluator.check(&key.name, &key.parameters)?;
        }
        Ok(())
    }

    /// Evaluate every distinct indicator once and attach the series to its tile.
    pub fn resolve(
        &mut self,
        evaluator: &IndicatorEvaluator,
        prices: &PriceSeries,
    ) -> Result<(), BacktestError> {
        let requests = self.indicator_requests();
        for (tile, series) in evaluator.evaluate_batch(&requests, prices)? {
            self.arena.resolve(tile, series, prices.len())?;
        }
        Ok(())
    }

    /// Entry and exit masks. Every indicator tile must be resolved.
    pub fn masks(&self, len: usize) -> Result<(SignalMask, SignalMask), BacktestError> {
        let entry = evaluate_order_type(&self.entry, &self.arena, len)?;
        let exit = evaluate_order_type(&self.exit, &self.arena, len)?;
        Ok((entry, exit))
    }

    /// Resolve tiles, evaluate the tree and write the signal column.
    ///
    /// A tree whose tiles were resolved against a table of another length is
    /// rejected before anything is written.
    pub fn apply(
        &mut self,
        evaluator: &IndicatorEvaluator,
        table: &mut PriceTable,
    ) -> Result<(), BacktestError> {
        if let Some(resolved) = self.arena.resolved_len().filter(|len| *len != table.len()) {
            return Err(BacktestError::ShapeMismatch {
                context: "rule tree resolved for another price table".to_string(),
                expected: resolved,
                actual: table.len(),
            });
        }
        self.resolve(evaluator, &table.price_series())?;
        let (entry, exit) = self.masks(table.len())?;
        for (i, signal) in signal_column(&entry, &exit)?.into_iter().enumerate() {
            table.set_signal(i, signal);
        }
        debug!(
            entries = entry.count(),
            exits = exit.count(),
            "signal column written"
        );
        Ok(())
    }
}
