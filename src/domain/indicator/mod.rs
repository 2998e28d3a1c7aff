//! Indicator evaluator.
//!
//! Indicators are looked up by name in an explicit `name -> IndicatorFn` map
//! handed to [`IndicatorEvaluator::new`]. Every indicator returns one value per
//! input row; warm-up positions are `NaN`.

pub mod ema;
pub mod roc;
pub mod rsi;
pub mod sma;

use std::collections::BTreeMap;

use tracing::info;

use super::error::BacktestError;
use super::price_table::PriceSeries;
use super::tile::{Parameters, TileId};

pub type ComputeFn = fn(&str, &PriceSeries, &Parameters) -> Result<Vec<f64>, BacktestError>;

/// A named indicator: the parameters it requires and how to compute it.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorFn {
    pub required: &'static [&'static str],
    pub compute: ComputeFn,
}

/// One indicator evaluation destined for a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRequest {
    pub tile: TileId,
    pub name: String,
    pub parameters: Parameters,
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorEvaluator {
    indicators: BTreeMap<String, IndicatorFn>,
}

const PERIOD: &[&str] = &["timeperiod"];

impl IndicatorEvaluator {
    pub fn new(indicators: BTreeMap<String, IndicatorFn>) -> Self {
        Self { indicators }
    }

    /// SMA, EMA, RSI, ROC and the raw OPEN/HIGH/LOW/CLOSE columns.
    pub fn with_defaults() -> Self {
        let mut map = BTreeMap::new();
        let mut add = |name: &str, required: &'static [&'static str], compute: ComputeFn| {
            map.insert(name.to_string(), IndicatorFn { required, compute });
        };
        add("SMA", PERIOD, sma);
        add("EMA", PERIOD, ema);
        add("RSI", PERIOD, rsi);
        add("ROC", PERIOD, roc);
        add("OPEN", &[], open);
        add("HIGH", &[], high);
        add("LOW", &[], low);
        add("CLOSE", &[], close);
        Self::new(map)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.indicators.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&IndicatorFn> {
        self.indicators.get(name)
    }

    /// Check a name and its parameters without computing anything.
    pub fn check(&self, name: &str, parameters: &Parameters) -> Result<(), BacktestError> {
        let indicator = self
            .indicators
            .get(name)
            .ok_or_else(|| BacktestError::UnknownIndicator {
                name: name.to_string(),
            })?;
        let missing: Vec<String> = indicator
            .required
            .iter()
            .filter(|key| parameters.get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(BacktestError::MissingParameters {
                indicator: name.to_string(),
                missing,
            });
        }
        Ok(())
    }

    pub fn evaluate(
        &self,
        name: &str,
        parameters: &Parameters,
        prices: &PriceSeries,
    ) -> Result<Vec<f64>, BacktestError> {
        self.check(name, parameters)?;
        let indicator = self
            .indicators
            .get(name)
            .ok_or_else(|| BacktestError::UnknownIndicator {
                name: name.to_string(),
            })?;
        let values = (indicator.compute)(name, prices, parameters)?;
        if values.len() != prices.len() {
            return Err(BacktestError::ShapeMismatch {
                context: format!("output of indicator {}", name),
                expected: prices.len(),
                actual: values.len(),
            });
        }
        Ok(values)
    }

    /// Evaluate every request over the same price arrays.
    pub fn evaluate_batch(
        &self,
        requests: &[IndicatorRequest],
        prices: &PriceSeries,
    ) -> Result<Vec<(TileId, Vec<f64>)>, BacktestError> {
        requests
            .iter()
            .map(|req| {
                info!(
                    indicator = %req.name,
                    parameters = %req.parameters,
                    rows = prices.len(),
                    "evaluating indicator"
                );
                let values = self.evaluate(&req.name, &req.parameters, prices)?;
                Ok((req.tile, values))
            })
            .collect()
    }
}

/// Read a positive whole-number period parameter.
pub fn period_param(
    indicator: &str,
    parameters: &Parameters,
    key: &str,
) -> Result<usize, BacktestError> {
    let value = parameters
        .get(key)
        .ok_or_else(|| BacktestError::MissingParameters {
            indicator: indicator.to_string(),
            missing: vec![key.to_string()],
        })?;
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
        return Err(BacktestError::InvalidParameter {
            indicator: indicator.to_string(),
            parameter: key.to_string(),
            reason: format!("expected a positive whole number, got {}", value),
        });
    }
    Ok(value as usize)
}

fn sma(name: &str, prices: &PriceSeries, params: &Parameters) -> Result<Vec<f64>, BacktestError> {
    let period = period_param(name, params, "timeperiod")?;
    Ok(sma::calculate_sma(&prices.close, period))
}

fn ema(name: &str, prices: &PriceSeries, params: &Parameters) -> Result<Vec<f64>, BacktestError> {
    let period = period_param(name, params, "timeperiod")?;
    Ok(ema::calculate_ema(&prices.close, period))
}

fn rsi(name: &str, prices: &PriceSeries, params: &Parameters) -> Result<Vec<f64>, BacktestError> {
    let period = period_param(name, params, "timeperiod")?;
    Ok(rsi::calculate_rsi(&prices.close, period))
}

fn roc(name: &str, prices: &PriceSeries, params: &Parameters) -> Result<Vec<f64>, BacktestError> {
    let period = period_param(name, params, "timeperiod")?;
    Ok(roc::calculate_roc(&prices.close, period))
}

fn open(_: &str, prices: &PriceSeries, _: &Parameters) -> Result<Vec<f64>, BacktestError> {
    Ok(prices.open.clone())
}

fn high(_: &str, prices: &PriceSeries, _: &Parameters) -> Result<Vec<f64>, BacktestError> {
    Ok(prices.high.clone())
}

fn low(_: &str, prices: &PriceSeries, _: &Parameters) -> Result<Vec<f64>, BacktestError> {
    Ok(prices.low.clone())
}

fn close(_: &str, prices: &PriceSeries, _: &Parameters) -> Result<Vec<f64>, BacktestError> {
    Ok(prices.close.clone())
}
