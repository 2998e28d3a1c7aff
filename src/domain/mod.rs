//! Core domain types and logic.

pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod mask;
pub mod price_table;
pub mod report;
pub mod rule;
pub mod rule_eval;
pub mod rule_parser;
pub mod rule_spec;
pub mod strategy;
pub mod tile;
pub mod trade;
pub mod trading_period;
