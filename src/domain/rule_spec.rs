//! Declarative rule specification.
//!
//! A [`TradingSystemSpec`] is what the user wrote: per order type, a list of
//! named groups, each a list of named comparisons. It is loaded from config
//! sections `[entry.<group>]` and `[exit.<group>]` whose keys are rule ids and
//! whose values are comparisons in the rule DSL.

use std::fmt;

use crate::domain::error::BacktestError;
use crate::domain::rule::{ComparisonMethod, OrderType};
use crate::domain::rule_parser;
use crate::domain::tile::{Parameters, TileKey};
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub enum OperandSpec {
    Constant(f64),
    Indicator { name: String, parameters: Parameters },
}

impl OperandSpec {
    pub fn indicator(name: &str) -> Self {
        OperandSpec::Indicator {
            name: name.to_string(),
            parameters: Parameters::new(),
        }
    }

    pub fn indicator_with(name: &str, parameters: Parameters) -> Self {
        OperandSpec::Indicator {
            name: name.to_string(),
            parameters,
        }
    }

    pub fn tile_key(&self) -> TileKey {
        match self {
            OperandSpec::Constant(value) => TileKey::constant(*value),
            OperandSpec::Indicator { name, parameters } => {
                TileKey::indicator(name, parameters.clone())
            }
        }
    }
}

impl fmt::Display for OperandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tile_key())
    }
}

/// `METHOD(first, second)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub method: ComparisonMethod,
    pub first: OperandSpec,
    pub second: OperandSpec,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.method, self.first, self.second)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleSpec {
    pub id: String,
    pub comparison: Comparison,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    pub id: String,
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderTypeSpec {
    pub groups: Vec<GroupSpec>,
}

impl OrderTypeSpec {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradingSystemSpec {
    pub entry: OrderTypeSpec,
    pub exit: OrderTypeSpec,
}

impl TradingSystemSpec {
    /// Collect every `[entry.*]` and `[exit.*]` section. Groups and rules are
    /// ordered by id; other sections are ignored.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BacktestError> {
        let mut spec = TradingSystemSpec::default();

        let mut sections = config.sections();
        sections.sort();
        for section in sections {
            let Some((prefix, group_id)) = section.split_once('.') else {
                continue;
            };
            let order_type = match prefix {
                "entry" => OrderType::Entry,
                "exit" => OrderType::Exit,
                _ => continue,
            };
            if group_id.trim().is_empty() {
                return Err(BacktestError::ConfigInvalid {
                    section: section.clone(),
                    key: String::new(),
                    reason: "group id is empty".to_string(),
                });
            }

            let group = load_group(config, &section, group_id)?;
            match order_type {
                OrderType::Entry => spec.entry.groups.push(group),
                OrderType::Exit => spec.exit.groups.push(group),
            }
        }

        Ok(spec)
    }

    pub fn order_type(&self, order_type: OrderType) -> &OrderTypeSpec {
        match order_type {
            OrderType::Entry => &self.entry,
            OrderType::Exit => &self.exit,
        }
    }
}

fn load_group(
    config: &dyn ConfigPort,
    section: &str,
    group_id: &str,
) -> Result<GroupSpec, BacktestError> {
    let mut keys = config.keys(section);
    keys.sort();

    let mut rules = Vec::with_capacity(keys.len());
    for key in keys {
        let text = config
            .get_string(section, &key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| BacktestError::ConfigMissing {
                section: section.to_string(),
                key: key.clone(),
            })?;
        let comparison =
            rule_parser::parse(&text).map_err(|source| BacktestError::RuleParse {
                location: format!("[{}] {}", section, key),
                input: text.clone(),
                source,
            })?;
        rules.push(RuleSpec {
            id: key,
            comparison,
        });
    }

    Ok(GroupSpec {
        id: group_id.to_string(),
        rules,
    })
}
