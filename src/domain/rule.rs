//! Rule tree.
//!
//! - `Rule`: one comparison between two tiles
//! - `GroupRule`: rules OR-ed together
//! - `OrderTypeRule`: groups AND-ed together, for one order type
//! - `TradingSystemRule`: the entry and exit order types plus the tile arena
//!   every rule points into
//!
//! Evaluation lives in [`crate::domain::rule_eval`].

use std::fmt;
use std::str::FromStr;

use crate::domain::error::BacktestError;
use crate::domain::price_table::Signal;
use crate::domain::rule_spec::{GroupSpec, OrderTypeSpec, RuleSpec, TradingSystemSpec};
use crate::domain::tile::{TileArena, TileId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonMethod {
    Above,
    Below,
    CrossesAbove,
    CrossesBelow,
}

impl ComparisonMethod {
    pub fn is_crossing(self) -> bool {
        matches!(
            self,
            ComparisonMethod::CrossesAbove | ComparisonMethod::CrossesBelow
        )
    }

    /// Compare current values, and for crossings the values one step back.
    /// Any NaN makes the comparison false.
    pub fn compare(self, first: f64, second: f64, prev_first: f64, prev_second: f64) -> bool {
        match self {
            ComparisonMethod::Above => first > second,
            ComparisonMethod::Below => first < second,
            ComparisonMethod::CrossesAbove => first > second && prev_first < prev_second,
            ComparisonMethod::CrossesBelow => first < second && prev_first > prev_second,
        }
    }
}

impl fmt::Display for ComparisonMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComparisonMethod::Above => "ABOVE",
            ComparisonMethod::Below => "BELOW",
            ComparisonMethod::CrossesAbove => "CROSSES_ABOVE",
            ComparisonMethod::CrossesBelow => "CROSSES_BELOW",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ComparisonMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ABOVE" | "IS_ABOVE" => Ok(ComparisonMethod::Above),
            "BELOW" | "IS_BELOW" => Ok(ComparisonMethod::Below),
            "CROSSES_ABOVE" => Ok(ComparisonMethod::CrossesAbove),
            "CROSSES_BELOW" => Ok(ComparisonMethod::CrossesBelow),
            other => Err(format!("unknown comparison method: {}", other)),
        }
    }
}

/// Which signal an order type produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    Entry,
    Exit,
}

impl OrderType {
    pub fn signal(self) -> Signal {
        match self {
            OrderType::Entry => Signal::Entry,
            OrderType::Exit => Signal::Exit,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Entry => write!(f, "entry"),
            OrderType::Exit => write!(f, "exit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: String,
    pub first: TileId,
    pub second: TileId,
    pub method: ComparisonMethod,
}

impl Rule {
    /// Register both operands and reject a rule comparing a tile with itself.
    pub fn build(spec: &RuleSpec, arena: &mut TileArena) -> Result<Self, BacktestError> {
        let first = arena.register(spec.comparison.first.tile_key());
        let second = arena.register(spec.comparison.second.tile_key());
        if first == second {
            return Err(BacktestError::DegenerateRule {
                rule_id: spec.id.clone(),
                operand: arena.key(first).to_string(),
            });
        }
        Ok(Rule {
            id: spec.id.clone(),
            first,
            second,
            method: spec.comparison.method,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRule {
    pub id: String,
    pub rules: Vec<Rule>,
}

impl GroupRule {
    pub fn build(spec: &GroupSpec, arena: &mut TileArena) -> Result<Self, BacktestError> {
        let rules = spec
            .rules
            .iter()
            .map(|r| Rule::build(r, arena))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GroupRule {
            id: spec.id.clone(),
            rules,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTypeRule {
    pub order_type: OrderType,
    pub groups: Vec<GroupRule>,
}

impl OrderTypeRule {
    pub fn build(
        order_type: OrderType,
        spec: &OrderTypeSpec,
        arena: &mut TileArena,
    ) -> Result<Self, BacktestError> {
        let groups = spec
            .groups
            .iter()
            .map(|g| GroupRule::build(g, arena))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(OrderTypeRule { order_type, groups })
    }

    /// An order type without groups never signals.
    pub fn is_disabled(&self) -> bool {
        self.groups.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TradingSystemRule {
    pub arena: TileArena,
    pub entry: OrderTypeRule,
    pub exit: OrderTypeRule,
}

impl TradingSystemRule {
    /// Build the whole tree, registering each distinct tile once.
    pub fn build(spec: &TradingSystemSpec) -> Result<Self, BacktestError> {
        let mut arena = TileArena::new();
        let entry = OrderTypeRule::build(OrderType::Entry, &spec.entry, &mut arena)?;
        let exit = OrderTypeRule::build(OrderType::Exit, &spec.exit, &mut arena)?;
        Ok(TradingSystemRule { arena, entry, exit })
    }

    pub fn order_types(&self) -> [&OrderTypeRule; 2] {
        [&self.entry, &self.exit]
    }
}

impl fmt::Display for TradingSystemRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for order_type in self.order_types() {
            if order_type.is_disabled() {
                writeln!(f, "{}: disabled", order_type.order_type)?;
                continue;
            }
            writeln!(f, "{}: all of", order_type.order_type)?;
            for group in &order_type.groups {
                writeln!(f, "  group {}: any of", group.id)?;
                for rule in &group.rules {
                    writeln!(
                        f,
                        "    {}: {}({}, {})",
                        rule.id,
                        rule.method,
                        self.arena.key(rule.first),
                        self.arena.key(rule.second)
                    )?;
                }
            }
        }
        Ok(())
    }
}
