//! Rule operands ("tiles") and the arena that owns them.
//!
//! Tiles are keyed by structural identity (kind, name, parameters). Registering
//! the same operand twice returns the same [`TileId`], so two rules that read
//! `SMA(timeperiod=20)` share one resolved series and operand equality is a
//! handle comparison.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};

use super::error::BacktestError;

/// Name given to constant tiles.
pub const CONSTANT_NAME: &str = "VALUE";

/// Numeric indicator parameters, ordered by key.
#[derive(Debug, Clone, Default)]
pub struct Parameters(BTreeMap<String, f64>);

impl Parameters {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: f64) {
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

// Bitwise comparison keeps Eq/Hash lawful for f64 values.
impl PartialEq for Parameters {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va.to_bits() == vb.to_bits())
    }
}

impl Eq for Parameters {}

impl Hash for Parameters {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (k, v) in &self.0 {
            k.hash(state);
            v.to_bits().hash(state);
        }
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileKind {
    Constant,
    Indicator,
}

/// Structural identity of a tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub kind: TileKind,
    pub name: String,
    pub parameters: Parameters,
}

impl TileKey {
    pub fn constant(value: f64) -> Self {
        TileKey {
            kind: TileKind::Constant,
            name: CONSTANT_NAME.to_string(),
            parameters: Parameters::new().with("value", value),
        }
    }

    pub fn indicator(name: &str, parameters: Parameters) -> Self {
        TileKey {
            kind: TileKind::Indicator,
            name: name.to_string(),
            parameters,
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TileKind::Constant => match self.parameters.get("value") {
                Some(v) => write!(f, "{}", v),
                None => write!(f, "{}", CONSTANT_NAME),
            },
            TileKind::Indicator if self.parameters.is_empty() => write!(f, "{}", self.name),
            TileKind::Indicator => write!(f, "{}({})", self.name, self.parameters),
        }
    }
}

/// Handle into a [`TileArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub key: TileKey,
    series: Option<Vec<f64>>,
}

impl Tile {
    pub fn is_resolved(&self) -> bool {
        self.key.kind == TileKind::Constant || self.series.is_some()
    }
}

/// Read-only view of a tile's values: a broadcast scalar or a resolved series.
#[derive(Debug, Clone, Copy)]
pub enum TileView<'a> {
    Scalar(f64),
    Series(&'a [f64]),
}

impl TileView<'_> {
    /// Series length; `None` for a scalar.
    pub fn series_len(&self) -> Option<usize> {
        match self {
            TileView::Scalar(_) => None,
            TileView::Series(s) => Some(s.len()),
        }
    }

    pub fn current(&self, index: usize) -> f64 {
        match self {
            TileView::Scalar(v) => *v,
            TileView::Series(s) => s.get(index).copied().unwrap_or(f64::NAN),
        }
    }

    /// Value one step back; `NaN` at index 0.
    pub fn previous(&self, index: usize) -> f64 {
        if index == 0 {
            return f64::NAN;
        }
        self.current(index - 1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TileArena {
    tiles: Vec<Tile>,
    index: HashMap<TileKey, TileId>,
    resolved_len: Option<usize>,
}

impl TileArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tile, returning the existing handle if the key is known.
    pub fn register(&mut self, key: TileKey) -> TileId {
        if let Some(id) = self.index.get(&key) {
            return *id;
        }
        let id = TileId(self.tiles.len());
        self.tiles.push(Tile {
            key: key.clone(),
            series: None,
        });
        self.index.insert(key, id);
        id
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn get(&self, id: TileId) -> &Tile {
        &self.tiles[id.0]
    }

    pub fn key(&self, id: TileId) -> &TileKey {
        &self.tiles[id.0].key
    }

    /// Indicator tiles, in registration order.
    pub fn indicators(&self) -> impl Iterator<Item = (TileId, &TileKey)> {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.key.kind == TileKind::Indicator)
            .map(|(i, t)| (TileId(i), &t.key))
    }

    /// Indicator tiles whose series has not been set yet.
    pub fn unresolved(&self) -> Vec<TileId> {
        self.indicators()
            .filter(|(id, _)| !self.tiles[id.0].is_resolved())
            .map(|(id, _)| id)
            .collect()
    }

    /// Length every resolved series shares, once the first one is attached.
    pub fn resolved_len(&self) -> Option<usize> {
        self.resolved_len
    }

    /// Attach a computed series to an indicator tile. A series is written once,
    /// and all series in one arena have the same length.
    pub fn resolve(
        &mut self,
        id: TileId,
        series: Vec<f64>,
        expected_len: usize,
    ) -> Result<(), BacktestError> {
        let tile = &mut self.tiles[id.0];
        if series.len() != expected_len {
            return Err(BacktestError::ShapeMismatch {
                context: format!("series for tile {}", tile.key),
                expected: expected_len,
                actual: series.len(),
            });
        }
        if let Some(len) = self.resolved_len.filter(|len| *len != expected_len) {
            return Err(BacktestError::ShapeMismatch {
                context: format!("tile {} in an arena resolved for another table", tile.key),
                expected: len,
                actual: expected_len,
            });
        }
        if tile.key.kind == TileKind::Indicator && tile.series.is_none() {
            tile.series = Some(series);
            self.resolved_len = Some(expected_len);
        }
        Ok(())
    }

    pub fn view(&self, id: TileId) -> Result<TileView<'_>, BacktestError> {
        let tile = &self.tiles[id.0];
        match tile.key.kind {
            TileKind::Constant => {
                let value = tile.key.parameters.get("value").unwrap_or(f64::NAN);
                Ok(TileView::Scalar(value))
            }
            TileKind::Indicator => match &tile.series {
                Some(series) => Ok(TileView::Series(series)),
                None => Err(BacktestError::UnresolvedTile {
                    tile: tile.key.to_string(),
                }),
            },
        }
    }
}
