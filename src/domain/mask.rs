//! Boolean signal masks aligned to price table rows.

use super::error::BacktestError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMask {
    values: Vec<bool>,
}

impl SignalMask {
    pub fn all_false(len: usize) -> Self {
        Self {
            values: vec![false; len],
        }
    }

    pub fn all_true(len: usize) -> Self {
        Self {
            values: vec![true; len],
        }
    }

    pub fn from_vec(values: Vec<bool>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> bool {
        self.values.get(index).copied().unwrap_or(false)
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.values
    }

    pub fn count(&self) -> usize {
        self.values.iter().filter(|v| **v).count()
    }

    /// Element-wise OR, in place.
    pub fn merge_or(&mut self, other: &SignalMask) -> Result<(), BacktestError> {
        self.check_shape(other, "mask OR-merge")?;
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a |= *b;
        }
        Ok(())
    }

    /// Element-wise AND, in place.
    pub fn merge_and(&mut self, other: &SignalMask) -> Result<(), BacktestError> {
        self.check_shape(other, "mask AND-merge")?;
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a &= *b;
        }
        Ok(())
    }

    fn check_shape(&self, other: &SignalMask, context: &str) -> Result<(), BacktestError> {
        if self.values.len() != other.values.len() {
            return Err(BacktestError::ShapeMismatch {
                context: context.to_string(),
                expected: self.values.len(),
                actual: other.values.len(),
            });
        }
        Ok(())
    }
}
