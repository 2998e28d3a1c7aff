//! Report output port trait.

use crate::domain::error::BacktestError;
use crate::domain::report::StrategyReport;

/// Port for writing a finished backtest report.
pub trait ReportPort {
    fn write(&self, report: &StrategyReport, output_path: &str) -> Result<(), BacktestError>;
}
