//! JSON report adapter implementing ReportPort.

use std::fs::File;
use std::io::{BufWriter, Write};

use crate::domain::error::BacktestError;
use crate::domain::report::StrategyReport;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &StrategyReport, output_path: &str) -> Result<(), BacktestError> {
        let file = File::create(output_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, report).map_err(std::io::Error::from)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
