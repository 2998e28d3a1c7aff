//! Domain error types.

/// A parse error with position information for rule parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    ///
    /// `position` is a byte offset; the caret column counts characters.
    pub fn display_with_context(&self, input: &str) -> String {
        let column = input
            .get(..self.position)
            .map_or(self.position, |prefix| prefix.chars().count());
        let caret = " ".repeat(column) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for tilebacktest.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid rule {location}: {source}")]
    RuleParse {
        location: String,
        input: String,
        #[source]
        source: ParseError,
    },

    #[error("degenerate rule {rule_id}: both operands are {operand}")]
    DegenerateRule { rule_id: String, operand: String },

    #[error("indicator {name} has not been implemented")]
    UnknownIndicator { name: String },

    #[error("indicator {indicator} is missing required parameters: {}", missing.join(", "))]
    MissingParameters {
        indicator: String,
        missing: Vec<String>,
    },

    #[error("indicator {indicator} parameter {parameter} is invalid: {reason}")]
    InvalidParameter {
        indicator: String,
        parameter: String,
        reason: String,
    },

    #[error("tile {tile} was read before its series was resolved")]
    UnresolvedTile { tile: String },

    #[error("shape mismatch in {context}: expected length {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("price table is empty")]
    EmptyPriceTable,

    #[error("malformed price table at row {row}: {reason}")]
    MalformedPriceTable { row: usize, reason: String },

    #[error("no data for {ticker} between {start} and {end}")]
    NoData {
        ticker: String,
        start: String,
        end: String,
    },

    #[error("malformed date range: {reason}")]
    MalformedDateRange { reason: String },

    #[error(
        "trade {trade_id} closed with exit amount {exit_amount} equal to entry amount {entry_amount}"
    )]
    UndeterminedTradeResult {
        trade_id: usize,
        entry_amount: f64,
        exit_amount: f64,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err {
            BacktestError::Io(_) => 1,
            BacktestError::ConfigParse { .. }
            | BacktestError::ConfigMissing { .. }
            | BacktestError::ConfigInvalid { .. }
            | BacktestError::MalformedDateRange { .. } => 2,
            BacktestError::DataSource { .. }
            | BacktestError::NoData { .. }
            | BacktestError::EmptyPriceTable
            | BacktestError::MalformedPriceTable { .. } => 3,
            BacktestError::RuleParse { .. }
            | BacktestError::DegenerateRule { .. }
            | BacktestError::UnknownIndicator { .. }
            | BacktestError::MissingParameters { .. }
            | BacktestError::InvalidParameter { .. } => 4,
            BacktestError::UnresolvedTile { .. }
            | BacktestError::ShapeMismatch { .. }
            | BacktestError::UndeterminedTradeResult { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
