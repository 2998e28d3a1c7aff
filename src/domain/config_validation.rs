//! Configuration validation.
//!
//! Turns the `[ticker]`, `[portfolio]` and rule sections of a config into a
//! validated [`BacktestRequest`] before any market data is read.

use chrono::{Duration, NaiveDate};
use tracing::warn;

use crate::domain::error::BacktestError;
use crate::domain::rule_spec::TradingSystemSpec;
use crate::domain::strategy::PortfolioConfig;
use crate::domain::trade::{TradeSize, TradeTargets};
use crate::ports::config_port::ConfigPort;

/// Earliest date a request may start from.
pub fn earliest_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(1985, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerRequest {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRequest {
    pub ticker: TickerRequest,
    pub data_dir: Option<String>,
    pub portfolio: PortfolioConfig,
    pub rules: TradingSystemSpec,
}

impl BacktestRequest {
    /// `today` anchors the "yesterday" cap on the date range.
    pub fn from_config(config: &dyn ConfigPort, today: NaiveDate) -> Result<Self, BacktestError> {
        Ok(BacktestRequest {
            ticker: load_ticker_request(config, today)?,
            data_dir: optional_string(config, "ticker", "data_dir"),
            portfolio: load_portfolio(config)?,
            rules: TradingSystemSpec::from_config(config)?,
        })
    }
}

pub fn load_ticker_request(
    config: &dyn ConfigPort,
    today: NaiveDate,
) -> Result<TickerRequest, BacktestError> {
    let symbol = optional_string(config, "ticker", "symbol")
        .map(|s| s.to_uppercase())
        .ok_or_else(|| BacktestError::ConfigMissing {
            section: "ticker".to_string(),
            key: "symbol".to_string(),
        })?;
    let start = optional_date(config, "ticker", "start_date")?;
    let end = optional_date(config, "ticker", "end_date")?;
    let (start, end) = validate_date_range(start, end, today)?;
    Ok(TickerRequest { symbol, start, end })
}

/// Apply defaults and bounds to a requested date range.
///
/// A missing start becomes the earliest allowed date and an earlier one is
/// truncated to it. A missing end, or one past yesterday, becomes yesterday.
pub fn validate_date_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), BacktestError> {
    let floor = earliest_start();
    let yesterday = today - Duration::days(1);

    let start = match start {
        None => floor,
        Some(s) if s < floor => {
            warn!(requested = %s, truncated_to = %floor, "start date truncated");
            floor
        }
        Some(s) if s > yesterday => {
            return Err(BacktestError::MalformedDateRange {
                reason: format!("start date {} is after {}", s, yesterday),
            });
        }
        Some(s) => s,
    };

    let end = match end {
        Some(e) if e < floor => {
            return Err(BacktestError::MalformedDateRange {
                reason: format!("end date {} is before {}", e, floor),
            });
        }
        Some(e) if e <= yesterday => e,
        _ => yesterday,
    };

    if end <= start {
        return Err(BacktestError::MalformedDateRange {
            reason: format!("end date {} is not after start date {}", end, start),
        });
    }
    Ok((start, end))
}

pub fn load_portfolio(config: &dyn ConfigPort) -> Result<PortfolioConfig, BacktestError> {
    let starting_amount = required_f64(config, "portfolio", "starting_amount")?;
    if starting_amount <= 0.0 {
        return Err(invalid("portfolio", "starting_amount", "must be positive"));
    }

    let size_value = required_f64(config, "portfolio", "trade_size_value")?;
    let size_type = optional_string(config, "portfolio", "trade_size_type")
        .unwrap_or_else(|| "DYNAMIC".to_string());
    let trade_size = match size_type.to_uppercase().as_str() {
        "STATIC" => {
            if size_value <= 0.0 {
                return Err(invalid(
                    "portfolio",
                    "trade_size_value",
                    "STATIC size must be positive",
                ));
            }
            TradeSize::Static(size_value)
        }
        "DYNAMIC" => {
            if size_value <= 0.0 || size_value > 1.0 {
                return Err(invalid(
                    "portfolio",
                    "trade_size_value",
                    "DYNAMIC size must be in (0, 1]",
                ));
            }
            TradeSize::Dynamic(size_value)
        }
        other => {
            return Err(invalid(
                "portfolio",
                "trade_size_type",
                &format!("expected STATIC or DYNAMIC, got {}", other),
            ));
        }
    };

    let take_profit = required_f64(config, "portfolio", "take_profit")?;
    if take_profit <= 0.001 {
        return Err(invalid("portfolio", "take_profit", "must be greater than 0.001"));
    }
    let stop_loss = required_f64(config, "portfolio", "stop_loss")?;
    if !(-1.0..=-0.001).contains(&stop_loss) {
        return Err(invalid("portfolio", "stop_loss", "must be in [-1, -0.001]"));
    }

    Ok(PortfolioConfig {
        starting_amount,
        trade_size,
        targets: TradeTargets {
            take_profit,
            stop_loss,
        },
    })
}

fn invalid(section: &str, key: &str, reason: &str) -> BacktestError {
    BacktestError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn optional_string(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn required_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, BacktestError> {
    let raw = optional_string(config, section, key).ok_or_else(|| BacktestError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    })?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(invalid(section, key, &format!("expected a number, got {}", raw))),
    }
}

fn optional_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, BacktestError> {
    optional_string(config, section, key)
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                invalid(section, key, &format!("invalid date {}, expected YYYY-MM-DD", raw))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2024, 6, 15)
    }

    const PORTFOLIO: &str = "[portfolio]
starting_amount = 10000
trade_size_type = DYNAMIC
trade_size_value = 0.5
take_profit = 0.1
stop_loss = -0.05
";

    fn invalid_key(err: &BacktestError) -> Option<&str> {
        match err {
            BacktestError::ConfigInvalid { key, .. } => Some(key),
            _ => None,
        }
    }

    #[test]
    fn valid_portfolio_loads() {
        let p = load_portfolio(&make_config(PORTFOLIO)).unwrap();
        assert_eq!(p.starting_amount, 10_000.0);
        assert_eq!(p.trade_size, TradeSize::Dynamic(0.5));
        assert_eq!(p.targets.take_profit, 0.1);
        assert_eq!(p.targets.stop_loss, -0.05);
    }

    #[test]
    fn static_size_accepts_currency_amount() {
        let config = make_config(&PORTFOLIO.replace("DYNAMIC", "static").replace("0.5", "2500"));
        let p = load_portfolio(&config).unwrap();
        assert_eq!(p.trade_size, TradeSize::Static(2500.0));
    }

    #[test]
    fn dynamic_size_above_one_fails() {
        let config = make_config(&PORTFOLIO.replace("0.5", "1.5"));
        let err = load_portfolio(&config).unwrap_err();
        assert_eq!(invalid_key(&err), Some("trade_size_value"));
    }

    #[test]
    fn unknown_size_type_fails() {
        let config = make_config(&PORTFOLIO.replace("DYNAMIC", "KELLY"));
        let err = load_portfolio(&config).unwrap_err();
        assert_eq!(invalid_key(&err), Some("trade_size_type"));
    }

    #[test]
    fn starting_amount_must_be_positive() {
        let config = make_config(&PORTFOLIO.replace("10000", "0"));
        let err = load_portfolio(&config).unwrap_err();
        assert_eq!(invalid_key(&err), Some("starting_amount"));
    }

    #[test]
    fn take_profit_must_exceed_minimum() {
        let config = make_config(&PORTFOLIO.replace("take_profit = 0.1", "take_profit = 0.001"));
        let err = load_portfolio(&config).unwrap_err();
        assert_eq!(invalid_key(&err), Some("take_profit"));
    }

    #[test]
    fn stop_loss_bounds() {
        for bad in ["0.05", "-1.5", "-0.0005"] {
            let config = make_config(&PORTFOLIO.replace("-0.05", bad));
            let err = load_portfolio(&config).unwrap_err();
            assert_eq!(invalid_key(&err), Some("stop_loss"));
        }
        let config = make_config(&PORTFOLIO.replace("-0.05", "-1"));
        assert!(load_portfolio(&config).is_ok());
    }

    #[test]
    fn missing_and_non_numeric_values_are_distinguished() {
        let config = make_config("[portfolio]\ntrade_size_value = 0.5\n");
        let err = load_portfolio(&config).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::ConfigMissing { key, .. } if key == "starting_amount"
        ));

        let config = make_config(&PORTFOLIO.replace("10000", "lots"));
        let err = load_portfolio(&config).unwrap_err();
        assert_eq!(invalid_key(&err), Some("starting_amount"));
    }

    #[test]
    fn missing_dates_default_to_full_range() {
        let (start, end) = validate_date_range(None, None, today()).unwrap();
        assert_eq!(start, date(1985, 1, 1));
        assert_eq!(end, date(2024, 6, 14));
    }

    #[test]
    fn early_start_is_truncated() {
        let (start, _) = validate_date_range(Some(date(1970, 5, 1)), None, today()).unwrap();
        assert_eq!(start, date(1985, 1, 1));
    }

    #[test]
    fn future_end_is_capped_to_yesterday() {
        let (_, end) =
            validate_date_range(Some(date(2020, 1, 1)), Some(date(2030, 1, 1)), today()).unwrap();
        assert_eq!(end, date(2024, 6, 14));
    }

    #[test]
    fn start_after_yesterday_fails() {
        let err = validate_date_range(Some(today()), None, today()).unwrap_err();
        assert!(matches!(err, BacktestError::MalformedDateRange { .. }));
    }

    #[test]
    fn end_before_floor_fails() {
        let err = validate_date_range(None, Some(date(1984, 12, 31)), today()).unwrap_err();
        assert!(matches!(err, BacktestError::MalformedDateRange { .. }));
    }

    #[test]
    fn end_not_after_start_fails() {
        let d = date(2020, 1, 1);
        let err = validate_date_range(Some(d), Some(d), today()).unwrap_err();
        assert!(matches!(err, BacktestError::MalformedDateRange { .. }));
    }

    #[test]
    fn ticker_request_reads_section() {
        let config = make_config(
            "[ticker]\nsymbol = acme\nstart_date = 2020-01-01\nend_date = 2021-01-01\n",
        );
        let request = load_ticker_request(&config, today()).unwrap();
        assert_eq!(request.symbol, "ACME");
        assert_eq!(request.start, date(2020, 1, 1));
        assert_eq!(request.end, date(2021, 1, 1));
    }

    #[test]
    fn malformed_date_is_config_error() {
        let config = make_config("[ticker]\nsymbol = ACME\nstart_date = 2020/01/01\n");
        let err = load_ticker_request(&config, today()).unwrap_err();
        assert_eq!(invalid_key(&err), Some("start_date"));
    }

    #[test]
    fn missing_symbol_fails() {
        let config = make_config("[ticker]\nstart_date = 2020-01-01\n");
        let err = load_ticker_request(&config, today()).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigMissing { key, .. } if key == "symbol"));
    }

    #[test]
    fn full_request_loads_rules() {
        let content = format!(
            "[ticker]\nsymbol = ACME\ndata_dir = ./data\n\n{}\n[entry.trend]\n{}\n",
            PORTFOLIO,
            "up = ABOVE(CLOSE, SMA(timeperiod=5))"
        );
        let request = BacktestRequest::from_config(&make_config(&content), today()).unwrap();
        assert_eq!(request.data_dir.as_deref(), Some("./data"));
        assert_eq!(request.rules.entry.groups.len(), 1);
        assert!(request.rules.exit.is_empty());
    }
}
