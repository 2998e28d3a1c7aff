//! Rule DSL parser.
//!
//! Recursive descent parser for one comparison:
//!
//! ```text
//! comparison := METHOD '(' operand ',' operand ')'
//! operand    := number | NAME [ '(' [ param { ',' param } ] ')' ]
//! param      := key '=' number
//! ```
//!
//! Indicator names are upper-cased and parameter keys lower-cased. Errors
//! carry the byte offset of the offending token.

use crate::domain::error::ParseError;
use crate::domain::rule::ComparisonMethod;
use crate::domain::rule_spec::{Comparison, OperandSpec};
use crate::domain::tile::Parameters;

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            message,
            position: self.pos,
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", expected, ch))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn consume_char(&mut self, ch: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek_word(&self) -> String {
        let word: String = self
            .remaining()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    /// Identifier starting with a letter or underscore.
    fn parse_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch.is_alphabetic() || ch == '_' => {}
            _ => {
                return Err(self.error(format!("expected {}, found '{}'", what, self.peek_word())));
            }
        }
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if matches!(self.peek(), Some('-') | Some('+')) {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_method(&mut self) -> Result<ComparisonMethod, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let word = self.parse_identifier("comparison method")?;
        word.parse::<ComparisonMethod>().map_err(|_| ParseError {
            message: format!(
                "expected comparison method (ABOVE, BELOW, CROSSES_ABOVE, CROSSES_BELOW), found '{}'",
                word
            ),
            position: start,
        })
    }

    fn parse_parameters(&mut self) -> Result<Parameters, ParseError> {
        let mut parameters = Parameters::new();
        if self.consume_char(')') {
            return Ok(parameters);
        }

        loop {
            self.skip_whitespace();
            let key_pos = self.pos;
            let key = self.parse_identifier("parameter name")?.to_lowercase();
            if parameters.get(&key).is_some() {
                return Err(ParseError {
                    message: format!("duplicate parameter '{}'", key),
                    position: key_pos,
                });
            }
            self.expect_char('=')?;
            let value = self.parse_number()?;
            parameters.insert(&key, value);

            if self.consume_char(')') {
                return Ok(parameters);
            }
            self.expect_char(',')?;
        }
    }

    fn parse_operand(&mut self) -> Result<OperandSpec, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '+' || ch == '.')
        {
            let num = self.parse_number()?;
            return Ok(OperandSpec::Constant(num));
        }

        let name = self.parse_identifier("operand")?.to_uppercase();
        let parameters = if self.consume_char('(') {
            self.parse_parameters()?
        } else {
            Parameters::new()
        };
        Ok(OperandSpec::Indicator { name, parameters })
    }

    fn parse(&mut self) -> Result<Comparison, ParseError> {
        let method = self.parse_method()?;
        self.expect_char('(')?;
        let first = self.parse_operand()?;
        self.expect_char(',')?;
        let second = self.parse_operand()?;
        self.expect_char(')')?;

        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after comparison: '{}'",
                self.remaining()
            )));
        }
        Ok(Comparison {
            method,
            first,
            second,
        })
    }
}

pub fn parse(input: &str) -> Result<Comparison, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sma(period: f64) -> OperandSpec {
        OperandSpec::indicator_with("SMA", Parameters::new().with("timeperiod", period))
    }

    #[test]
    fn parse_above_constant() {
        let c = parse("ABOVE(CLOSE, 100)").unwrap();
        assert_eq!(c.method, ComparisonMethod::Above);
        assert_eq!(c.first, OperandSpec::indicator("CLOSE"));
        assert_eq!(c.second, OperandSpec::Constant(100.0));
    }

    #[test]
    fn parse_crossing_indicators() {
        let c = parse("CROSSES_ABOVE(SMA(timeperiod=10), SMA(timeperiod=30))").unwrap();
        assert_eq!(c.method, ComparisonMethod::CrossesAbove);
        assert_eq!(c.first, sma(10.0));
        assert_eq!(c.second, sma(30.0));
    }

    #[test]
    fn parse_normalises_case() {
        let c = parse("crosses_below(sma(TimePeriod=5), close)").unwrap();
        assert_eq!(c.method, ComparisonMethod::CrossesBelow);
        assert_eq!(c.first, sma(5.0));
        assert_eq!(c.second, OperandSpec::indicator("CLOSE"));
    }

    #[test]
    fn parse_legacy_method_names() {
        assert_eq!(
            parse("IS_ABOVE(RSI(timeperiod=14), 70)").unwrap().method,
            ComparisonMethod::Above
        );
        assert_eq!(
            parse("IS_BELOW(RSI(timeperiod=14), 30)").unwrap().method,
            ComparisonMethod::Below
        );
    }

    #[test]
    fn parse_multiple_parameters() {
        let c = parse("ABOVE(X(fast=12, slow=26), 0)").unwrap();
        let expected = Parameters::new().with("fast", 12.0).with("slow", 26.0);
        assert_eq!(c.first, OperandSpec::indicator_with("X", expected));
    }

    #[test]
    fn parse_empty_parameter_list() {
        let c = parse("BELOW(CLOSE(), OPEN)").unwrap();
        assert_eq!(c.first, OperandSpec::indicator("CLOSE"));
    }

    #[test]
    fn parse_signed_and_float_numbers() {
        let c = parse("BELOW(ROC(timeperiod=3), -2.5)").unwrap();
        assert_eq!(c.second, OperandSpec::Constant(-2.5));
        let c = parse("ABOVE(.5, +1)").unwrap();
        assert_eq!(c.first, OperandSpec::Constant(0.5));
        assert_eq!(c.second, OperandSpec::Constant(1.0));
    }

    #[test]
    fn parse_whitespace_handling() {
        let c = parse("  ABOVE (  CLOSE ,  SMA ( timeperiod = 3 ) )  ").unwrap();
        assert_eq!(c.second, sma(3.0));
    }

    #[test]
    fn display_round_trips_every_method() {
        for text in [
            "ABOVE(CLOSE, 100)",
            "BELOW(RSI(timeperiod=14), 30.5)",
            "CROSSES_ABOVE(SMA(timeperiod=10), SMA(timeperiod=30))",
            "CROSSES_BELOW(EMA(timeperiod=5), -1)",
        ] {
            let parsed = parse(text).unwrap();
            assert_eq!(parsed.to_string(), text);
            assert_eq!(parse(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn error_unknown_method() {
        let err = parse("EQUALS(CLOSE, 1)").unwrap_err();
        assert_eq!(err.position, 0);
        assert!(err.message.contains("EQUALS"));
    }

    #[test]
    fn error_missing_comma() {
        let err = parse("ABOVE(CLOSE 1)").unwrap_err();
        assert_eq!(err.position, 12);
        assert!(err.message.contains("expected ','"));
    }

    #[test]
    fn error_missing_paren() {
        let err = parse("ABOVE(CLOSE, 1").unwrap_err();
        assert_eq!(err.position, 14);
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn error_parameter_without_value() {
        let err = parse("ABOVE(SMA(timeperiod=), 1)").unwrap_err();
        assert_eq!(err.position, 21);
        assert_eq!(err.message, "expected number");
    }

    #[test]
    fn error_duplicate_parameter() {
        let err = parse("ABOVE(SMA(timeperiod=1, timeperiod=2), 1)").unwrap_err();
        assert_eq!(err.position, 24);
    }

    #[test]
    fn error_trailing_input() {
        let err = parse("ABOVE(CLOSE, 1) junk").unwrap_err();
        assert_eq!(err.position, 16);
    }

    #[test]
    fn error_empty_input() {
        let err = parse("").unwrap_err();
        assert_eq!(err.position, 0);
        let err = parse("   ").unwrap_err();
        assert_eq!(err.position, 3);
    }

    #[test]
    fn error_display_with_context() {
        let input = "ABOVE(CLOSE; 1)";
        let err = parse(input).unwrap_err();
        let ctx = err.display_with_context(input);
        assert!(ctx.starts_with(input));
        assert!(ctx.contains("           ^"));
    }
}
