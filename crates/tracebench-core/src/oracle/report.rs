//! Oracle text report parsing.
//!
//! A report looks like:
//!
//! ```text
//! Success::
//! Time:      1398
//! Commands:  1398
//! Energy:    335111596
//! ClockTime: 580ms
//! ```
//!
//! Failures start with `Failure::` and may carry extra diagnostic lines.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::OracleVerdict;
use crate::error::ReportError;

const SUCCESS_MARKER: &str = "Success";

fn fields_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^\s*Commands:\s+(\S+)\s*$\s*^\s*Energy:\s+(\S+)\s*$")
            .expect("static report pattern")
    })
}

/// Parse a report into a verdict. The full text is kept as the message.
pub fn parse_report(text: &str) -> Result<OracleVerdict, ReportError> {
    let caps = fields_pattern()
        .captures(text)
        .ok_or(ReportError::MissingFields)?;

    let consumed_commands = parse_field("Commands", &caps[1])?;
    let energy = parse_field("Energy", &caps[2])?;

    Ok(OracleVerdict {
        successful: text.contains(SUCCESS_MARKER),
        energy,
        consumed_commands,
        message: text.to_string(),
    })
}

fn parse_field(field: &'static str, value: &str) -> Result<u64, ReportError> {
    value.parse().map_err(|_| ReportError::BadInteger {
        field,
        value: value.to_string(),
    })
}
