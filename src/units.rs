//! SPICE engineering notation.
//!
//! Values are written to the netlist with the suffixes ngspice understands,
//! `Meg` for mega because a bare `M` means milli to SPICE.

use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_VALUE: Regex =
        Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)\s*([a-zA-Z]*)\s*$").unwrap();
}

const PREFIXES: [(f64, &str); 10] = [
    (1e12, "T"),
    (1e9, "G"),
    (1e6, "Meg"),
    (1e3, "k"),
    (1.0, ""),
    (1e-3, "m"),
    (1e-6, "u"),
    (1e-9, "n"),
    (1e-12, "p"),
    (1e-15, "f"),
];

/// Format a value with the matching engineering suffix.
///
/// ```
/// use elektron_circuits::units::format_si;
/// assert_eq!("8k", format_si(8000.0));
/// assert_eq!("10m", format_si(0.01));
/// ```
pub fn format_si(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{}", value);
    }
    let magnitude = value.abs();
    let (scale, suffix) = PREFIXES
        .iter()
        .find(|(scale, _)| magnitude >= *scale * (1.0 - 1e-9))
        .copied()
        .unwrap_or(PREFIXES[PREFIXES.len() - 1]);
    let digits = format!("{:.6}", value / scale);
    let digits = digits.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", digits, suffix)
}

/// Parse a SPICE value such as `8kOhm`, `10mF` or `1Meg`.
///
/// Letters after the scale suffix are treated as the unit and ignored.
pub fn parse_si(text: &str) -> Result<f64> {
    let caps = RE_VALUE
        .captures(text)
        .ok_or_else(|| Error::InvalidValue(text.to_string()))?;
    let number: f64 = caps[1]
        .parse()
        .map_err(|_| Error::InvalidValue(text.to_string()))?;
    let suffix = caps[2].to_lowercase();
    let scale = if suffix.starts_with("meg") {
        1e6
    } else {
        match suffix.chars().next() {
            Some('t') => 1e12,
            Some('g') => 1e9,
            Some('k') => 1e3,
            Some('m') => 1e-3,
            Some('u') => 1e-6,
            Some('n') => 1e-9,
            Some('p') => 1e-12,
            Some('f') => 1e-15,
            _ => 1.0,
        }
    };
    Ok(number * scale)
}
