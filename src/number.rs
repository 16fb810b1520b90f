//! Display-string <-> number conversions.
//!
//! The calculator display is plain text, so every operator press and every
//! equals press goes through [`parse_display`], and every result goes back
//! through [`format_number`]. Both follow the web platform conventions so a
//! display like `"3."` or `"Infinity"` behaves the way a browser calculator
//! would.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NUMBER_PREFIX: Regex = Regex::new(
        r"^[+-]?(Infinity|(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?)"
    )
    .unwrap();
}

/// Parse the longest numeric prefix of `text`.
///
/// Leading whitespace is skipped. Returns `NaN` when no prefix is numeric,
/// so `"abc"` and `""` both parse to `NaN` while `"12abc"` parses to `12`.
pub fn parse_display(text: &str) -> f64 {
    let text = text.trim_start();
    let Some(found) = NUMBER_PREFIX.find(text) else {
        return f64::NAN;
    };
    let literal = found.as_str();

    let (negative, unsigned) = match literal.as_bytes()[0] {
        b'-' => (true, &literal[1..]),
        b'+' => (false, &literal[1..]),
        _ => (false, literal),
    };

    let magnitude = if unsigned == "Infinity" {
        f64::INFINITY
    } else {
        // "3." and "3.e5" are valid prefixes but not valid Rust literals
        let normalized = unsigned.replacen(".e", "e", 1).replacen(".E", "E", 1);
        let normalized = normalized.strip_suffix('.').unwrap_or(&normalized);
        normalized.parse::<f64>().unwrap_or(f64::NAN)
    };

    if negative { -magnitude } else { magnitude }
}

/// Format a number the way the display shows it.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let formatted = format!("{:e}", value);
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => formatted,
        }
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_partial_literals() {
        assert_eq!(parse_display("123"), 123.0);
        assert_eq!(parse_display("0."), 0.0);
        assert_eq!(parse_display("3."), 3.0);
        assert_eq!(parse_display("0.25"), 0.25);
        assert_eq!(parse_display("-4.5"), -4.5);
        assert_eq!(parse_display("  7"), 7.0);
        assert_eq!(parse_display(".5"), 0.5);
    }

    #[test]
    fn parses_numeric_prefix_only() {
        assert_eq!(parse_display("12abc"), 12.0);
        assert_eq!(parse_display("1e+215"), 1e215);
        assert_eq!(parse_display("2e"), 2.0);
        assert_eq!(parse_display("Infinity5"), f64::INFINITY);
        assert_eq!(parse_display("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    fn unparseable_text_is_nan() {
        assert!(parse_display("").is_nan());
        assert!(parse_display(".").is_nan());
        assert!(parse_display("NaN").is_nan());
        assert!(parse_display("abc").is_nan());
    }

    #[test]
    fn formats_like_the_display() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn switches_to_exponent_form_at_the_edges() {
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(-2.5e22), "-2.5e+22");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(123456789012.0), "123456789012");
    }
}
