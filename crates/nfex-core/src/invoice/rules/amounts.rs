//! Amount parsing and formatting for NF-e values.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Integer digits allowed by the NF-e monetary type (`TDec_1302`).
pub const MAX_INTEGER_DIGITS: usize = 13;

/// Fraction digits allowed by the NF-e monetary type.
pub const MAX_FRACTION_DIGITS: usize = 2;

/// Parse an NF-e decimal amount (e.g. `1234.56`).
///
/// The layout uses a dot as decimal separator and no grouping, so
/// anything else (commas, spaces, exponents) is rejected rather than guessed.
/// Values wider than 13 integer or 2 fraction digits are rejected too; a
/// batch of in-range amounts cannot overflow `Decimal` when summed.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);

    if digits.is_empty()
        || digits.starts_with('.')
        || digits.ends_with('.')
        || !digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        || digits.matches('.').count() > 1
    {
        return None;
    }

    let (integer, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if integer.len() > MAX_INTEGER_DIGITS || fraction.len() > MAX_FRACTION_DIGITS {
        return None;
    }

    Decimal::from_str(s).ok()
}

/// Format amount in Brazilian style (1.234,56).
pub fn format_brl_amount(amount: Decimal) -> String {
    let s = format!("{:.2}", amount.abs());
    let Some((integer_part, decimal_part)) = s.split_once('.') else {
        return s;
    };

    // Add thousand separators
    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push('.');
        }
        formatted.push(*c);
    }

    let sign = if amount.is_sign_negative() && !amount.is_zero() { "-" } else { "" };
    format!("{}{},{}", sign, formatted, decimal_part)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount(" 100.00 "), Some(dec("100.00")));
        assert_eq!(parse_amount("18"), Some(dec("18")));
        assert_eq!(parse_amount("0.10"), Some(dec("0.1")));
        assert_eq!(parse_amount("-5.00"), Some(dec("-5")));
    }

    #[test]
    fn test_parse_amount_rejects_non_numeric() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("1,234.56"), None);
        assert_eq!(parse_amount("1234,56"), None);
        assert_eq!(parse_amount("1e3"), None);
        assert_eq!(parse_amount("1.2.3"), None);
        assert_eq!(parse_amount("."), None);
        assert_eq!(parse_amount("-"), None);
    }

    #[test]
    fn test_parse_amount_rejects_oversize_values() {
        assert_eq!(parse_amount("9999999999999.99"), Some(dec("9999999999999.99")));
        assert_eq!(parse_amount("10000000000000.00"), None);
        assert_eq!(parse_amount("79228162514264337593543950335"), None);
        assert_eq!(parse_amount("1.005"), None);
    }

    #[test]
    fn test_parse_keeps_scale() {
        // 100.00 and 100 compare equal but keep their own scale.
        assert_eq!(parse_amount("100.00").unwrap().scale(), 2);
    }

    #[test]
    fn test_format_brl_amount() {
        assert_eq!(format_brl_amount(dec("1234.56")), "1.234,56");
        assert_eq!(format_brl_amount(dec("12345678.9")), "12.345.678,90");
        assert_eq!(format_brl_amount(dec("18")), "18,00");
        assert_eq!(format_brl_amount(dec("-1500")), "-1.500,00");
        assert_eq!(format_brl_amount(Decimal::ZERO), "0,00");
    }
}
