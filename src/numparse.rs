// src/numparse.rs
//! Locale-aware numeric normalization for billing-sheet cells.
//!
//! The rules mirror what years of hand-maintained invoicing sheets actually
//! contain: currency symbols, non-breaking spaces, German thousands
//! separators, decimal commas and bare "-" placeholders for zero. The
//! ambiguous case (both '.' and ',' present) always reads '.' as thousands
//! separator; this misreads genuine US-locale decimals and is kept that way
//! on purpose, as observed behavior.

use crate::cell::CellValue;

/// Parses a locale-formatted numeric string.
///
/// Returns `None` for empty or unparseable input, `Some(0.0)` for the bare
/// "-" placeholder. Callers decide whether `None` means zero or null.
pub fn parse_locale_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '€' | '$' | ' ' | '\u{a0}' | '\u{202f}'))
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return None;
    }
    if cleaned == "-" {
        return Some(0.0);
    }

    let has_dot = cleaned.contains('.');
    let has_comma = cleaned.contains(',');

    let normalized = if has_dot && has_comma {
        // '.' is thousands, ',' is decimal.
        cleaned.replace('.', "").replace(',', ".")
    } else if has_comma {
        cleaned.replace(',', ".")
    } else {
        cleaned.to_string()
    };

    normalized.parse::<f64>().ok()
}

/// Numeric view of a cell: numbers pass through, text goes through the
/// locale parser, empty cells are null.
pub fn cell_number(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => parse_locale_number(s),
        CellValue::Empty => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn german_locale_formats() {
        assert_eq!(parse_locale_number("1.234,56"), Some(1234.56));
        assert_eq!(parse_locale_number("1234,56"), Some(1234.56));
        assert_eq!(parse_locale_number("12,5"), Some(12.5));
        assert_eq!(parse_locale_number("-1.234,56"), Some(-1234.56));
    }

    #[test]
    fn currency_and_whitespace_are_stripped() {
        assert_eq!(parse_locale_number("1.234,56 €"), Some(1234.56));
        assert_eq!(parse_locale_number("€\u{a0}500"), Some(500.0));
        assert_eq!(parse_locale_number("$ 99,9"), Some(99.9));
    }

    #[test]
    fn placeholders() {
        assert_eq!(parse_locale_number("-"), Some(0.0));
        assert_eq!(parse_locale_number(""), None);
        assert_eq!(parse_locale_number("   "), None);
        assert_eq!(parse_locale_number("n/a"), None);
    }

    #[test]
    fn plain_dot_decimals_pass_through() {
        assert_eq!(parse_locale_number("2.5"), Some(2.5));
        assert_eq!(parse_locale_number("1000"), Some(1000.0));
    }

    #[test]
    fn ambiguous_locale_reads_dot_as_thousands() {
        // Observed behavior, preserved: a genuine US "1,234.56" misparses
        // because '.' is dropped as thousands and ',' becomes the decimal.
        assert_eq!(parse_locale_number("1,234.56"), Some(1.23456));
    }

    #[test]
    fn cell_views() {
        assert_eq!(cell_number(&CellValue::Number(3.5)), Some(3.5));
        assert_eq!(
            cell_number(&CellValue::Text("1.234,5".to_string())),
            Some(1234.5)
        );
        assert_eq!(cell_number(&CellValue::Empty), None);
    }
}
