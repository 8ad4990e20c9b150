// src/purpose.rs
//! Purpose (Zweck) extraction from sub-project labels.

use once_cell::sync::Lazy;
use regex::Regex;

static NUMERIC_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+_?").unwrap());

/// Extracts the purpose from a sub-project label.
///
/// The purpose is the substring after the *last* hyphen, trimmed, with a
/// leading numeric-plus-underscore prefix stripped ("12_Analysis" →
/// "Analysis"). Labels without a hyphen carry no purpose. Labels that strip
/// down to nothing carry no purpose either; an empty mapping key would be
/// useless.
pub fn extract_purpose(label: &str) -> Option<String> {
    let (_, tail) = label.rsplit_once('-')?;
    let tail = tail.trim();
    let stripped = NUMERIC_PREFIX.replace(tail, "");
    let purpose = stripped.trim();
    if purpose.is_empty() {
        None
    } else {
        Some(purpose.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_numeric_prefix() {
        assert_eq!(
            extract_purpose("P100 - 12_Analysis"),
            Some("Analysis".to_string())
        );
        assert_eq!(
            extract_purpose("P100 - 20_Meeting"),
            Some("Meeting".to_string())
        );
    }

    #[test]
    fn takes_segment_after_last_hyphen() {
        assert_eq!(extract_purpose("A-B-Planung"), Some("Planung".to_string()));
    }

    #[test]
    fn no_hyphen_means_no_purpose() {
        assert_eq!(extract_purpose("Verwaltung"), None);
    }

    #[test]
    fn empty_tail_means_no_purpose() {
        assert_eq!(extract_purpose("P100 - 12_"), None);
        assert_eq!(extract_purpose("P100 -   "), None);
    }

    #[test]
    fn prefix_without_underscore() {
        assert_eq!(extract_purpose("X - 7Audit"), Some("Audit".to_string()));
    }
}
