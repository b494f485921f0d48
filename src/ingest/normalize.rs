// Text cleanup and name normalization for catalog rows

use std::sync::OnceLock;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::constants::{AUTHOR_SEPARATOR, MAX_PUBLICATION_YEAR, MIN_PUBLICATION_YEAR};

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Trim a cell; blank cells become None
pub fn clean_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split an author cell on commas into trimmed, non-empty names
pub fn split_authors(cell: &str) -> Vec<String> {
    cell.split(AUTHOR_SEPARATOR)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

/// Comparison key for author names: lowercase, strip diacritics
/// (NFD then drop everything non-ASCII), collapse whitespace.
pub fn normalize_name(name: &str) -> String {
    let folded: String = name
        .to_lowercase()
        .nfd()
        .filter(|c| c.is_ascii())
        .collect();
    whitespace_re().replace_all(&folded, " ").trim().to_string()
}

/// Similarity between two names in [0, 1], case-insensitive.
/// Only used for duplicate hints; merging requires equal normalized names.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Parse an integer cell, accepting spreadsheet-style "1999.0"
fn parse_whole_number(cell: &str) -> Option<i64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(n);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(f as i64),
        _ => None,
    }
}

/// Publication year if it parses and falls within the plausible range
pub fn parse_year(cell: &str) -> Option<i32> {
    let year = parse_whole_number(cell)?;
    if year < MIN_PUBLICATION_YEAR as i64 || year > MAX_PUBLICATION_YEAR as i64 {
        return None;
    }
    Some(year as i32)
}

pub fn parse_copy_number(cell: &str) -> Option<i64> {
    parse_whole_number(cell)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_accents_and_case() {
        assert_eq!(normalize_name("José  María ARGUEDAS"), "jose maria arguedas");
        assert_eq!(normalize_name("Jose Maria Arguedas"), "jose maria arguedas");
        assert_eq!(normalize_name("Peña"), "pena");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_name("  Vallejo,\tCésar \n"), "vallejo, cesar");
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn test_normalize_drops_non_decomposable_letters() {
        // ø has no ASCII base under NFD and is dropped entirely
        assert_eq!(normalize_name("Søren"), "sren");
    }

    #[test]
    fn test_split_authors() {
        assert_eq!(
            split_authors(" Aho, Sethi ,, Ullman "),
            vec!["Aho".to_string(), "Sethi".to_string(), "Ullman".to_string()]
        );
        assert!(split_authors(" , ").is_empty());
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Redes  "), Some("Redes".to_string()));
        assert_eq!(clean_text(" \t"), None);
    }

    #[test]
    fn test_parse_year_range() {
        assert_eq!(parse_year("1999"), Some(1999));
        assert_eq!(parse_year("2004.0"), Some(2004));
        assert_eq!(parse_year("1799"), None);
        assert_eq!(parse_year("2031"), None);
        assert_eq!(parse_year("s.f."), None);
        assert_eq!(parse_year(""), None);
        assert_eq!(parse_year("1800"), Some(1800));
        assert_eq!(parse_year("2030"), Some(2030));
    }

    #[test]
    fn test_parse_copy_number() {
        assert_eq!(parse_copy_number("3"), Some(3));
        assert_eq!(parse_copy_number("2.0"), Some(2));
        assert_eq!(parse_copy_number("dos"), None);
    }

    #[test]
    fn test_similarity_ratio() {
        assert!((similarity_ratio("Knuth", "KNUTH") - 1.0).abs() < f64::EPSILON);
        assert!(similarity_ratio("Cormen", "Cormem") > 0.8);
        assert!(similarity_ratio("Cormen", "Sipser") < 0.5);
    }
}
