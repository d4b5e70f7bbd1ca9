// src/openings.rs
// Shared opening-name normalization used by every aggregation builder: family
// extraction from the full `Opening` tag, whitelist membership, and the
// White/Black color heuristic.

use regex::Regex;
use std::sync::OnceLock;

use crate::config;

fn trailing_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*#\d+\s*$").unwrap())
}

/// `"Sicilian Defense: Najdorf Variation #3"` -> `"Sicilian Defense"`. The
/// family is everything before the first `:`, with any trailing `#<digits>`
/// numbering suffix stripped first.
pub fn opening_root(full_name: &str) -> String {
    let stripped = trailing_number_re().replace(full_name, "");
    stripped
        .split(':')
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

/// The portion after the first `:`, trimmed -- the named variation, if any.
/// Unlike `opening_root`, this does not strip a trailing `#<digits>`
/// numbering suffix: the variant text is taken verbatim from `full_name`.
pub fn opening_variant(full_name: &str) -> Option<String> {
    let mut parts = full_name.splitn(2, ':');
    parts.next();
    parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn is_whitelisted(family: &str) -> bool {
    config::OPENING_WHITELIST.iter().any(|w| *w == family)
}

/// Folds non-whitelisted families into `"Other"`; whitelisted families pass
/// through unchanged.
pub fn normalize_family(family: &str) -> String {
    if is_whitelisted(family) {
        family.to_string()
    } else {
        config::OTHER_LABEL.to_string()
    }
}

/// Case-insensitive substring match against the Black-defense family tokens.
/// This is a naming heuristic, not a rules check: "King's Gambit" (a White
/// opening) doesn't match any token, "Sicilian Defense" matches "Defense".
pub fn is_black_opening(family: &str) -> bool {
    let lower = family.to_lowercase();
    config::BLACK_DEFENSE_TOKENS
        .iter()
        .any(|t| lower.contains(&t.to_lowercase()))
}

pub fn rating_bracket(avg_elo: Option<f64>, brackets: &[(&'static str, std::ops::Range<u32>)]) -> Option<&'static str> {
    let elo = avg_elo? as u32;
    brackets
        .iter()
        .find(|(_, range)| range.contains(&elo))
        .map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_strips_variant_and_numbering() {
        assert_eq!(opening_root("Sicilian Defense: Najdorf Variation #3"), "Sicilian Defense");
        assert_eq!(opening_root("Italian Game"), "Italian Game");
        assert_eq!(opening_root("Queen's Pawn Game #12"), "Queen's Pawn Game");
    }

    #[test]
    fn variant_extracts_trailing_segment() {
        assert_eq!(
            opening_variant("Sicilian Defense: Najdorf Variation"),
            Some("Najdorf Variation".to_string())
        );
        assert_eq!(opening_variant("Italian Game"), None);
    }

    #[test]
    fn variant_keeps_trailing_numbering_suffix() {
        assert_eq!(
            opening_variant("Sicilian Defense: Najdorf Variation #3"),
            Some("Najdorf Variation #3".to_string())
        );
    }

    #[test]
    fn black_defense_heuristic() {
        assert!(is_black_opening("Sicilian Defense"));
        assert!(is_black_opening("King's Indian Defense"));
        assert!(!is_black_opening("King's Gambit"));
        assert!(!is_black_opening("Italian Game"));
    }

    #[test]
    fn non_whitelisted_folds_to_other() {
        assert_eq!(normalize_family("Some Obscure Gambit"), "Other");
        assert_eq!(normalize_family("Italian Game"), "Italian Game");
    }
}
