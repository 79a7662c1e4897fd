//! # Text Normalization
//!
//! Accent- and case-insensitive folding for catalog and customer search.
//!
//! Product and customer names in a Spanish-speaking store carry accents
//! ("Café", "Azúcar") that cashiers rarely type. Search therefore compares
//! folded forms: NFD-decompose, strip combining marks, lowercase.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Folds a string for flexible matching: removes accents and lowercases.
///
/// ## Example
/// ```rust
/// use almacen_core::text::fold_for_search;
///
/// assert_eq!(fold_for_search("Café Molido"), "cafe molido");
/// assert_eq!(fold_for_search("AZÚCAR"), "azucar");
/// ```
pub fn fold_for_search(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// True when `haystack` contains `needle` after folding both sides.
pub fn matches_search(haystack: &str, needle: &str) -> bool {
    fold_for_search(haystack).contains(&fold_for_search(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_accents_and_case() {
        assert_eq!(fold_for_search("Café"), "cafe");
        assert_eq!(fold_for_search("Jamón Crudo"), "jamon crudo");
        // NFD decomposes ñ into n + combining tilde, so it folds to plain n.
        assert_eq!(fold_for_search("ÑANDÚ"), "nandu");
    }

    #[test]
    fn test_matches_search() {
        assert!(matches_search("Café Molido", "cafe"));
        assert!(matches_search("Azúcar", "azu"));
        assert!(!matches_search("Azúcar", "cafe"));
    }
}
