/// Normalised form of a badge identifier used for comparisons and as the
/// debounce key. Badge identifiers are compared case-insensitively.
pub fn badge_key(badge: &str) -> String {
    badge.trim().to_lowercase()
}

/// Case-insensitive badge comparison.
pub fn badges_match(a: &str, b: &str) -> bool {
    badge_key(a) == badge_key(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badge_key_folds_case_and_whitespace() {
        assert_eq!(badge_key(" A1001 "), "a1001");
        assert!(badges_match("a1001", "A1001"));
        assert!(!badges_match("A1001", "A1002"));
    }
}
