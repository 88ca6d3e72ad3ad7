//! Display-name normalization for fuzzy matching.
//!
//! Release names on disk carry noise: sizes (`60GB`), brackets, dots and
//! dashes. Normalization drops the sizes and the punctuation but keeps the
//! words, so repack tags like `[FG]` survive as `fg`.

use std::sync::LazyLock;

use regex::Regex;

/// Tokens shorter than this are ignored by token-overlap scoring.
pub const MIN_SIGNIFICANT_TOKEN_LEN: usize = 3;

static SIZE_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*(?:gb|mb|tb)\b").expect("size annotation regex is valid")
});

/// Normalize a display or directory name.
///
/// Lower-cases, strips size annotations, replaces punctuation with spaces
/// and collapses whitespace. Idempotent: `normalize_name(normalize_name(s))
/// == normalize_name(s)`.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let without_sizes = SIZE_ANNOTATION.replace_all(&lowered, " ");

    let cleaned: String = without_sizes
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    // Punctuation removal can expose new size tokens ("1.5-GB" -> "1 5 gb"),
    // so strip again until nothing matches.
    let mut current = collapse_whitespace(&cleaned);
    loop {
        let next = collapse_whitespace(&SIZE_ANNOTATION.replace_all(&current, " "));
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Tokens of the normalized name that are long enough to score.
pub fn significant_tokens(normalized: &str) -> Vec<&str> {
    normalized
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_SIGNIFICANT_TOKEN_LEN)
        .collect()
}

/// Filesystem-safe slug for per-item working directories.
pub fn slug(name: &str) -> String {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return "item".to_string();
    }
    normalized.replace(' ', "-")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_size_keeps_repack_tag() {
        assert_eq!(
            normalize_name("Cyberpunk 2077 60GB [FG]"),
            "cyberpunk 2077 fg"
        );
    }

    #[test]
    fn test_size_variants() {
        assert_eq!(normalize_name("Game 1.5 gb"), "game");
        assert_eq!(normalize_name("Game (700MB)"), "game");
        assert_eq!(normalize_name("Game 2TB Edition"), "game edition");
    }

    #[test]
    fn test_punctuation_and_whitespace() {
        assert_eq!(
            normalize_name("  The.Witcher_3 -- Wild   Hunt!! "),
            "the witcher 3 wild hunt"
        );
    }

    #[test]
    fn test_size_exposed_by_punctuation_is_removed() {
        assert_eq!(normalize_name("Game 1.5-GB"), "game 1");
        let once = normalize_name("Game 1 5-gb gb");
        assert_eq!(normalize_name(&once), once);
    }

    #[test]
    fn test_idempotent_over_samples() {
        let samples = [
            "Cyberpunk 2077 60GB [FG]",
            "Red Dead Redemption 2 - v1436.28 [DODI Repack] 119.5 GB",
            "NVIDIA Driver 551.86",
            "a1b2 3gb4 5 GB gb",
            "Ünïcödé Spïel (12 MB)",
            "",
            "   ",
            "...---...",
        ];
        for sample in samples {
            let once = normalize_name(sample);
            assert_eq!(normalize_name(&once), once, "sample: {sample:?}");
        }
    }

    #[test]
    fn test_significant_tokens_ignore_short_words() {
        let normalized = normalize_name("GTA V of the Year 3");
        assert_eq!(significant_tokens(&normalized), vec!["gta", "the", "year"]);
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Cyberpunk 2077 [FG]"), "cyberpunk-2077-fg");
        assert_eq!(slug("!!!"), "item");
    }
}
