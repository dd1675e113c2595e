//! Font size estimation
//!
//! Formulas are not measured; their size is picked from the number of
//! visible glyphs, so short snippets come out larger than long ones.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::RenderConfig;
use crate::script::is_cjk_ideograph;

/// Font size bonus for very short formulas
const SHORT_BONUS: u32 = 6;
/// Reduction for long formulas
const LONG_PENALTY: u32 = 2;
/// Reduction for very long formulas
const VERY_LONG_PENALTY: u32 = 4;

/// Approximate the number of glyphs a formula will show
///
/// Command sequences with a braced argument (`\text{...}`) are dropped
/// first, then bare commands (`\alpha`), then everything that is neither
/// ASCII alphanumeric nor a CJK unified ideograph.
pub fn visible_glyph_count(text: &str) -> usize {
    static COMMAND_WITH_ARG_RE: OnceLock<Regex> = OnceLock::new();
    static COMMAND_RE: OnceLock<Regex> = OnceLock::new();

    let with_arg = COMMAND_WITH_ARG_RE.get_or_init(|| Regex::new(r"\\[a-zA-Z]+\{.*?\}").unwrap());
    let bare = COMMAND_RE.get_or_init(|| Regex::new(r"\\[a-zA-Z]+").unwrap());

    let stripped = with_arg.replace_all(text, "");
    let stripped = bare.replace_all(&stripped, "");

    stripped
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || is_cjk_ideograph(*c))
        .count()
}

/// Pick a font size in `[min_font_size, max_font_size]` for the formula
pub fn estimate_font_size(text: &str, config: &RenderConfig) -> u32 {
    let length = visible_glyph_count(text);
    let default = config.default_font_size;

    let size = match length {
        0..=5 => config.max_font_size.min(default.saturating_add(SHORT_BONUS)),
        6..=10 => default,
        11..=20 => config
            .min_font_size
            .max(default.saturating_sub(LONG_PENALTY)),
        _ => config
            .min_font_size
            .max(default.saturating_sub(VERY_LONG_PENALTY)),
    };

    tracing::debug!(glyphs = length, font_size = size, "Estimated font size");
    size
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of_len(n: usize) -> String {
        "a".repeat(n)
    }

    #[test]
    fn test_single_glyph_gets_bonus() {
        let config = RenderConfig::default();
        assert_eq!(estimate_font_size("x", &config), 18);
    }

    #[test]
    fn test_bucket_thresholds() {
        let config = RenderConfig::default();
        assert_eq!(estimate_font_size(&text_of_len(5), &config), 18);
        assert_eq!(estimate_font_size(&text_of_len(6), &config), 12);
        assert_eq!(estimate_font_size(&text_of_len(10), &config), 12);
        assert_eq!(estimate_font_size(&text_of_len(11), &config), 10);
        assert_eq!(estimate_font_size(&text_of_len(20), &config), 10);
        assert_eq!(estimate_font_size(&text_of_len(21), &config), 8);
    }

    #[test]
    fn test_bonus_clamped_to_max() {
        let config = RenderConfig {
            default_font_size: 70,
            ..RenderConfig::default()
        };
        assert_eq!(estimate_font_size("x", &config), 72);
    }

    #[test]
    fn test_penalty_clamped_to_min() {
        let config = RenderConfig {
            default_font_size: 9,
            ..RenderConfig::default()
        };
        assert_eq!(estimate_font_size(&text_of_len(15), &config), 8);
        assert_eq!(estimate_font_size(&text_of_len(30), &config), 8);
    }

    #[test]
    fn test_monotonic_and_bounded() {
        for default in [8, 10, 12, 40, 70, 72] {
            let config = RenderConfig {
                default_font_size: default,
                ..RenderConfig::default()
            };
            let mut previous = u32::MAX;
            for n in 0..40 {
                let size = estimate_font_size(&text_of_len(n), &config);
                assert!(size <= previous, "size grew at length {n}");
                assert!((config.min_font_size..=config.max_font_size).contains(&size));
                previous = size;
            }
        }
    }

    #[test]
    fn test_commands_with_arguments_are_ignored() {
        // `\frac{a}` is dropped as one token, leaving `{b}`
        assert_eq!(visible_glyph_count(r"\frac{a}{b}"), 1);
        assert_eq!(visible_glyph_count(r"\mathrm{d}x"), 1);
    }

    #[test]
    fn test_bare_commands_are_ignored() {
        assert_eq!(visible_glyph_count(r"\alpha + \beta"), 0);
        assert_eq!(visible_glyph_count(r"\sum_{i=1}^{n} i"), 4);
    }

    #[test]
    fn test_punctuation_is_ignored() {
        assert_eq!(visible_glyph_count("x^2+y^2=z^2"), 6);
        assert_eq!(visible_glyph_count("  ( ) [ ] "), 0);
    }

    #[test]
    fn test_cjk_counts_as_glyphs() {
        assert_eq!(visible_glyph_count("速度 v"), 3);
        // Non-ASCII letters outside the ideograph block do not count
        assert_eq!(visible_glyph_count("é ß π"), 0);
    }

    #[test]
    fn test_argument_match_stops_at_line_end() {
        // `.` does not cross newlines, so the unterminated argument survives
        assert_eq!(visible_glyph_count("\\text{ab\ncd}"), 4);
    }

    #[test]
    fn test_bonus_saturates_at_u32_max() {
        let config = RenderConfig {
            default_font_size: u32::MAX - 2,
            max_font_size: u32::MAX,
            ..RenderConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(estimate_font_size("x", &config), u32::MAX);
    }
}
