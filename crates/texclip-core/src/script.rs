//! Script detection
//!
//! Decides whether a formula needs the script-aware compiler and the
//! `ctex` package. The default predicate looks for CJK Unified Ideographs.

use std::ops::RangeInclusive;

/// CJK Unified Ideographs block (U+4E00..=U+9FFF)
pub const CJK_UNIFIED_IDEOGRAPHS: RangeInclusive<char> = '\u{4E00}'..='\u{9FFF}';

/// Returns true if `c` lies in the CJK Unified Ideographs block
pub fn is_cjk_ideograph(c: char) -> bool {
    CJK_UNIFIED_IDEOGRAPHS.contains(&c)
}

/// Returns true if the text contains at least one CJK unified ideograph
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk_ideograph)
}

/// Predicate deciding whether a formula requires extended script support
///
/// Implementations must be pure: the same text always yields the same answer,
/// otherwise document synthesis stops being deterministic.
pub trait ScriptPredicate: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Check whether `text` contains characters the standard compiler cannot shape
    fn requires_script_support(&self, text: &str) -> bool;
}

/// Default predicate: any character in U+4E00..=U+9FFF
#[derive(Debug, Clone, Copy, Default)]
pub struct CjkIdeographs;

impl ScriptPredicate for CjkIdeographs {
    fn name(&self) -> &'static str {
        "cjk"
    }

    fn requires_script_support(&self, text: &str) -> bool {
        contains_cjk(text)
    }
}
