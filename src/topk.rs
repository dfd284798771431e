//! Top-K extraction from free-text questions.
//!
//! Questions like "前10个股票" or "top 3 holdings" carry an explicit row
//! limit. Patterns are tried in priority order; the first match wins and is
//! clamped to the allowed range. Absent any hint the default applies.

use regex::Regex;
use std::sync::LazyLock;

/// Row limit used when the question carries no hint.
pub const DEFAULT_TOP_K: u32 = 5;
/// Smallest accepted row limit.
pub const MIN_TOP_K: u32 = 1;
/// Largest accepted row limit.
pub const MAX_TOP_K: u32 = 50;

// Priority order matters: "前N个" must win over the looser "N个".
static TOP_K_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"前\s*(\d+)\s*个",
        r"(?i)top\s*(\d+)",
        r"前\s*(\d+)",
        r"(\d+)\s*个",
        r"(\d+)\s*条",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("top-k pattern is valid"))
    .collect()
});

/// Extract the requested row count from a question, clamped to
/// [[`MIN_TOP_K`], [`MAX_TOP_K`]], defaulting to [`DEFAULT_TOP_K`].
///
/// Pure and total: unparseable or missing hints fall back to the default.
pub fn extract_top_k(query: &str) -> u32 {
    extract_top_k_in(query, DEFAULT_TOP_K, MIN_TOP_K, MAX_TOP_K)
}

/// [`extract_top_k`] with caller-supplied default and clamp bounds.
pub fn extract_top_k_in(query: &str, default: u32, min: u32, max: u32) -> u32 {
    for pattern in TOP_K_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(query) {
            if let Ok(top_k) = caps[1].parse::<u32>() {
                return top_k.clamp(min, max);
            }
            // Digits too large for u32: treat like a parse failure and
            // fall through to the next pattern, as the source system does.
        }
    }
    default
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_qian_n_ge() {
        assert_eq!(extract_top_k("前10个股票"), 10);
        assert_eq!(extract_top_k("前 3 个基金"), 3);
    }

    #[test]
    fn test_top_n_case_insensitive() {
        assert_eq!(extract_top_k("Top 7 holdings"), 7);
        assert_eq!(extract_top_k("top3 stocks"), 3);
        assert_eq!(extract_top_k("TOP 12"), 12);
    }

    #[test]
    fn test_bare_qian_n() {
        assert_eq!(extract_top_k("前20市值最高"), 20);
    }

    #[test]
    fn test_n_ge_and_n_tiao() {
        assert_eq!(extract_top_k("显示8个结果"), 8);
        assert_eq!(extract_top_k("查找15条数据"), 15);
    }

    #[test]
    fn test_no_hint_defaults_to_five() {
        assert_eq!(extract_top_k("查询机构持仓"), 5);
        assert_eq!(extract_top_k(""), 5);
    }

    #[test]
    fn test_clamped_to_bounds() {
        assert_eq!(extract_top_k("显示999条"), 50);
        assert_eq!(extract_top_k("前0个"), 1);
    }

    #[test]
    fn test_priority_first_match_wins() {
        // "前3个" outranks the trailing "10条"
        assert_eq!(extract_top_k("前3个股票，不要超过10条"), 3);
    }

    #[test]
    fn test_custom_bounds() {
        assert_eq!(extract_top_k_in("前100个", 5, 1, 200), 100);
        assert_eq!(extract_top_k_in("没有数字", 7, 1, 50), 7);
    }
}
