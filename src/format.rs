//! Final result formatting.
//!
//! Pure given its inputs: the same execution outcome always formats to
//! byte-identical output.

use crate::state::ExecOutcome;

/// Substituted when the agent's raw output is empty.
pub const EMPTY_RESULT_TEXT: &str = "未查询到符合条件的数据";

/// Fallback reason when a failed run recorded no `sql_error`.
pub const UNKNOWN_ERROR_TEXT: &str = "未知错误";

/// Heading of the presentation block wrapping successful results.
pub const RESULT_HEADING: &str = "### 🎯 查询结果";

/// Turn an execution outcome (or the error reason of a failed run) into
/// the user-facing result text.
///
/// No outcome means the run failed before or during execution; the message
/// then references `sql_error`, defaulting to [`UNKNOWN_ERROR_TEXT`].
pub fn format_result(exec: Option<&ExecOutcome>, sql_error: Option<&str>) -> String {
    let Some(outcome) = exec else {
        let reason = sql_error.unwrap_or(UNKNOWN_ERROR_TEXT);
        return format!("查询失败：{reason}");
    };

    let raw = outcome.raw_output.trim();
    let body = if raw.is_empty() {
        EMPTY_RESULT_TEXT.to_string()
    } else if raw.to_lowercase().contains("error") {
        format!("查询出现错误：{raw}")
    } else {
        raw.to_string()
    };

    format!("{RESULT_HEADING}\n{body}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outcome(raw: &str) -> ExecOutcome {
        ExecOutcome::new(raw, Vec::new())
    }

    #[test]
    fn test_success_wraps_trimmed_output_in_heading() {
        let formatted = format_result(Some(&outcome("  3 rows...  ")), None);
        assert_eq!(formatted, "### 🎯 查询结果\n3 rows...\n");
    }

    #[test]
    fn test_empty_output_substituted() {
        let formatted = format_result(Some(&outcome("   ")), None);
        assert_eq!(formatted, format!("{RESULT_HEADING}\n{EMPTY_RESULT_TEXT}\n"));
    }

    #[test]
    fn test_error_substring_is_prefixed() {
        let formatted = format_result(Some(&outcome("Error: no such table")), None);
        assert!(formatted.contains("查询出现错误：Error: no such table"));
    }

    #[test]
    fn test_missing_outcome_references_sql_error() {
        let formatted = format_result(None, Some("SQL包含危险操作：DROP"));
        assert_eq!(formatted, "查询失败：SQL包含危险操作：DROP");
    }

    #[test]
    fn test_missing_outcome_without_reason_uses_unknown() {
        assert_eq!(format_result(None, None), "查询失败：未知错误");
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let exec = outcome("top 3 stocks by cap");
        let first = format_result(Some(&exec), None);
        let second = format_result(Some(&exec), None);
        assert_eq!(first, second);
    }
}
