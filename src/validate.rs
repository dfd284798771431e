//! Safety validation of generated SQL.
//!
//! The check is a deliberately naive uppercase substring scan over a fixed
//! keyword list. It can false-positive on a keyword appearing inside a
//! string literal or identifier; that matches the observable rejection
//! behavior of the system this guards and must not be "fixed" by
//! tokenizing.

/// Statement keywords that mutate data or schema, scanned in this order.
pub const FORBIDDEN_KEYWORDS: [&str; 6] =
    ["INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER"];

/// Return the first forbidden keyword contained in the SQL text, if any.
///
/// Case-insensitive substring match, short-circuiting on the first hit.
/// Deterministic because [`FORBIDDEN_KEYWORDS`] is scanned in fixed order.
pub fn find_forbidden_keyword(sql: &str) -> Option<&'static str> {
    let upper = sql.to_uppercase();
    FORBIDDEN_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| upper.contains(keyword))
}

/// The `sql_error` reason recorded when a forbidden keyword is found.
pub fn forbidden_reason(keyword: &str) -> String {
    format!("SQL包含危险操作：{keyword}")
}

/// The `sql_error` reason recorded when no SQL was produced at all.
pub const NOT_GENERATED_REASON: &str = "SQL未生成或生成失败";

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_select_passes() {
        assert_eq!(
            find_forbidden_keyword("SELECT name, cap FROM stocks ORDER BY cap DESC LIMIT 3"),
            None
        );
    }

    #[test]
    fn test_each_keyword_rejected() {
        for keyword in FORBIDDEN_KEYWORDS {
            let sql = format!("{keyword} something");
            assert_eq!(find_forbidden_keyword(&sql), Some(keyword));
        }
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(find_forbidden_keyword("drop table stocks"), Some("DROP"));
        assert_eq!(find_forbidden_keyword("Delete From t"), Some("DELETE"));
    }

    #[test]
    fn test_fixed_scan_order() {
        // Both INSERT and DROP present: INSERT comes first in the list.
        assert_eq!(
            find_forbidden_keyword("DROP TABLE t; INSERT INTO t VALUES (1)"),
            Some("INSERT")
        );
    }

    #[test]
    fn test_substring_false_positive_is_preserved() {
        // Keyword inside a string literal still rejects; known limitation
        // of the substring scan, kept intentionally.
        assert_eq!(
            find_forbidden_keyword("SELECT * FROM log WHERE note = 'last UPDATE at noon'"),
            Some("UPDATE")
        );
    }

    #[test]
    fn test_forbidden_reason_names_keyword() {
        assert_eq!(forbidden_reason("DROP"), "SQL包含危险操作：DROP");
    }
}
