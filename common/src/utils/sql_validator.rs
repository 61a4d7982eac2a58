//! SQL statement validator.
//!
//! Reports only ever read. Statements are checked on their code portion:
//! string literals, quoted identifiers and comments are masked out first so
//! that `SELECT 'drop?'` is neither rejected nor seen as having a
//! placeholder.

use crate::errors::QueryError;

/// Validates SQL statements before they reach the database.
pub struct SqlValidator;

/// Operations a report statement may never perform. A word followed by `(`
/// is a function call (`TRUNCATE(price, 2)`) and is not an operation.
const FORBIDDEN_KEYWORDS: [&str; 4] = ["DROP", "TRUNCATE", "DELETE", "ALTER"];

/// Keywords a report statement may start with.
const READ_KEYWORDS: [&str; 6] = ["SELECT", "WITH", "SHOW", "DESCRIBE", "DESC", "EXPLAIN"];

/// Statement verbs that can follow the common table expressions of a
/// `WITH`; only `SELECT` and `TABLE` read.
const WITH_VERBS: [&str; 6] = ["SELECT", "TABLE", "INSERT", "UPDATE", "DELETE", "REPLACE"];

/// A bare word of masked SQL with its parenthesis depth.
struct Word<'a> {
    text: &'a str,
    depth: usize,
    call: bool,
}

impl SqlValidator {
    /// Validates a statement for use in a report.
    ///
    /// # Errors
    /// Returns `QueryError::Unsafe` if the statement is empty, contains more
    /// than one statement, writes data, or is not a read query.
    pub fn validate(sql: &str) -> Result<(), QueryError> {
        let code = mask(sql).to_uppercase();

        let statements = code
            .split(';')
            .filter(|s| !s.trim().is_empty())
            .count();
        if statements == 0 {
            return Err(QueryError::Unsafe("empty statement".into()));
        }
        if statements > 1 {
            return Err(QueryError::Unsafe("multiple statements are not allowed".into()));
        }

        let words = words(&code);

        if let Some(word) = words
            .iter()
            .find(|w| !w.call && FORBIDDEN_KEYWORDS.contains(&w.text))
        {
            return Err(QueryError::Unsafe(format!("forbidden operation: {}", word.text)));
        }
        if words.windows(2).any(|w| {
            w[0].text == "INTO" && (w[1].text == "OUTFILE" || w[1].text == "DUMPFILE")
        }) {
            return Err(QueryError::Unsafe("forbidden operation: INTO OUTFILE".into()));
        }

        if !Self::is_read_only(sql) {
            return Err(QueryError::Unsafe(
                "only read queries are allowed for reports".into(),
            ));
        }

        // WITH ... UPDATE / DELETE is a write
        if words.first().is_some_and(|w| w.text == "WITH") {
            let verb = words
                .iter()
                .skip(1)
                .find(|w| w.depth == 0 && WITH_VERBS.contains(&w.text))
                .map(|w| w.text);
            match verb {
                Some("SELECT") | Some("TABLE") => {}
                Some(verb) => {
                    return Err(QueryError::Unsafe(format!("forbidden operation: {}", verb)))
                }
                None => {
                    return Err(QueryError::Unsafe(
                        "only read queries are allowed for reports".into(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Checks if the statement starts with a read keyword.
    pub fn is_read_only(sql: &str) -> bool {
        let code = mask(sql);
        let first = code
            .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
            .split(|c: char| !c.is_alphanumeric())
            .next()
            .unwrap_or("")
            .to_uppercase();
        READ_KEYWORDS.contains(&first.as_str())
    }

    /// Counts `?` placeholders outside literals and comments.
    pub fn count_placeholders(sql: &str) -> usize {
        mask(sql).chars().filter(|c| *c == '?').count()
    }
}

/// Splits masked SQL into words, noting the parenthesis depth of each and
/// whether it is immediately called like a function.
fn words(code: &str) -> Vec<Word<'_>> {
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;

    for (i, c) in code.char_indices().chain(std::iter::once((code.len(), ' '))) {
        if c.is_alphanumeric() || c == '_' {
            start.get_or_insert(i);
            continue;
        }
        if let Some(s) = start.take() {
            words.push(Word {
                text: &code[s..i],
                depth,
                call: code[i..].trim_start().starts_with('('),
            });
        }
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    words
}

/// Replaces literals, quoted identifiers and comments with a single space.
///
/// MySQL executable comments (`/*! ... */`) are kept, since the server runs
/// their content.
fn mask(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '\'' | '"' | '`' => {
                i = skip_quoted(&chars, i, c);
                out.push(' ');
            }
            '#' => {
                i = skip_line(&chars, i);
                out.push(' ');
            }
            '-' if next == Some('-')
                && chars.get(i + 2).map_or(true, |c| c.is_whitespace()) =>
            {
                i = skip_line(&chars, i);
                out.push(' ');
            }
            '/' if next == Some('*') && chars.get(i + 2) != Some(&'!') => {
                i = skip_block_comment(&chars, i);
                out.push(' ');
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn skip_quoted(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && quote != '`' {
            i += 2;
            continue;
        }
        if c == quote {
            // doubled quote is an escaped quote
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn skip_line(chars: &[char], start: usize) -> usize {
    chars[start..]
        .iter()
        .position(|c| *c == '\n')
        .map_or(chars.len(), |p| start + p + 1)
}

fn skip_block_comment(chars: &[char], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_allowed() {
        assert!(SqlValidator::validate("SELECT * FROM sales").is_ok());
        assert!(SqlValidator::validate("  (select 1)").is_ok());
        assert!(SqlValidator::validate("WITH d AS (SELECT 1 AS x) SELECT x FROM d;").is_ok());
    }

    #[test]
    fn test_writes_are_forbidden() {
        assert!(SqlValidator::validate("DROP TABLE sales").is_err());
        assert!(SqlValidator::validate("delete from sales").is_err());
        assert!(SqlValidator::validate("SELECT * FROM t INTO OUTFILE '/tmp/x'").is_err());
        assert!(SqlValidator::validate("WITH x AS (SELECT 1) UPDATE t SET a = 1").is_err());
    }

    #[test]
    fn test_keywords_in_literals_are_ignored() {
        assert!(SqlValidator::validate("SELECT 'drop table' AS note, `update` FROM t").is_ok());
        assert!(SqlValidator::validate("SELECT 1 -- delete everything\n").is_ok());
    }

    #[test]
    fn test_function_calls_named_like_writes_are_allowed() {
        assert!(SqlValidator::validate(
            "SELECT REPLACE(name, '-', ' ') AS product, price FROM products"
        )
        .is_ok());
        assert!(SqlValidator::validate("SELECT TRUNCATE(total_amount, 1) FROM sales").is_ok());
        assert!(SqlValidator::validate("SELECT INSERT(name, 1, 2, 'x') FROM products").is_ok());
        assert!(SqlValidator::validate("SELECT load, replace_count FROM host_stats").is_ok());
    }

    #[test]
    fn test_with_must_end_in_select() {
        assert!(SqlValidator::validate(
            "WITH RECURSIVE d (n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM d WHERE n < 5) \
             SELECT n FROM d"
        )
        .is_ok());
        let err = SqlValidator::validate("WITH x AS (SELECT 1) DELETE FROM t").unwrap_err();
        assert!(err.to_string().contains("DELETE"));
        assert!(
            SqlValidator::validate("WITH x AS (SELECT 1) REPLACE INTO t SELECT * FROM x").is_err()
        );
    }

    #[test]
    fn test_multiple_statements_are_rejected() {
        let err = SqlValidator::validate("SELECT 1; SELECT 2").unwrap_err();
        assert!(err.to_string().contains("multiple statements"));
        assert!(SqlValidator::validate("  ").is_err());
    }

    #[test]
    fn test_non_read_statement_is_rejected() {
        assert!(SqlValidator::validate("SET @a = 1").is_err());
        assert!(SqlValidator::is_read_only("SHOW TABLES"));
        assert!(!SqlValidator::is_read_only("CALL proc()"));
    }

    #[test]
    fn test_count_placeholders() {
        assert_eq!(
            SqlValidator::count_placeholders(
                "SELECT * FROM sales WHERE sale_date BETWEEN ? AND ?"
            ),
            2
        );
        assert_eq!(
            SqlValidator::count_placeholders(
                "SELECT '?', \"it\\'s ?\", `?` /* ? */ FROM t # ?\nWHERE a = ?"
            ),
            1
        );
        assert_eq!(SqlValidator::count_placeholders("SELECT 'it''s ?' , ?"), 1);
    }
}
