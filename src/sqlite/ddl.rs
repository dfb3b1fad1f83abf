use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DriverError, ErrorCode};

/// A `STRING`/`BYTES` column type (optionally sized) between the column name and the next
/// delimiter or constraint.
static SIZED_TYPE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\w\s+)(STRING|BYTES)(?:\s*\(\s*(?:MAX|\d+)\s*\))?(\s*(?:,|\)|NOT\b|PRIMARY\b|UNIQUE\b|DEFAULT\b|$))",
    )
});

static DDL_PREFIX: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(CREATE|ALTER)\b"));

fn compiled(
    re: &'static LazyLock<Result<Regex, regex::Error>>,
) -> Result<&'static Regex, DriverError> {
    re.as_ref().map_err(|err| {
        DriverError::backend(ErrorCode::Internal, format!("invalid DDL pattern: {err}"))
    })
}

/// Rewrite column types of a `CREATE`/`ALTER` statement into names `SQLite` accepts and
/// gives the right affinity: `STRING(n)` becomes `TEXT`, `BYTES(n)` becomes `BLOB`.
///
/// Other statements are returned untouched.
///
/// # Errors
/// `Internal` if a rewrite pattern fails to compile.
pub fn translate(sql: &str) -> Result<Cow<'_, str>, DriverError> {
    if !compiled(&DDL_PREFIX)?.is_match(sql) {
        return Ok(Cow::Borrowed(sql));
    }
    Ok(compiled(&SIZED_TYPE)?.replace_all(sql, |caps: &regex::Captures<'_>| {
        let target = if caps[2].eq_ignore_ascii_case("STRING") {
            "TEXT"
        } else {
            "BLOB"
        };
        format!("{}{target}{}", &caps[1], &caps[3])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sized_types_become_sqlite_types() {
        let sql = translate(
            "CREATE TABLE t (id INT64 NOT NULL PRIMARY KEY, s STRING(MAX), n string(16), b BYTES( 1024 ), c BYTES)",
        )
        .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE t (id INT64 NOT NULL PRIMARY KEY, s TEXT, n TEXT, b BLOB, c BLOB)"
        );
        assert_eq!(
            translate("ALTER TABLE t ADD COLUMN x STRING(10)").unwrap(),
            "ALTER TABLE t ADD COLUMN x TEXT"
        );
    }

    #[test]
    fn identifiers_named_like_types_are_kept() {
        assert_eq!(
            translate("CREATE TABLE bytes (string INT64, v STRING(MAX) NOT NULL)").unwrap(),
            "CREATE TABLE bytes (string INT64, v TEXT NOT NULL)"
        );
    }

    #[test]
    fn other_statements_pass_through() {
        let sql = "INSERT INTO t (s) VALUES ('STRING(MAX)')";
        assert!(matches!(translate(sql).unwrap(), Cow::Borrowed(s) if s == sql));
        assert_eq!(
            translate("CREATE UNIQUE INDEX strings_idx ON t (f2)").unwrap(),
            "CREATE UNIQUE INDEX strings_idx ON t (f2)"
        );
    }
}
