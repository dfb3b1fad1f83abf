//! Placeholder compiler.
//!
//! Rewrites positional `?` and numbered `$N` placeholders into the backend's named
//! `@param_N` syntax in a single left-to-right pass. Quotes and comments are not tracked: a
//! placeholder inside a string literal is rewritten like any other. Prefix a byte with `\`
//! to keep it verbatim.

mod scanner;

use std::collections::HashMap;

use scanner::scan_index;

use crate::backend::BoundStatement;
use crate::error::DriverError;
use crate::types::Value;

/// Backend parameter name for a 1-based parameter index.
#[must_use]
pub fn param_name(index: usize) -> String {
    format!("param_{index}")
}

/// Result of compiling a query: rewritten SQL plus parameter names by position.
///
/// `params()[i]` names the backend parameter that receives the caller's `i`-th argument.
/// A slot no placeholder referenced (e.g. slot 0 of `"... $2"`) has an empty name; the
/// caller still supplies an argument for it, which is not sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStatement {
    sql: String,
    params: Vec<String>,
}

impl CompiledStatement {
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    #[must_use]
    pub fn num_input(&self) -> usize {
        self.params.len()
    }

    /// Bind positional arguments to the compiled parameter names.
    ///
    /// # Errors
    /// [`DriverError::ParameterCount`] when `args` does not match the parameter count.
    pub fn bind(&self, args: &[Value]) -> Result<BoundStatement, DriverError> {
        if args.len() != self.params.len() {
            return Err(DriverError::ParameterCount {
                expected: self.params.len(),
                got: args.len(),
            });
        }
        let params: HashMap<String, Value> = self
            .params
            .iter()
            .zip(args)
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, arg)| (name.clone(), arg.clone()))
            .collect();
        Ok(BoundStatement {
            sql: self.sql.clone(),
            params,
        })
    }
}

struct StatementBuilder {
    out: Vec<u8>,
    next_auto: usize,
    params: Vec<String>,
}

impl StatementBuilder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            out: Vec::with_capacity(capacity + 16),
            next_auto: 0,
            params: Vec::new(),
        }
    }

    fn push_byte(&mut self, b: u8) {
        self.out.push(b);
    }

    fn auto_param(&mut self) {
        self.next_auto += 1;
        self.write_param(self.next_auto);
    }

    fn write_param(&mut self, index: usize) {
        if index > self.params.len() {
            self.params.resize(index, String::new());
        }
        let name = param_name(index);
        self.out.push(b'@');
        self.out.extend_from_slice(name.as_bytes());
        self.params[index - 1] = name;
    }

    fn finish(self) -> CompiledStatement {
        // Only ASCII bytes are dropped or inserted, so multi-byte sequences survive intact.
        let sql = String::from_utf8(self.out)
            .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned());
        CompiledStatement {
            sql,
            params: self.params,
        }
    }
}

/// Compile `query`, rewriting its placeholders into named backend parameters.
///
/// ```rust
/// use spanner_bridge::compiler::compile;
///
/// let stmt = compile("UPDATE balances SET balance = balance + $2 WHERE user_id = ?");
/// assert_eq!(
///     stmt.sql(),
///     "UPDATE balances SET balance = balance + @param_2 WHERE user_id = @param_1"
/// );
/// assert_eq!(stmt.params(), ["param_1", "param_2"]);
/// ```
#[must_use]
pub fn compile(query: &str) -> CompiledStatement {
    let bytes = query.as_bytes();
    let mut builder = StatementBuilder::with_capacity(bytes.len());
    let mut escaped = false;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        if escaped {
            builder.push_byte(b);
            escaped = false;
            idx += 1;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            b'$' => {
                if let Some((end, index)) = scan_index(bytes, idx + 1) {
                    builder.write_param(index);
                    idx = end;
                    continue;
                }
                builder.push_byte(b);
            }
            b'?' => builder.auto_param(),
            _ => builder.push_byte(b),
        }
        idx += 1;
    }

    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_numbered_and_positional() {
        let stmt = compile("UPDATE balances SET balance = balance + $2 WHERE user_id = ?");
        assert_eq!(
            stmt.sql(),
            "UPDATE balances SET balance = balance + @param_2 WHERE user_id = @param_1"
        );
        assert_eq!(stmt.params(), ["param_1", "param_2"]);
    }

    #[test]
    fn positional_placeholders_count_up() {
        let stmt = compile("INSERT INTO t (a, b, c) VALUES (?, ?, ?)");
        assert_eq!(
            stmt.sql(),
            "INSERT INTO t (a, b, c) VALUES (@param_1, @param_2, @param_3)"
        );
        assert_eq!(stmt.num_input(), 3);
    }

    #[test]
    fn numbered_placeholders_may_repeat() {
        let stmt = compile("SELECT * FROM t WHERE a = $1 OR b = $1");
        assert_eq!(stmt.sql(), "SELECT * FROM t WHERE a = @param_1 OR b = @param_1");
        assert_eq!(stmt.params(), ["param_1"]);
    }

    #[test]
    fn gaps_leave_empty_slots() {
        let stmt = compile("SELECT $3");
        assert_eq!(stmt.sql(), "SELECT @param_3");
        assert_eq!(stmt.params(), ["", "", "param_3"]);
    }

    #[test]
    fn backslash_escapes_next_byte() {
        let stmt = compile(r"SELECT '\?', \$1, \\ FROM t WHERE a = ?");
        assert_eq!(stmt.sql(), r"SELECT '?', $1, \ FROM t WHERE a = @param_1");
        assert_eq!(stmt.params(), ["param_1"]);
    }

    #[test]
    fn dollar_without_index_is_verbatim() {
        let stmt = compile("SELECT '$x', $0, $ FROM t");
        assert_eq!(stmt.sql(), "SELECT '$x', $0, $ FROM t");
        assert!(stmt.params().is_empty());
    }

    #[test]
    fn placeholders_inside_literals_are_rewritten() {
        let stmt = compile("SELECT 'why?' FROM t");
        assert_eq!(stmt.sql(), "SELECT 'why@param_1' FROM t");
        assert_eq!(stmt.num_input(), 1);
    }

    #[test]
    fn multibyte_text_survives() {
        let stmt = compile("SELECT 'héllo → ?' WHERE x = \\é");
        assert_eq!(stmt.sql(), "SELECT 'héllo → @param_1' WHERE x = é");
    }

    #[test]
    fn bind_checks_argument_count() {
        let stmt = compile("SELECT $1, $2");
        let err = stmt.bind(&[Value::Int(1)]).unwrap_err();
        assert_eq!(
            err,
            DriverError::ParameterCount {
                expected: 2,
                got: 1
            }
        );
        assert!(compile("SELECT 1").bind(&[Value::Int(1)]).is_err());
    }

    #[test]
    fn bind_maps_arguments_by_position() {
        let stmt = compile("UPDATE t SET a = $2 WHERE id = ?");
        let bound = stmt.bind(&[Value::Int(9), Value::from("x")]).unwrap();
        assert_eq!(bound.params.get("param_1"), Some(&Value::Int(9)));
        assert_eq!(bound.params.get("param_2"), Some(&Value::from("x")));
    }

    #[test]
    fn bind_skips_gap_slots() {
        let bound = compile("SELECT $2").bind(&[Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(bound.params.len(), 1);
        assert_eq!(bound.params.get("param_2"), Some(&Value::Int(2)));
    }
}
