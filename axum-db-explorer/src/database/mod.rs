//! Database abstraction layer
//!
//! This module provides the adapter contract and one implementation per
//! supported server.

pub mod traits;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(test)]
pub(crate) mod mock;

// Re-export the main trait
pub use traits::{execute_batch, queryable_target, DatabaseAdapter, DatabaseError};

use serde_json::Value;

/// Whether a statement produces a result set that should be fetched
///
/// Anything else is run through the simple query protocol so DDL and
/// multi-statement text work, and only the affected row count is reported.
#[cfg_attr(not(any(feature = "postgres", feature = "mysql")), allow(dead_code))]
pub(crate) fn returns_rows(sql: &str) -> bool {
    let normalized = sql.trim_start().to_ascii_uppercase();
    const ROW_KEYWORDS: [&str; 8] = ["SELECT", "WITH", "SHOW", "EXPLAIN", "VALUES", "TABLE", "DESCRIBE", "PRAGMA"];

    ROW_KEYWORDS.iter().any(|keyword| normalized.starts_with(keyword)) || normalized.contains(" RETURNING ")
}

/// JSON number from a float, `null` for NaN and infinities
#[cfg_attr(not(any(feature = "postgres", feature = "mysql")), allow(dead_code))]
pub(crate) fn float_to_json(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("  select * from users"));
        assert!(returns_rows("WITH t AS (SELECT 1) SELECT * FROM t"));
        assert!(returns_rows("INSERT INTO t (a) VALUES (1) RETURNING id"));
        assert!(!returns_rows("UPDATE t SET a = 1"));
        assert!(!returns_rows("ALTER TABLE t ADD COLUMN b int"));
        assert!(!returns_rows("CREATE DATABASE \"x\""));
    }

    #[test]
    fn test_float_to_json() {
        assert_eq!(float_to_json(1.5), serde_json::json!(1.5));
        assert_eq!(float_to_json(f64::NAN), Value::Null);
    }
}
