//! SQL literal encoding
//!
//! Values are rendered inline rather than bound as parameters, so every
//! string goes through [`Literal::to_sql`] which escapes it for the dialect.

use crate::dialect::Dialect;
use serde_json::Value;

/// A value ready to be rendered as SQL literal text
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    /// Numeric text, emitted unquoted
    Number(String),
    Text(String),
}

impl Literal {
    /// Map a JSON value coming from the UI or a fetched row
    ///
    /// Arrays and objects are stored as their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Literal::Null,
            Value::Bool(flag) => Literal::Boolean(*flag),
            Value::Number(number) => Literal::Number(number.to_string()),
            Value::String(text) => Literal::Text(text.clone()),
            Value::Array(_) | Value::Object(_) => Literal::Text(value.to_string()),
        }
    }

    /// Render the literal for a dialect
    pub fn to_sql(&self, dialect: Dialect) -> String {
        match self {
            Literal::Null => "NULL".to_string(),
            Literal::Boolean(flag) => match (dialect, flag) {
                (Dialect::MsSql, true) => "1".to_string(),
                (Dialect::MsSql, false) => "0".to_string(),
                (_, true) => "TRUE".to_string(),
                (_, false) => "FALSE".to_string(),
            },
            Literal::Number(number) => number.clone(),
            Literal::Text(text) => quote_string(text, dialect),
        }
    }
}

/// Render a JSON value as a SQL literal
///
/// `null` becomes `NULL`, numbers and booleans are emitted verbatim and
/// everything else is single-quoted with embedded quotes doubled.
pub fn format_value(value: &Value, dialect: Dialect) -> String {
    match value {
        Value::Bool(flag) if dialect != Dialect::MsSql => flag.to_string(),
        _ => Literal::from_json(value).to_sql(dialect),
    }
}

/// Interpret raw text typed into an insert form
///
/// Precedence, first match wins:
/// 1. `null` (any case) is SQL `NULL`
/// 2. `true` / `false` (any case) are booleans
/// 3. text that fully parses as a finite number is emitted unquoted
/// 4. anything else is quoted text
///
/// This means the text values `"true"` or `"42"` cannot be inserted into a
/// text column through this path.
pub fn coerce_insert_text(raw: &str) -> Literal {
    if raw.eq_ignore_ascii_case("null") {
        return Literal::Null;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Literal::Boolean(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Literal::Boolean(false);
    }
    if is_numeric_literal(raw) {
        return Literal::Number(raw.to_string());
    }
    Literal::Text(raw.to_string())
}

/// Whether `text` is a plain decimal number (optionally signed, with fraction
/// and exponent), which is valid unquoted SQL in every supported dialect
fn is_numeric_literal(text: &str) -> bool {
    let numeric_characters = text
        .chars()
        .all(|character| character.is_ascii_digit() || matches!(character, '+' | '-' | '.' | 'e' | 'E'));
    let has_digit = text.chars().any(|character| character.is_ascii_digit());

    numeric_characters
        && has_digit
        && text.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

fn quote_string(text: &str, dialect: Dialect) -> String {
    let escaped = match dialect {
        // backslash is an escape character in MySQL string literals
        Dialect::MySql => text.replace('\\', "\\\\").replace('\'', "''"),
        Dialect::Postgres | Dialect::MsSql => text.replace('\'', "''"),
    };
    match dialect {
        // N prefix keeps non-ASCII text intact in NVARCHAR columns
        Dialect::MsSql if !text.is_ascii() => format!("N'{escaped}'"),
        _ => format!("'{escaped}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::Null, Dialect::Postgres), "NULL");
        assert_eq!(format_value(&json!(42), Dialect::Postgres), "42");
        assert_eq!(format_value(&json!(-1.5), Dialect::MySql), "-1.5");
        assert_eq!(format_value(&json!(true), Dialect::Postgres), "true");
        assert_eq!(format_value(&json!("O'Brien"), Dialect::Postgres), "'O''Brien'");
    }

    #[test]
    fn test_format_value_dialect_differences() {
        assert_eq!(format_value(&json!(false), Dialect::MsSql), "0");
        assert_eq!(format_value(&json!("C:\\temp"), Dialect::MySql), "'C:\\\\temp'");
        assert_eq!(format_value(&json!("C:\\temp"), Dialect::Postgres), "'C:\\temp'");
        assert_eq!(format_value(&json!("Zoë"), Dialect::MsSql), "N'Zoë'");
    }

    #[test]
    fn test_format_value_structured_json() {
        assert_eq!(
            format_value(&json!({"tag": "it's"}), Dialect::Postgres),
            "'{\"tag\":\"it''s\"}'"
        );
    }

    #[test]
    fn test_coerce_keywords() {
        assert_eq!(coerce_insert_text("NULL"), Literal::Null);
        assert_eq!(coerce_insert_text("True"), Literal::Boolean(true));
        assert_eq!(coerce_insert_text("false"), Literal::Boolean(false));
        assert_eq!(coerce_insert_text("true").to_sql(Dialect::Postgres), "TRUE");
    }

    #[test]
    fn test_coerce_numbers() {
        assert_eq!(coerce_insert_text("42"), Literal::Number("42".into()));
        assert_eq!(coerce_insert_text("-3.25"), Literal::Number("-3.25".into()));
        assert_eq!(coerce_insert_text("1e3"), Literal::Number("1e3".into()));
    }

    #[test]
    fn test_coerce_non_numbers_stay_text() {
        for raw in ["inf", "NaN", "infinity", "0x10", "12 apples", "-", "1.2.3", " 42"] {
            assert_eq!(coerce_insert_text(raw), Literal::Text(raw.to_string()), "{raw}");
        }
    }

    #[test]
    fn test_numeric_looking_text_is_ambiguous() {
        // a zip code typed into a text column loses its quotes
        assert_eq!(coerce_insert_text("02134").to_sql(Dialect::Postgres), "02134");
    }

    #[test]
    fn test_coerced_text_is_escaped() {
        assert_eq!(coerce_insert_text("it's").to_sql(Dialect::MySql), "'it''s'");
    }
}
