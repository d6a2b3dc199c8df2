//! SQL statement builder
//!
//! Composes SELECT, INSERT, UPDATE, DELETE and database-level DDL as plain
//! SQL text. Identifiers are quoted through [`Dialect`], values through
//! [`crate::literal`], so the output can be sent to the engine as is.

use crate::dialect::Dialect;
use crate::identifier::TableTarget;
use crate::literal::{format_value, Literal};
use crate::schema::SortOrder;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while composing a statement
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("No columns to update")]
    EmptyUpdate,

    #[error("No rows selected")]
    EmptyKeySet,

    #[error("No values to insert")]
    EmptyInsert,

    #[error("Invalid data type: {0}")]
    InvalidDataType(String),
}

/// Options for a row-fetching SELECT
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// Restrict to rows whose key column is in the given values
    pub key_filter: Option<(String, Vec<Value>)>,
    pub order_by: Option<(String, SortOrder)>,
    pub limit: Option<u64>,
    pub offset: u64,
}

/// Builds dialect-correct SQL text
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder {
    dialect: Dialect,
}

impl StatementBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn quote(&self, identifier: &str) -> String {
        self.dialect.quote_identifier(identifier)
    }

    fn table(&self, target: &TableTarget) -> String {
        self.dialect.qualify_target(target)
    }

    fn value(&self, value: &Value) -> String {
        format_value(value, self.dialect)
    }

    fn value_list(&self, values: &[Value]) -> String {
        values.iter().map(|value| self.value(value)).collect::<Vec<_>>().join(", ")
    }

    /// `SELECT * FROM <table> [WHERE key IN (...)] [ORDER BY ...] [LIMIT n]`
    ///
    /// SQL Server has no LIMIT: a bare limit becomes `TOP n`, and a limit
    /// with an offset becomes `OFFSET ... FETCH NEXT`, which requires an
    /// ORDER BY, so `ORDER BY (SELECT NULL)` is added when none was given.
    pub fn select(&self, target: &TableTarget, options: &SelectOptions) -> String {
        let mut where_clause = String::new();
        if let Some((column, values)) = &options.key_filter {
            where_clause = if values.is_empty() {
                // an empty IN list is a syntax error everywhere
                " WHERE 1 = 0".to_string()
            } else {
                format!(" WHERE {} IN ({})", self.quote(column), self.value_list(values))
            };
        }

        let order_clause = options
            .order_by
            .as_ref()
            .map(|(column, order)| {
                let direction = match order {
                    SortOrder::Ascending => "ASC",
                    SortOrder::Descending => "DESC",
                };
                format!(" ORDER BY {} {}", self.quote(column), direction)
            })
            .unwrap_or_default();

        let table = self.table(target);
        match self.dialect {
            Dialect::MsSql => match options.limit {
                Some(limit) if options.offset == 0 => {
                    format!("SELECT TOP {limit} * FROM {table}{where_clause}{order_clause}")
                }
                Some(limit) => {
                    let order_clause = if order_clause.is_empty() {
                        " ORDER BY (SELECT NULL)".to_string()
                    } else {
                        order_clause
                    };
                    format!(
                        "SELECT * FROM {table}{where_clause}{order_clause} OFFSET {} ROWS FETCH NEXT {limit} ROWS ONLY",
                        options.offset
                    )
                }
                None => format!("SELECT * FROM {table}{where_clause}{order_clause}"),
            },
            Dialect::Postgres | Dialect::MySql => {
                let mut sql = format!("SELECT * FROM {table}{where_clause}{order_clause}");
                if let Some(limit) = options.limit {
                    sql.push_str(&format!(" LIMIT {limit}"));
                    if options.offset > 0 {
                        sql.push_str(&format!(" OFFSET {}", options.offset));
                    }
                }
                sql
            }
        }
    }

    /// `SELECT COUNT(*) AS count FROM <table>`
    pub fn count(&self, target: &TableTarget) -> String {
        format!("SELECT COUNT(*) AS {} FROM {}", self.quote("count"), self.table(target))
    }

    /// `INSERT INTO <table> (<cols>) VALUES (<vals>)`
    pub fn insert(&self, target: &TableTarget, values: &[(String, Literal)]) -> Result<String, BuildError> {
        if values.is_empty() {
            return Err(BuildError::EmptyInsert);
        }

        let columns: Vec<String> = values.iter().map(|(column, _)| self.quote(column)).collect();
        let literals: Vec<String> = values.iter().map(|(_, literal)| literal.to_sql(self.dialect)).collect();

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(target),
            columns.join(", "),
            literals.join(", ")
        ))
    }

    /// `UPDATE <table> SET c = v, ... WHERE <key> = <value>`
    pub fn update(
        &self,
        target: &TableTarget,
        key_column: &str,
        key_value: &Value,
        updates: &[(String, Value)],
    ) -> Result<String, BuildError> {
        if updates.is_empty() {
            return Err(BuildError::EmptyUpdate);
        }

        let assignments: Vec<String> = updates
            .iter()
            .map(|(column, value)| format!("{} = {}", self.quote(column), self.value(value)))
            .collect();

        Ok(format!(
            "UPDATE {} SET {} WHERE {} = {}",
            self.table(target),
            assignments.join(", "),
            self.quote(key_column),
            self.value(key_value)
        ))
    }

    /// `DELETE FROM <table> WHERE <key> IN (<values>)`
    pub fn delete(&self, target: &TableTarget, key_column: &str, key_values: &[Value]) -> Result<String, BuildError> {
        if key_values.is_empty() {
            return Err(BuildError::EmptyKeySet);
        }

        Ok(format!(
            "DELETE FROM {} WHERE {} IN ({})",
            self.table(target),
            self.quote(key_column),
            self.value_list(key_values)
        ))
    }

    pub fn create_database(&self, name: &str) -> String {
        format!("CREATE DATABASE {}", self.quote(name))
    }

    pub fn drop_database(&self, name: &str) -> String {
        format!("DROP DATABASE {}", self.quote(name))
    }
}

/// Check that a column type can be spliced into DDL unquoted
///
/// Accepts things like `integer`, `VARCHAR(255)`, `numeric(10, 2)`,
/// `timestamp with time zone` or `public.my_enum`.
pub fn validate_data_type(data_type: &str) -> Result<&str, BuildError> {
    let trimmed = data_type.trim();
    let allowed = trimmed.chars().all(|character| {
        character.is_alphanumeric() || matches!(character, '_' | ' ' | '(' | ')' | ',' | '.' | '[' | ']')
    });
    let balanced = trimmed.matches('(').count() == trimmed.matches(')').count();

    if trimmed.is_empty() || !allowed || !balanced {
        return Err(BuildError::InvalidDataType(data_type.to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orders() -> TableTarget {
        TableTarget::new(None, "sales", "orders")
    }

    #[test]
    fn test_select_with_key_filter_and_limit() {
        let builder = StatementBuilder::new(Dialect::Postgres);
        let options = SelectOptions {
            key_filter: Some(("id".into(), vec![json!(1), json!(2)])),
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(
            builder.select(&orders(), &options),
            "SELECT * FROM \"sales\".\"orders\" WHERE \"id\" IN (1, 2) LIMIT 10"
        );
    }

    #[test]
    fn test_select_paginated_mysql() {
        let builder = StatementBuilder::new(Dialect::MySql);
        let options = SelectOptions {
            order_by: Some(("created_at".into(), SortOrder::Descending)),
            limit: Some(50),
            offset: 100,
            ..Default::default()
        };
        assert_eq!(
            builder.select(&orders(), &options),
            "SELECT * FROM `sales`.`orders` ORDER BY `created_at` DESC LIMIT 50 OFFSET 100"
        );
    }

    #[test]
    fn test_select_mssql_pagination() {
        let builder = StatementBuilder::new(Dialect::MsSql);
        let first_page = SelectOptions {
            limit: Some(25),
            ..Default::default()
        };
        assert_eq!(builder.select(&orders(), &first_page), "SELECT TOP 25 * FROM [sales].[orders]");

        let second_page = SelectOptions {
            limit: Some(25),
            offset: 25,
            ..Default::default()
        };
        assert_eq!(
            builder.select(&orders(), &second_page),
            "SELECT * FROM [sales].[orders] ORDER BY (SELECT NULL) OFFSET 25 ROWS FETCH NEXT 25 ROWS ONLY"
        );
    }

    #[test]
    fn test_select_empty_key_filter_matches_nothing() {
        let builder = StatementBuilder::new(Dialect::Postgres);
        let options = SelectOptions {
            key_filter: Some(("id".into(), vec![])),
            ..Default::default()
        };
        assert_eq!(
            builder.select(&orders(), &options),
            "SELECT * FROM \"sales\".\"orders\" WHERE 1 = 0"
        );
    }

    #[test]
    fn test_insert() {
        let builder = StatementBuilder::new(Dialect::Postgres);
        let sql = builder
            .insert(
                &orders(),
                &[
                    ("customer".into(), Literal::Text("O'Brien".into())),
                    ("total".into(), Literal::Number("19.99".into())),
                    ("paid".into(), Literal::Boolean(false)),
                ],
            )
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"sales\".\"orders\" (\"customer\", \"total\", \"paid\") VALUES ('O''Brien', 19.99, FALSE)"
        );
        assert_eq!(builder.insert(&orders(), &[]), Err(BuildError::EmptyInsert));
    }

    #[test]
    fn test_update() {
        let builder = StatementBuilder::new(Dialect::MySql);
        let sql = builder
            .update(
                &orders(),
                "id",
                &json!(7),
                &[("status".into(), json!("shipped")), ("note".into(), Value::Null)],
            )
            .unwrap();
        assert_eq!(sql, "UPDATE `sales`.`orders` SET `status` = 'shipped', `note` = NULL WHERE `id` = 7");
        assert_eq!(
            builder.update(&orders(), "id", &json!(7), &[]),
            Err(BuildError::EmptyUpdate)
        );
    }

    #[test]
    fn test_delete() {
        let builder = StatementBuilder::new(Dialect::MsSql);
        let sql = builder
            .delete(&orders(), "order id", &[json!("A-1"), json!("B'2")])
            .unwrap();
        assert_eq!(sql, "DELETE FROM [sales].[orders] WHERE [order id] IN ('A-1', 'B''2')");
        assert_eq!(builder.delete(&orders(), "id", &[]), Err(BuildError::EmptyKeySet));
    }

    #[test]
    fn test_database_statements() {
        let builder = StatementBuilder::new(Dialect::Postgres);
        assert_eq!(builder.create_database("my\"db"), "CREATE DATABASE \"my\"\"db\"");
        assert_eq!(
            StatementBuilder::new(Dialect::MySql).drop_database("shop"),
            "DROP DATABASE `shop`"
        );
    }

    #[test]
    fn test_validate_data_type() {
        assert_eq!(validate_data_type(" VARCHAR(255) "), Ok("VARCHAR(255)"));
        assert!(validate_data_type("numeric(10, 2)").is_ok());
        assert!(validate_data_type("timestamp with time zone").is_ok());
        assert!(validate_data_type("integer[]").is_ok());
        assert!(validate_data_type("int; DROP TABLE users").is_err());
        assert!(validate_data_type("text DEFAULT 'x'").is_err());
        assert!(validate_data_type("int)").is_err());
        assert!(validate_data_type("").is_err());
    }
}
