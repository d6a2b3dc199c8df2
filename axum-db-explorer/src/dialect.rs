//! SQL dialects and identifier quoting
//!
//! Dialect strings coming from configuration or requests are parsed once into
//! [`Dialect`]; everything downstream matches on the enum.

use crate::identifier::{TableTarget, DEFAULT_SCHEMA};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "sqlserver")]
    MsSql,
}

/// Returned when a dialect name is not recognised
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unsupported dialect: {0}")]
pub struct DialectParseError(pub String);

impl FromStr for Dialect {
    type Err = DialectParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "mssql" | "sqlserver" => Ok(Dialect::MsSql),
            _ => Err(DialectParseError(value.to_string())),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::MsSql => "mssql",
        })
    }
}

impl Dialect {
    /// Opening and closing identifier delimiters
    fn delimiters(self) -> (char, char) {
        match self {
            Dialect::Postgres => ('"', '"'),
            Dialect::MySql => ('`', '`'),
            Dialect::MsSql => ('[', ']'),
        }
    }

    /// Quote an identifier (table, column, schema or database name)
    ///
    /// The closing delimiter is escaped by doubling it. No other
    /// sanitization happens; values never go through here.
    pub fn quote_identifier(self, identifier: &str) -> String {
        let (open, close) = self.delimiters();
        let doubled = format!("{close}{close}");
        format!("{open}{}{close}", identifier.replace(close, &doubled))
    }

    /// Undo [`Dialect::quote_identifier`]
    ///
    /// Returns `None` if the input is not a single well-formed quoted
    /// identifier for this dialect.
    pub fn unquote_identifier(self, quoted: &str) -> Option<String> {
        let (open, close) = self.delimiters();
        let inner = quoted.strip_prefix(open)?.strip_suffix(close)?;

        let mut name = String::with_capacity(inner.len());
        let mut characters = inner.chars();
        while let Some(character) = characters.next() {
            if character == close {
                // a lone closing delimiter would have ended the identifier
                if characters.next() != Some(close) {
                    return None;
                }
            }
            name.push(character);
        }
        Some(name)
    }

    /// `schema.table` with both parts quoted
    pub fn qualify(self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.quote_identifier(schema), self.quote_identifier(table))
    }

    /// Qualified name of a resolved target
    ///
    /// MySQL has no schema level below the database, so the database name is
    /// used as the namespace when it is known, and the implicit `public`
    /// schema leaves the table unqualified (current database).
    pub fn qualify_target(self, target: &TableTarget) -> String {
        match (self, target.database.as_deref()) {
            (Dialect::MySql, Some(database)) => self.qualify(database, &target.table),
            (Dialect::MySql, None) if target.schema == DEFAULT_SCHEMA => self.quote_identifier(&target.table),
            _ => self.qualify(&target.schema, &target.table),
        }
    }
}
