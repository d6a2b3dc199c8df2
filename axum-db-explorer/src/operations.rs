//! Schema operations and their translation into ALTER statements
//!
//! A schema edit arrives as an ordered list of [`SchemaOperation`]s against a
//! single table. [`translate`] maps each operation to exactly one statement
//! in the target dialect, keeping the caller's order. Nothing here looks at
//! the live schema: preconditions such as "the column being renamed exists"
//! are the caller's responsibility.

use crate::dialect::Dialect;
use crate::identifier::{resolve, TableTarget};
use crate::literal::Literal;
use crate::statement::{validate_data_type, BuildError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Referential action for ON DELETE / ON UPDATE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[serde(rename = "NO ACTION")]
    NoAction,
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "RESTRICT")]
    Restrict,
}

impl ReferentialAction {
    pub fn as_sql(self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::Restrict => "RESTRICT",
        }
    }

    /// Parse the spelling reported by information_schema
    pub fn from_sql(rule: &str) -> Option<Self> {
        match rule.trim().to_ascii_uppercase().as_str() {
            "NO ACTION" | "NO_ACTION" => Some(ReferentialAction::NoAction),
            "CASCADE" => Some(ReferentialAction::Cascade),
            "SET NULL" | "SET_NULL" => Some(ReferentialAction::SetNull),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            _ => None,
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One declared change to a table's structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SchemaOperation {
    AddColumn {
        name: String,
        data_type: String,
        #[serde(default = "default_nullable")]
        is_nullable: bool,
    },
    DropColumn {
        name: String,
    },
    AlterColumnType {
        name: String,
        new_type: String,
        /// Nullability to re-assert alongside the type change
        #[serde(default)]
        is_nullable: Option<bool>,
    },
    RenameColumn {
        name: String,
        new_name: String,
    },
    AddPk {
        columns: Vec<String>,
    },
    DropPk {
        #[serde(default)]
        constraint_name: Option<String>,
    },
    AddFk {
        name: String,
        columns: Vec<String>,
        ref_table: String,
        ref_columns: Vec<String>,
        #[serde(default)]
        on_delete: Option<ReferentialAction>,
        #[serde(default)]
        on_update: Option<ReferentialAction>,
    },
    DropFk {
        name: String,
    },
}

fn default_nullable() -> bool {
    true
}

/// Longest identifier PostgreSQL keeps, in bytes
const POSTGRES_MAX_IDENTIFIER: usize = 63;

/// Name PostgreSQL gives an unnamed primary key
///
/// The table part is clipped so the whole name fits in 63 bytes, cutting
/// at a character boundary the way the server does.
fn postgres_primary_key_name(table: &str) -> String {
    const SUFFIX: &str = "_pkey";
    let mut end = table.len().min(POSTGRES_MAX_IDENTIFIER - SUFFIX.len());
    while !table.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{SUFFIX}", &table[..end])
}

/// Fill in missing nullability on type changes
///
/// `columns` maps each column to its nullability before the batch runs.
/// The batch is followed in order, so a column added or renamed earlier in
/// the same batch keeps the setting it was given. Type changes whose column
/// is unknown are left as they are.
pub fn carry_nullability(operations: &mut [SchemaOperation], columns: HashMap<String, bool>) {
    let mut nullability = columns;

    for operation in operations {
        match operation {
            SchemaOperation::AddColumn { name, is_nullable, .. } => {
                nullability.insert(name.clone(), *is_nullable);
            }
            SchemaOperation::DropColumn { name } => {
                nullability.remove(name.as_str());
            }
            SchemaOperation::RenameColumn { name, new_name } => {
                if let Some(value) = nullability.remove(name.as_str()) {
                    nullability.insert(new_name.clone(), value);
                }
            }
            SchemaOperation::AlterColumnType { name, is_nullable, .. } => {
                if is_nullable.is_none() {
                    *is_nullable = nullability.get(name.as_str()).copied();
                }
                if let Some(value) = *is_nullable {
                    nullability.insert(name.clone(), value);
                }
            }
            _ => {}
        }
    }
}

impl SchemaOperation {
    /// Short label for logs and error messages
    pub fn label(&self) -> &'static str {
        match self {
            SchemaOperation::AddColumn { .. } => "add_column",
            SchemaOperation::DropColumn { .. } => "drop_column",
            SchemaOperation::AlterColumnType { .. } => "alter_column_type",
            SchemaOperation::RenameColumn { .. } => "rename_column",
            SchemaOperation::AddPk { .. } => "add_pk",
            SchemaOperation::DropPk { .. } => "drop_pk",
            SchemaOperation::AddFk { .. } => "add_fk",
            SchemaOperation::DropFk { .. } => "drop_fk",
        }
    }
}

/// Foreign key as authored in the UI constraint editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyConstraint {
    pub constraint_name: String,
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

impl From<ForeignKeyConstraint> for SchemaOperation {
    fn from(constraint: ForeignKeyConstraint) -> Self {
        SchemaOperation::AddFk {
            name: constraint.constraint_name,
            columns: vec![constraint.source_column],
            ref_table: constraint.target_table,
            ref_columns: vec![constraint.target_column],
            on_delete: Some(constraint.on_delete),
            on_update: Some(constraint.on_update),
        }
    }
}

/// Why a single operation could not be translated
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("{0} needs at least one column")]
    EmptyColumnList(&'static str),

    #[error("Foreign key has {columns} columns but references {referenced}")]
    MismatchedForeignKeyColumns { columns: usize, referenced: usize },

    #[error("Dropping a primary key on {0} requires the constraint name")]
    MissingConstraintName(Dialect),

    #[error("{action} is not supported by {dialect}")]
    UnsupportedAction { action: ReferentialAction, dialect: Dialect },
}

/// An operation in a batch could not be translated
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid operation {position} of {total} ({label}): {source}")]
pub struct TranslateError {
    /// 1-based position in the batch
    pub position: usize,
    pub total: usize,
    pub label: &'static str,
    pub source: OperationError,
}

/// Translate an ordered batch of operations into ALTER statements
///
/// Returns one statement per operation in the same order. The whole batch is
/// validated before anything is returned, so a bad operation never leaves a
/// half-translated list behind.
pub fn translate(
    target: &TableTarget,
    operations: &[SchemaOperation],
    dialect: Dialect,
) -> Result<Vec<String>, TranslateError> {
    let translator = Translator { target, dialect };
    operations
        .iter()
        .enumerate()
        .map(|(index, operation)| {
            translator.statement(operation).map_err(|source| TranslateError {
                position: index + 1,
                total: operations.len(),
                label: operation.label(),
                source,
            })
        })
        .collect()
}

struct Translator<'a> {
    target: &'a TableTarget,
    dialect: Dialect,
}

impl Translator<'_> {
    fn quote(&self, identifier: &str) -> String {
        self.dialect.quote_identifier(identifier)
    }

    fn column_list(&self, columns: &[String]) -> String {
        columns.iter().map(|column| self.quote(column)).collect::<Vec<_>>().join(", ")
    }

    fn statement(&self, operation: &SchemaOperation) -> Result<String, OperationError> {
        let alter = format!("ALTER TABLE {}", self.dialect.qualify_target(self.target));

        let statement = match operation {
            SchemaOperation::AddColumn {
                name,
                data_type,
                is_nullable,
            } => {
                let data_type = validate_data_type(data_type)?;
                let keyword = match self.dialect {
                    Dialect::MsSql => "ADD",
                    Dialect::Postgres | Dialect::MySql => "ADD COLUMN",
                };
                let null_clause = if *is_nullable { "" } else { " NOT NULL" };
                format!("{alter} {keyword} {} {data_type}{null_clause}", self.quote(name))
            }

            SchemaOperation::DropColumn { name } => {
                format!("{alter} DROP COLUMN {}", self.quote(name))
            }

            SchemaOperation::AlterColumnType {
                name,
                new_type,
                is_nullable,
            } => {
                let new_type = validate_data_type(new_type)?;
                let column = self.quote(name);
                match self.dialect {
                    Dialect::Postgres => {
                        let mut sql = format!("{alter} ALTER COLUMN {column} TYPE {new_type}");
                        match is_nullable {
                            Some(false) => sql.push_str(&format!(", ALTER COLUMN {column} SET NOT NULL")),
                            Some(true) => sql.push_str(&format!(", ALTER COLUMN {column} DROP NOT NULL")),
                            None => {}
                        }
                        sql
                    }
                    Dialect::MySql | Dialect::MsSql => {
                        let verb = if self.dialect == Dialect::MySql {
                            "MODIFY COLUMN"
                        } else {
                            "ALTER COLUMN"
                        };
                        let null_clause = match is_nullable {
                            Some(false) => " NOT NULL",
                            Some(true) => " NULL",
                            None => "",
                        };
                        format!("{alter} {verb} {column} {new_type}{null_clause}")
                    }
                }
            }

            SchemaOperation::RenameColumn { name, new_name } => match self.dialect {
                Dialect::MsSql => {
                    let object = format!(
                        "{}.{}",
                        self.dialect.qualify(&self.target.schema, &self.target.table),
                        self.quote(name)
                    );
                    format!(
                        "EXEC sp_rename {}, {}, 'COLUMN'",
                        Literal::Text(object).to_sql(self.dialect),
                        Literal::Text(new_name.clone()).to_sql(self.dialect)
                    )
                }
                Dialect::Postgres | Dialect::MySql => {
                    format!("{alter} RENAME COLUMN {} TO {}", self.quote(name), self.quote(new_name))
                }
            },

            SchemaOperation::AddPk { columns } => {
                if columns.is_empty() {
                    return Err(OperationError::EmptyColumnList("Primary key"));
                }
                format!("{alter} ADD PRIMARY KEY ({})", self.column_list(columns))
            }

            SchemaOperation::DropPk { constraint_name } => match (self.dialect, constraint_name) {
                (Dialect::MySql, _) => format!("{alter} DROP PRIMARY KEY"),
                (_, Some(constraint)) => format!("{alter} DROP CONSTRAINT {}", self.quote(constraint)),
                (Dialect::Postgres, None) => {
                    let constraint = postgres_primary_key_name(&self.target.table);
                    format!("{alter} DROP CONSTRAINT {}", self.quote(&constraint))
                }
                (Dialect::MsSql, None) => return Err(OperationError::MissingConstraintName(self.dialect)),
            },

            SchemaOperation::AddFk {
                name,
                columns,
                ref_table,
                ref_columns,
                on_delete,
                on_update,
            } => {
                if columns.is_empty() {
                    return Err(OperationError::EmptyColumnList("Foreign key"));
                }
                if columns.len() != ref_columns.len() {
                    return Err(OperationError::MismatchedForeignKeyColumns {
                        columns: columns.len(),
                        referenced: ref_columns.len(),
                    });
                }

                let referenced = self.referenced_table(ref_table);
                let mut sql = format!(
                    "{alter} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                    self.quote(name),
                    self.column_list(columns),
                    self.dialect.qualify_target(&referenced),
                    self.column_list(ref_columns)
                );
                for (clause, action) in [("ON DELETE", on_delete), ("ON UPDATE", on_update)] {
                    if let Some(action) = action {
                        if self.dialect == Dialect::MsSql && *action == ReferentialAction::Restrict {
                            return Err(OperationError::UnsupportedAction {
                                action: *action,
                                dialect: self.dialect,
                            });
                        }
                        sql.push_str(&format!(" {clause} {action}"));
                    }
                }
                sql
            }

            SchemaOperation::DropFk { name } => match self.dialect {
                Dialect::MySql => format!("{alter} DROP FOREIGN KEY {}", self.quote(name)),
                Dialect::Postgres | Dialect::MsSql => format!("{alter} DROP CONSTRAINT {}", self.quote(name)),
            },
        };

        Ok(statement)
    }

    /// Resolve the table a foreign key points at
    ///
    /// A bare name lives next to the altered table. Dotted or structured
    /// names are resolved like any other identifier, inheriting the database.
    fn referenced_table(&self, ref_table: &str) -> TableTarget {
        let same_namespace = || TableTarget {
            database: self.target.database.clone(),
            schema: self.target.schema.clone(),
            table: ref_table.to_string(),
        };

        if !ref_table.contains('.') && !ref_table.contains(':') {
            return same_namespace();
        }

        match resolve(ref_table).table_target() {
            Some(mut referenced) => {
                if referenced.database.is_none() {
                    referenced.database = self.target.database.clone();
                }
                referenced
            }
            None => same_namespace(),
        }
    }
}
