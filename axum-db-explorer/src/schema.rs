//! Schema and request types shared by the adapters and the HTTP API
//!
//! These types represent database schema information discovered at runtime
//! and the payloads exchanged with the explorer UI.

use crate::dialect::Dialect;
use crate::identifier::{ObjectKind, ParsedIdentifier, TableTarget, DEFAULT_SCHEMA};
use crate::operations::{ReferentialAction, SchemaOperation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Complete metadata for a table or view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    /// Database the table lives in, when known
    pub database: Option<String>,

    pub schema: String,

    /// Name of the table
    pub name: String,

    /// List of columns in the table
    pub columns: Vec<ColumnInfo>,

    /// Primary key column names (if any)
    pub primary_key: Option<Vec<String>>,

    /// Foreign key constraints
    pub foreign_keys: Vec<ForeignKeyInfo>,

    /// Index definitions
    pub indexes: Vec<IndexInfo>,
}

impl TableMetadata {
    /// The primary key column, if the table has exactly one
    ///
    /// Composite keys return `None`: row editing addresses rows through a
    /// single key column.
    pub fn primary_key_column(&self) -> Option<&str> {
        match self.primary_key.as_deref() {
            Some([column]) => Some(column.as_str()),
            _ => None,
        }
    }

    pub fn has_composite_primary_key(&self) -> bool {
        self.primary_key.as_ref().is_some_and(|columns| columns.len() > 1)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|column| column.name == name)
    }
}

/// Information about a single column
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    /// Column name
    pub name: String,

    /// SQL data type (e.g., "integer", "varchar(255)")
    pub data_type: String,

    /// Whether the column allows NULL values
    pub nullable: bool,

    /// Default value expression (if any)
    pub default_value: Option<String>,

    /// Whether this column is part of the primary key
    pub is_primary_key: bool,
}

/// Foreign key constraint information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyInfo {
    pub constraint_name: String,

    /// Column name in this table
    pub column: String,

    pub references_schema: String,

    /// Referenced table name
    pub references_table: String,

    /// Referenced column name
    pub references_column: String,

    pub on_delete: Option<ReferentialAction>,

    pub on_update: Option<ReferentialAction>,
}

/// Index information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    /// Index name
    pub name: String,

    /// Columns included in the index
    pub columns: Vec<String>,

    /// Whether the index enforces uniqueness
    pub unique: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub name: String,
    /// Structured identifier of the database node
    pub id: String,
}

impl DatabaseInfo {
    pub fn new(name: String) -> Self {
        let id = format!("db:{name}");
        Self { name, id }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaInfo {
    pub name: String,
    pub id: String,
}

impl SchemaInfo {
    pub fn new(database: Option<&str>, name: String) -> Self {
        let id = ParsedIdentifier::schema(database, &name)
            .format()
            .unwrap_or_else(|| format!("schema:{name}"));
        Self { name, id }
    }
}

/// Information about a table or view (for listing)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    /// Table name
    pub name: String,

    pub kind: ObjectKind,

    /// Structured identifier, usable as `tableId` in metadata and row calls
    pub id: String,
}

impl TableInfo {
    pub fn new(database: Option<&str>, schema: &str, name: String, kind: ObjectKind) -> Self {
        let identifier = match kind {
            ObjectKind::View => ParsedIdentifier::view(database, schema, &name),
            _ => ParsedIdentifier::table(database, schema, &name),
        };
        let id = identifier.format().unwrap_or_else(|| name.clone());
        Self { name, kind, id }
    }
}

/// Query parameters for fetching rows
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowQuery {
    /// Starting offset for pagination
    #[serde(default)]
    pub offset: u64,

    /// Maximum number of rows to return
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Column name to sort by
    pub sort_by: Option<String>,

    /// Sort order
    pub sort_order: Option<SortOrder>,
}

fn default_limit() -> u64 {
    100
}

impl Default for RowQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: default_limit(),
            sort_by: None,
            sort_order: None,
        }
    }
}

/// Sort order for row queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Response containing table rows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowsResponse {
    /// The rows returned
    pub rows: Vec<Value>,

    /// Column names in the result
    pub columns: Vec<String>,

    /// Primary key column used for row editing, if the table has one
    pub primary_key_column: Option<String>,

    /// Total number of rows in the table
    pub total: u64,

    /// Current offset
    pub offset: u64,

    /// Limit used for this query
    pub limit: u64,

    /// Whether there are more rows available
    pub has_more: bool,
}

/// Execution options for a raw query
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    /// Database to run the statement in, defaults to the connection's own
    pub database: Option<String>,
}

impl QueryOptions {
    pub fn in_database(database: Option<String>) -> Self {
        Self { database }
    }
}

/// Request to execute a raw SQL query
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// SQL query to execute
    pub sql: String,

    pub database: Option<String>,
}

/// Result from executing a query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Column names in the result
    pub columns: Vec<String>,

    /// Rows returned (empty for non-SELECT queries)
    pub rows: Vec<Value>,

    /// Number of rows affected (for INSERT/UPDATE/DELETE)
    pub affected_rows: u64,

    /// Query execution time in milliseconds
    pub execution_time_milliseconds: u64,

    /// Error message if the query failed
    pub error: Option<String>,
}

/// Update a single row addressed by its primary key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRowRequest {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_schema")]
    pub schema: String,
    pub table: String,
    pub pk_column: String,
    pub pk_value: Value,
    /// Column name to new value, applied in order
    pub updates: Vec<(String, Value)>,
}

impl UpdateRowRequest {
    pub fn target(&self) -> TableTarget {
        TableTarget::new(self.database.clone(), self.schema.clone(), self.table.clone())
    }
}

/// Apply schema operations to a single table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSchemaRequest {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_schema")]
    pub schema: String,
    pub table: String,
    pub operations: Vec<SchemaOperation>,
}

impl UpdateSchemaRequest {
    pub fn target(&self) -> TableTarget {
        TableTarget::new(self.database.clone(), self.schema.clone(), self.table.clone())
    }
}

/// Delete rows by primary key
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRowsRequest {
    /// Structured identifier of the table
    pub table_id: String,
    pub pk_column: String,
    pub pk_values: Vec<Value>,
}

/// Insert one row from raw form text
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRowRequest {
    /// Structured identifier of the table
    pub table_id: String,
    /// Column name to raw text; empty values are left to column defaults
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDatabaseRequest {
    pub name: String,
}

/// A configured connection as exposed to the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub id: String,
    pub dialect: Dialect,
}

/// Response for mutations that report a row count
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    pub affected_rows: u64,
    /// Statements that were executed, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<String>,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(primary_key: Option<Vec<&str>>) -> TableMetadata {
        TableMetadata {
            database: None,
            schema: "public".into(),
            name: "orders".into(),
            columns: vec![],
            primary_key: primary_key.map(|columns| columns.into_iter().map(String::from).collect()),
            foreign_keys: vec![],
            indexes: vec![],
        }
    }

    #[test]
    fn test_primary_key_column() {
        assert_eq!(metadata(Some(vec!["id"])).primary_key_column(), Some("id"));
        assert_eq!(metadata(None).primary_key_column(), None);

        let composite = metadata(Some(vec!["order_id", "line"]));
        assert_eq!(composite.primary_key_column(), None);
        assert!(composite.has_composite_primary_key());
    }

    #[test]
    fn test_listing_ids() {
        let table = TableInfo::new(Some("app"), "sales", "orders".into(), ObjectKind::Table);
        assert_eq!(table.id, "db:app.schema:sales.table:orders");

        let view = TableInfo::new(None, "public", "totals".into(), ObjectKind::View);
        assert_eq!(view.id, "schema:public.view:totals");

        assert_eq!(SchemaInfo::new(Some("app"), "sales".into()).id, "db:app.schema:sales");
        assert_eq!(DatabaseInfo::new("app".into()).id, "db:app");
    }

    #[test]
    fn test_update_row_request_defaults_schema() {
        let request: UpdateRowRequest = serde_json::from_str(
            r#"{"table": "users", "pkColumn": "id", "pkValue": 3, "updates": [["name", "Ada"]]}"#,
        )
        .unwrap();
        assert_eq!(request.target(), TableTarget::new(None, "public", "users"));
        assert_eq!(request.updates, vec![("name".to_string(), Value::from("Ada"))]);
    }
}
