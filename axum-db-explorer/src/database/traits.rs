//! Database adapter trait
//!
//! This trait defines the contract every dialect implements and that the API
//! layer and the row edit session consume.

use crate::dialect::Dialect;
use crate::identifier::{resolve, TableTarget};
use crate::literal::Literal;
use crate::operations::{translate, TranslateError};
use crate::schema::{
    DatabaseInfo, QueryOptions, QueryResult, RowQuery, RowsResponse, SchemaInfo, TableInfo, TableMetadata,
    UpdateRowRequest, UpdateSchemaRequest,
};
use crate::statement::{BuildError, SelectOptions, StatementBuilder};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Database adapter for schema discovery, data access and mutations
///
/// Implementations provide the catalog queries and statement execution for
/// one dialect. Row and schema mutations have default implementations built
/// on [`DatabaseAdapter::execute_query`] and the statement builder.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync + 'static {
    /// Dialect used to build statements for this connection
    fn dialect(&self) -> Dialect;

    /// List the databases visible to the connection
    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, DatabaseError>;

    /// List schemas inside a database
    async fn list_schemas(&self, database: Option<&str>) -> Result<Vec<SchemaInfo>, DatabaseError>;

    /// List tables and views inside a schema
    async fn list_tables(&self, database: Option<&str>, schema: &str) -> Result<Vec<TableInfo>, DatabaseError>;

    /// Get metadata for the object a structured identifier points at
    ///
    /// # Arguments
    ///
    /// * `table_id` - Structured or legacy identifier of a table or view
    async fn get_metadata(&self, table_id: &str) -> Result<TableMetadata, DatabaseError>;

    /// Execute a raw SQL statement
    ///
    /// # Security Warning
    ///
    /// This allows executing any SQL statement including DDL and DML.
    ///
    /// # Errors
    ///
    /// Any execution error is returned as [`DatabaseError::Query`] with the
    /// driver's message untouched.
    async fn execute_query(&self, sql: &str, options: &QueryOptions) -> Result<QueryResult, DatabaseError>;

    /// Fetch a page of rows from a table or view
    async fn get_rows(&self, table_id: &str, query: &RowQuery) -> Result<RowsResponse, DatabaseError> {
        let target = queryable_target(table_id)?;
        let metadata = self.get_metadata(table_id).await?;

        if let Some(sort_column) = &query.sort_by {
            if metadata.column(sort_column).is_none() {
                return Err(DatabaseError::InvalidColumn(sort_column.clone()));
            }
        }

        let builder = self.statements();
        let options = QueryOptions::in_database(target.database.clone());

        let count_result = self.execute_query(&builder.count(&target), &options).await?;
        let total = count_result.rows.first().and_then(|row| row.get("count")).map(count_value).unwrap_or(0);

        let select = SelectOptions {
            order_by: query
                .sort_by
                .clone()
                .map(|column| (column, query.sort_order.unwrap_or(crate::schema::SortOrder::Ascending))),
            limit: Some(query.limit),
            offset: query.offset,
            ..Default::default()
        };
        let result = self.execute_query(&builder.select(&target, &select), &options).await?;

        let has_more = query.offset + (result.rows.len() as u64) < total;

        Ok(RowsResponse {
            rows: result.rows,
            columns: metadata.columns.iter().map(|column| column.name.clone()).collect(),
            primary_key_column: metadata.primary_key_column().map(str::to_string),
            total,
            offset: query.offset,
            limit: query.limit,
            has_more,
        })
    }

    /// Update one row addressed by its primary key
    ///
    /// Returns the number of rows the statement touched.
    async fn update_row(&self, request: &UpdateRowRequest) -> Result<u64, DatabaseError> {
        let sql = self
            .statements()
            .update(&request.target(), &request.pk_column, &request.pk_value, &request.updates)?;
        let result = self
            .execute_query(&sql, &QueryOptions::in_database(request.database.clone()))
            .await?;
        Ok(result.affected_rows)
    }

    /// Apply schema operations to one table, in order
    ///
    /// Statements run one after another without a surrounding transaction.
    /// The first failure stops the batch; earlier statements stay applied.
    async fn update_schema(&self, request: &UpdateSchemaRequest) -> Result<Vec<String>, DatabaseError> {
        let statements = translate(&request.target(), &request.operations, self.dialect())?;
        execute_batch(self, &statements, &QueryOptions::in_database(request.database.clone())).await?;
        Ok(statements)
    }

    /// Delete rows whose key column is in `pk_values`, in one statement
    async fn delete_rows(&self, target: &TableTarget, pk_column: &str, pk_values: &[Value]) -> Result<u64, DatabaseError> {
        let sql = self.statements().delete(target, pk_column, pk_values)?;
        let result = self
            .execute_query(&sql, &QueryOptions::in_database(target.database.clone()))
            .await?;
        Ok(result.affected_rows)
    }

    /// Insert one row; omitted columns take their server-side default
    async fn insert_row(&self, target: &TableTarget, values: &[(String, Literal)]) -> Result<u64, DatabaseError> {
        let sql = self.statements().insert(target, values)?;
        let result = self
            .execute_query(&sql, &QueryOptions::in_database(target.database.clone()))
            .await?;
        Ok(result.affected_rows)
    }

    async fn create_database(&self, name: &str) -> Result<(), DatabaseError> {
        validate_database_name(name)?;
        let sql = self.statements().create_database(name);
        self.execute_query(&sql, &QueryOptions::default()).await?;
        Ok(())
    }

    async fn drop_database(&self, name: &str) -> Result<(), DatabaseError> {
        validate_database_name(name)?;
        let sql = self.statements().drop_database(name);
        self.execute_query(&sql, &QueryOptions::default()).await?;
        Ok(())
    }

    fn statements(&self) -> StatementBuilder {
        StatementBuilder::new(self.dialect())
    }
}

/// Run statements sequentially, stopping at the first failure
///
/// Returns the total affected row count. A failure is reported with its
/// 1-based position so the caller knows which statements were applied.
pub async fn execute_batch<A>(adapter: &A, statements: &[String], options: &QueryOptions) -> Result<u64, DatabaseError>
where
    A: DatabaseAdapter + ?Sized,
{
    let total = statements.len();
    let mut affected_rows = 0;

    for (index, statement) in statements.iter().enumerate() {
        debug!(position = index + 1, total, %statement, "executing batch statement");
        match adapter.execute_query(statement, options).await {
            Ok(result) => affected_rows += result.affected_rows,
            Err(error) => {
                warn!(position = index + 1, total, %error, "batch stopped");
                return Err(DatabaseError::BatchPartialFailure {
                    failed_at: index + 1,
                    total,
                    message: error.to_string(),
                });
            }
        }
    }

    Ok(affected_rows)
}

/// Resolve an identifier that must point at a table-like object
pub fn queryable_target(table_id: &str) -> Result<TableTarget, DatabaseError> {
    resolve(table_id)
        .table_target()
        .ok_or_else(|| DatabaseError::NotQueryable(table_id.to_string()))
}

fn validate_database_name(name: &str) -> Result<(), DatabaseError> {
    if name.trim().is_empty() {
        return Err(DatabaseError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Read a COUNT(*) value, which drivers report as a number or as text
fn count_value(value: &Value) -> u64 {
    match value {
        Value::Number(number) => number.as_u64().unwrap_or(0),
        Value::String(text) => text.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Database error type
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Statement failed on the server, message passed through verbatim
    #[error("Database error: {0}")]
    Query(String),

    /// Table not found
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Identifier does not name a table, view or function
    #[error("Not a queryable object: {0}")]
    NotQueryable(String),

    /// Invalid column name
    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// Query timeout
    #[error("Query timeout exceeded")]
    Timeout,

    /// Result set too large
    #[error("Result set too large (max {0} rows)")]
    TooManyRows(u64),

    #[error("Invalid statement: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    /// A sequential batch stopped part way; earlier statements were applied
    #[error("Failed at operation {failed_at} of {total}: {message}")]
    BatchPartialFailure {
        failed_at: usize,
        total: usize,
        message: String,
    },
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        DatabaseError::Query(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::mock::RecordingAdapter;
    use crate::operations::SchemaOperation;
    use serde_json::json;

    #[test]
    fn test_count_value() {
        assert_eq!(count_value(&json!(12)), 12);
        assert_eq!(count_value(&json!("7")), 7);
        assert_eq!(count_value(&Value::Null), 0);
    }

    #[test]
    fn test_queryable_target() {
        assert!(queryable_target("db:app.schema:sales.table:orders").is_ok());
        assert!(matches!(
            queryable_target("db:app.schema:sales.folder:tables"),
            Err(DatabaseError::NotQueryable(_))
        ));
    }

    #[test]
    fn test_partial_failure_message() {
        let error = DatabaseError::BatchPartialFailure {
            failed_at: 3,
            total: 5,
            message: "column \"x\" does not exist".into(),
        };
        assert_eq!(error.to_string(), "Failed at operation 3 of 5: column \"x\" does not exist");
    }

    #[tokio::test]
    async fn test_get_rows_reports_more_pages() {
        let adapter = RecordingAdapter::users(3);
        let query = RowQuery {
            limit: 2,
            ..Default::default()
        };

        let response = adapter.get_rows("users", &query).await.unwrap();
        assert_eq!(response.total, 3);
        assert_eq!(response.primary_key_column.as_deref(), Some("id"));
        // the fake returns every row regardless of LIMIT
        assert!(!response.has_more);

        let executed = adapter.executed();
        assert_eq!(executed[1], r#"SELECT * FROM "public"."users" LIMIT 2"#);
    }

    #[tokio::test]
    async fn test_get_rows_rejects_unknown_sort_column() {
        let adapter = RecordingAdapter::users(1);
        let query = RowQuery {
            sort_by: Some("missing".into()),
            ..Default::default()
        };

        assert!(matches!(
            adapter.get_rows("users", &query).await,
            Err(DatabaseError::InvalidColumn(column)) if column == "missing"
        ));
        assert!(adapter.executed().is_empty());
    }

    #[tokio::test]
    async fn test_update_schema_runs_in_target_database() {
        let adapter = RecordingAdapter::users(0);
        let request = UpdateSchemaRequest {
            database: Some("app".into()),
            schema: "public".into(),
            table: "users".into(),
            operations: vec![SchemaOperation::DropColumn { name: "name".into() }],
        };

        let statements = adapter.update_schema(&request).await.unwrap();
        assert_eq!(statements, vec![r#"ALTER TABLE "public"."users" DROP COLUMN "name""#]);
        assert_eq!(
            adapter.executed_with_database(),
            vec![(statements[0].clone(), Some("app".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_batch_stops_at_failure() {
        let adapter = RecordingAdapter::users(0).failing_on("second");
        let statements: Vec<String> = ["first", "second", "third"].iter().map(|s| s.to_string()).collect();

        let error = execute_batch(&adapter, &statements, &QueryOptions::default()).await.unwrap_err();
        assert!(matches!(error, DatabaseError::BatchPartialFailure { failed_at: 2, total: 3, .. }));
        assert_eq!(adapter.executed(), vec!["first", "second"]);
    }
}
