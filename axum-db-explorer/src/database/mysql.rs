//! MySQL database adapter implementation
//!
//! MySQL has no schema level below the database. The adapter exposes each
//! database as a single schema of the same name and uses the database as the
//! namespace for every catalog lookup.

use crate::config::QueryLimits;
use crate::database::traits::{execute_batch, queryable_target, DatabaseAdapter, DatabaseError};
use crate::database::{float_to_json, returns_rows};
use crate::dialect::Dialect;
use crate::identifier::{ObjectKind, TableTarget, DEFAULT_SCHEMA};
use crate::operations::{carry_nullability, translate, ReferentialAction, SchemaOperation};
use crate::schema::{
    ColumnInfo, DatabaseInfo, ForeignKeyInfo, IndexInfo, QueryOptions, QueryResult, SchemaInfo, TableInfo,
    TableMetadata, UpdateSchemaRequest,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::MySqlRow;
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::Decimal;
use sqlx::{Column, Executor, MySqlPool, Row, TypeInfo, ValueRef};
use std::time::Instant;
use tracing::{debug, warn};

/// Databases every server carries that are not user data
const SYSTEM_DATABASES: [&str; 4] = ["information_schema", "mysql", "performance_schema", "sys"];

/// MySQL database adapter
pub struct MySqlAdapter {
    pool: MySqlPool,
    limits: QueryLimits,
}

impl MySqlAdapter {
    /// Create a new MySQL adapter
    ///
    /// # Arguments
    ///
    /// * `pool` - MySQL connection pool
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            limits: QueryLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Database that holds a target; `None` means the connection's current one
    fn namespace(target: &TableTarget) -> Option<&str> {
        target
            .database
            .as_deref()
            .or((target.schema != DEFAULT_SCHEMA).then_some(target.schema.as_str()))
    }

    /// Convert a MySQL row to a JSON object
    fn row_to_json(row: &MySqlRow) -> Result<Value, DatabaseError> {
        let mut map = serde_json::Map::new();

        for (index, column) in row.columns().iter().enumerate() {
            let value = Self::column_to_json(row, index, column.type_info().name())?;
            map.insert(column.name().to_string(), value);
        }

        Ok(Value::Object(map))
    }

    fn column_to_json(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value, DatabaseError> {
        if row.try_get_raw(index)?.is_null() {
            return Ok(Value::Null);
        }

        let value = match type_name {
            "BOOLEAN" => Value::Bool(row.try_get(index)?),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => Value::from(row.try_get::<i64, _>(index)?),
            name if name.ends_with("UNSIGNED") => Value::from(row.try_get::<u64, _>(index)?),
            "FLOAT" => float_to_json(row.try_get::<f32, _>(index)? as f64),
            "DOUBLE" => float_to_json(row.try_get(index)?),
            "DECIMAL" => Value::String(row.try_get::<Decimal, _>(index)?.to_string()),
            "DATETIME" => Value::String(row.try_get::<NaiveDateTime, _>(index)?.to_string()),
            "TIMESTAMP" => Value::String(row.try_get::<DateTime<Utc>, _>(index)?.to_rfc3339()),
            "DATE" => Value::String(row.try_get::<NaiveDate, _>(index)?.to_string()),
            "JSON" => row.try_get(index)?,
            "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
                let bytes: Vec<u8> = row.try_get(index)?;
                Value::String(format!("[BLOB: {} bytes]", bytes.len()))
            }
            // TIME can exceed a day, YEAR and BIT have no natural JSON shape
            _ => Self::fallback_to_json(row, index),
        };

        Ok(value)
    }

    fn fallback_to_json(row: &MySqlRow, index: usize) -> Value {
        if let Ok(text) = row.try_get::<String, _>(index) {
            return Value::String(text);
        }
        if let Ok(time) = row.try_get::<NaiveTime, _>(index) {
            return Value::String(time.to_string());
        }
        if let Ok(number) = row.try_get::<i64, _>(index) {
            return Value::from(number);
        }
        if let Ok(number) = row.try_get::<u64, _>(index) {
            return Value::from(number);
        }
        match row.try_get::<Vec<u8>, _>(index) {
            Ok(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
            Err(_) => Value::Null,
        }
    }
}

#[async_trait]
impl DatabaseAdapter for MySqlAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, DatabaseError> {
        let query = r#"
            SELECT CAST(SCHEMA_NAME AS CHAR)
            FROM information_schema.SCHEMATA
            ORDER BY SCHEMA_NAME
        "#;

        let names: Vec<String> = sqlx::query_scalar(query).fetch_all(&self.pool).await?;
        Ok(names
            .into_iter()
            .filter(|name| !SYSTEM_DATABASES.contains(&name.as_str()))
            .map(DatabaseInfo::new)
            .collect())
    }

    async fn list_schemas(&self, database: Option<&str>) -> Result<Vec<SchemaInfo>, DatabaseError> {
        let name = match database {
            Some(database) => Some(database.to_string()),
            None => sqlx::query_scalar::<_, Option<String>>("SELECT DATABASE()")
                .fetch_one(&self.pool)
                .await?,
        };

        Ok(name
            .into_iter()
            .map(|name| SchemaInfo::new(database, name))
            .collect())
    }

    async fn list_tables(&self, database: Option<&str>, schema: &str) -> Result<Vec<TableInfo>, DatabaseError> {
        let query = r#"
            SELECT CAST(TABLE_NAME AS CHAR) AS table_name, CAST(TABLE_TYPE AS CHAR) AS table_type
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
            ORDER BY TABLE_NAME
        "#;

        let namespace = database.or((schema != DEFAULT_SCHEMA).then_some(schema));
        let rows = sqlx::query(query).bind(namespace).fetch_all(&self.pool).await?;

        let tables = rows
            .iter()
            .map(|row| {
                let name: String = row.try_get("table_name")?;
                let table_type: String = row.try_get("table_type")?;
                let kind = if table_type == "VIEW" {
                    ObjectKind::View
                } else {
                    ObjectKind::Table
                };
                Ok(TableInfo::new(database, schema, name, kind))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(tables)
    }

    async fn get_metadata(&self, table_id: &str) -> Result<TableMetadata, DatabaseError> {
        let target = queryable_target(table_id)?;
        let namespace = Self::namespace(&target);
        let table = target.table.as_str();

        let column_query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR) AS column_name,
                CAST(COLUMN_TYPE AS CHAR) AS data_type,
                CAST(IS_NULLABLE AS CHAR) AS is_nullable,
                CAST(COLUMN_DEFAULT AS CHAR) AS column_default,
                CAST(COLUMN_KEY AS CHAR) AS column_key
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
              AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let column_rows = sqlx::query(column_query)
            .bind(namespace)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        if column_rows.is_empty() {
            return Err(DatabaseError::TableNotFound(table_id.to_string()));
        }

        let pk_query = r#"
            SELECT CAST(COLUMN_NAME AS CHAR)
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
              AND TABLE_NAME = ?
              AND CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY ORDINAL_POSITION
        "#;

        let primary_key_columns: Vec<String> = sqlx::query_scalar(pk_query)
            .bind(namespace)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let fk_query = r#"
            SELECT
                CAST(kcu.CONSTRAINT_NAME AS CHAR) AS constraint_name,
                CAST(kcu.COLUMN_NAME AS CHAR) AS column_name,
                CAST(kcu.REFERENCED_TABLE_SCHEMA AS CHAR) AS references_schema,
                CAST(kcu.REFERENCED_TABLE_NAME AS CHAR) AS references_table,
                CAST(kcu.REFERENCED_COLUMN_NAME AS CHAR) AS references_column,
                CAST(rc.DELETE_RULE AS CHAR) AS delete_rule,
                CAST(rc.UPDATE_RULE AS CHAR) AS update_rule
            FROM information_schema.KEY_COLUMN_USAGE kcu
            JOIN information_schema.REFERENTIAL_CONSTRAINTS rc
              ON rc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA
              AND rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME
            WHERE kcu.TABLE_SCHEMA = COALESCE(?, DATABASE())
              AND kcu.TABLE_NAME = ?
              AND kcu.REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY kcu.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
        "#;

        let fk_rows = sqlx::query(fk_query)
            .bind(namespace)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let foreign_keys: Vec<ForeignKeyInfo> = fk_rows
            .iter()
            .map(|row| {
                let delete_rule: String = row.try_get("delete_rule")?;
                let update_rule: String = row.try_get("update_rule")?;
                Ok(ForeignKeyInfo {
                    constraint_name: row.try_get("constraint_name")?,
                    column: row.try_get("column_name")?,
                    references_schema: row.try_get("references_schema")?,
                    references_table: row.try_get("references_table")?,
                    references_column: row.try_get("references_column")?,
                    on_delete: ReferentialAction::from_sql(&delete_rule),
                    on_update: ReferentialAction::from_sql(&update_rule),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let index_query = r#"
            SELECT
                CAST(INDEX_NAME AS CHAR) AS index_name,
                CAST(COLUMN_NAME AS CHAR) AS column_name,
                CAST(NON_UNIQUE AS SIGNED) AS non_unique
            FROM information_schema.STATISTICS
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
              AND TABLE_NAME = ?
              AND INDEX_NAME <> 'PRIMARY'
            ORDER BY INDEX_NAME, SEQ_IN_INDEX
        "#;

        let index_rows = sqlx::query(index_query)
            .bind(namespace)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        // Rows arrive ordered by index then position; fold them per index
        let mut indexes: Vec<IndexInfo> = Vec::new();
        for row in &index_rows {
            let name: String = row.try_get("index_name")?;
            let column: Option<String> = row.try_get("column_name")?;
            let non_unique: i64 = row.try_get("non_unique")?;

            if let Some(index) = indexes.last_mut().filter(|index| index.name == name) {
                index.columns.extend(column);
            } else {
                indexes.push(IndexInfo {
                    name,
                    // functional index parts have no column name
                    columns: column.into_iter().collect(),
                    unique: non_unique == 0,
                });
            }
        }

        let columns: Vec<ColumnInfo> = column_rows
            .iter()
            .map(|row| {
                let column_name: String = row.try_get("column_name")?;
                let is_nullable: String = row.try_get("is_nullable")?;

                Ok(ColumnInfo {
                    is_primary_key: primary_key_columns.contains(&column_name),
                    name: column_name,
                    data_type: row.try_get("data_type")?,
                    nullable: is_nullable == "YES",
                    default_value: row.try_get("column_default")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(TableMetadata {
            database: target.database.clone(),
            schema: target.schema.clone(),
            name: target.table.clone(),
            columns,
            primary_key: (!primary_key_columns.is_empty()).then_some(primary_key_columns),
            foreign_keys,
            indexes,
        })
    }

    async fn execute_query(&self, sql: &str, options: &QueryOptions) -> Result<QueryResult, DatabaseError> {
        debug!(database = ?options.database, %sql, "executing statement");
        let mut connection = self.pool.acquire().await?;

        // USE sticks to the pooled connection, so the previous database is
        // restored before release
        let mut previous_database = None;
        if let Some(database) = options.database.as_deref() {
            let row = connection.fetch_one("SELECT DATABASE()").await?;
            previous_database = Some(row.try_get::<Option<String>, _>(0)?);

            let use_statement = format!("USE {}", Dialect::MySql.quote_identifier(database));
            connection.execute(use_statement.as_str()).await?;
        }

        let start_time = Instant::now();
        let result = if returns_rows(sql) {
            match tokio::time::timeout(self.limits.timeout, connection.fetch_all(sqlx::query(sql).persistent(false))).await {
                Err(_) => Err(DatabaseError::Timeout),
                Ok(Err(error)) => Err(error.into()),
                Ok(Ok(rows)) if rows.len() as u64 > self.limits.max_result_rows => {
                    Err(DatabaseError::TooManyRows(self.limits.max_result_rows))
                }
                Ok(Ok(rows)) => rows
                    .iter()
                    .map(Self::row_to_json)
                    .collect::<Result<Vec<_>, _>>()
                    .map(|json_rows| QueryResult {
                        columns: rows
                            .first()
                            .map(|row| row.columns().iter().map(|column| column.name().to_string()).collect())
                            .unwrap_or_default(),
                        rows: json_rows,
                        affected_rows: 0,
                        execution_time_milliseconds: start_time.elapsed().as_millis() as u64,
                        error: None,
                    }),
            }
        } else {
            // Text protocol, so DDL and multi-statement text work
            match tokio::time::timeout(self.limits.timeout, connection.execute(sqlx::raw_sql(sql))).await {
                Err(_) => Err(DatabaseError::Timeout),
                Ok(Err(error)) => Err(error.into()),
                Ok(Ok(done)) => Ok(QueryResult {
                    affected_rows: done.rows_affected(),
                    execution_time_milliseconds: start_time.elapsed().as_millis() as u64,
                    ..Default::default()
                }),
            }
        };

        match previous_database {
            Some(Some(previous)) => {
                let restore = format!("USE {}", Dialect::MySql.quote_identifier(&previous));
                if let Err(error) = connection.execute(restore.as_str()).await {
                    warn!(%error, "failed to restore database, discarding connection");
                    connection.close_on_drop();
                }
            }
            // no database to go back to
            Some(None) => connection.close_on_drop(),
            None => {}
        }

        result
    }

    /// MySQL's MODIFY COLUMN resets nullability, so a type change that does
    /// not say otherwise keeps the column's current setting.
    async fn update_schema(&self, request: &UpdateSchemaRequest) -> Result<Vec<String>, DatabaseError> {
        let needs_metadata = request
            .operations
            .iter()
            .any(|operation| matches!(operation, SchemaOperation::AlterColumnType { is_nullable: None, .. }));

        let mut operations = request.operations.clone();
        if needs_metadata {
            let metadata = self.get_metadata(&request.target().identifier()).await?;
            let current = metadata
                .columns
                .iter()
                .map(|column| (column.name.clone(), column.nullable))
                .collect();
            carry_nullability(&mut operations, current);
        }

        let statements = translate(&request.target(), &operations, self.dialect())?;
        execute_batch(self, &statements, &QueryOptions::in_database(request.database.clone())).await?;
        Ok(statements)
    }
}
