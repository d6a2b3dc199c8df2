//! PostgreSQL database adapter implementation

use crate::config::QueryLimits;
use crate::database::traits::{queryable_target, DatabaseAdapter, DatabaseError};
use crate::database::{float_to_json, returns_rows};
use crate::dialect::Dialect;
use crate::identifier::ObjectKind;
use crate::operations::ReferentialAction;
use crate::schema::{
    ColumnInfo, DatabaseInfo, ForeignKeyInfo, IndexInfo, QueryOptions, QueryResult, SchemaInfo, TableInfo,
    TableMetadata,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, Uuid};
use sqlx::{Column, PgPool, Row, TypeInfo};
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

/// Connections opened per additional database
const DATABASE_POOL_SIZE: u32 = 4;

/// PostgreSQL database adapter
///
/// A PostgreSQL connection is bound to one database, so statements aimed at
/// another database go through a lazily created pool for that database.
pub struct PostgresAdapter {
    pool: PgPool,
    database_pools: RwLock<HashMap<String, PgPool>>,
    limits: QueryLimits,
}

impl PostgresAdapter {
    /// Create a new PostgreSQL adapter
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool for the default database
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            database_pools: RwLock::new(HashMap::new()),
            limits: QueryLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Pool connected to `database`, or the default pool
    async fn pool_for(&self, database: Option<&str>) -> PgPool {
        let Some(database) = database else {
            return self.pool.clone();
        };

        if let Some(pool) = self.database_pools.read().await.get(database) {
            return pool.clone();
        }

        let mut pools = self.database_pools.write().await;
        pools
            .entry(database.to_string())
            .or_insert_with(|| {
                debug!(database, "opening pool for database");
                let options = self.pool.connect_options().as_ref().clone().database(database);
                PgPoolOptions::new()
                    .max_connections(DATABASE_POOL_SIZE)
                    .connect_lazy_with(options)
            })
            .clone()
    }

    /// Convert a PostgreSQL row to a JSON object
    fn row_to_json(row: &PgRow) -> Result<Value, DatabaseError> {
        let mut map = serde_json::Map::new();

        for column in row.columns() {
            let column_name = column.name();
            let type_name = column.type_info().name();

            let value: Value = match type_name {
                "BOOL" => {
                    let val: Option<bool> = row.try_get(column_name)?;
                    val.map(Value::Bool).unwrap_or(Value::Null)
                }
                "INT2" => {
                    let val: Option<i16> = row.try_get(column_name)?;
                    val.map(|v| Value::Number(v.into())).unwrap_or(Value::Null)
                }
                "INT4" => {
                    let val: Option<i32> = row.try_get(column_name)?;
                    val.map(|v| Value::Number(v.into())).unwrap_or(Value::Null)
                }
                "INT8" => {
                    let val: Option<i64> = row.try_get(column_name)?;
                    val.map(|v| Value::Number(v.into())).unwrap_or(Value::Null)
                }
                "FLOAT4" => {
                    let val: Option<f32> = row.try_get(column_name)?;
                    val.map(|v| float_to_json(v as f64)).unwrap_or(Value::Null)
                }
                "FLOAT8" => {
                    let val: Option<f64> = row.try_get(column_name)?;
                    val.map(float_to_json).unwrap_or(Value::Null)
                }
                "NUMERIC" => {
                    // String keeps the precision intact
                    let val: Option<Decimal> = row.try_get(column_name)?;
                    val.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null)
                }
                "BYTEA" => {
                    let val: Option<Vec<u8>> = row.try_get(column_name)?;
                    val.map(|bytes| Value::String(format!("[BLOB: {} bytes]", bytes.len())))
                        .unwrap_or(Value::Null)
                }
                "TIMESTAMP" => {
                    let val: Option<NaiveDateTime> = row.try_get(column_name)?;
                    val.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null)
                }
                "TIMESTAMPTZ" => {
                    let val: Option<DateTime<Utc>> = row.try_get(column_name)?;
                    val.map(|v| Value::String(v.to_rfc3339())).unwrap_or(Value::Null)
                }
                "DATE" => {
                    let val: Option<NaiveDate> = row.try_get(column_name)?;
                    val.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null)
                }
                "TIME" => {
                    let val: Option<NaiveTime> = row.try_get(column_name)?;
                    val.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null)
                }
                "JSON" | "JSONB" => {
                    let val: Option<Value> = row.try_get(column_name)?;
                    val.unwrap_or(Value::Null)
                }
                "UUID" => {
                    let val: Option<Uuid> = row.try_get(column_name)?;
                    val.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null)
                }
                _ => {
                    // Fallback: try to get as string
                    let val: Option<String> = row.try_get(column_name).ok().flatten();
                    val.map(Value::String).unwrap_or(Value::Null)
                }
            };

            map.insert(column_name.to_string(), value);
        }

        Ok(Value::Object(map))
    }

    async fn fetch_strings(&self, sql: &str, database: Option<&str>, binds: &[&str]) -> Result<Vec<String>, DatabaseError> {
        let pool = self.pool_for(database).await;
        let mut query = sqlx::query_scalar::<_, String>(sql);
        for bind in binds {
            query = query.bind(*bind);
        }
        Ok(query.fetch_all(&pool).await?)
    }
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, DatabaseError> {
        let query = r#"
            SELECT datname::text
            FROM pg_database
            WHERE NOT datistemplate
              AND datallowconn
            ORDER BY datname
        "#;

        let names = self.fetch_strings(query, None, &[]).await?;
        Ok(names.into_iter().map(DatabaseInfo::new).collect())
    }

    async fn list_schemas(&self, database: Option<&str>) -> Result<Vec<SchemaInfo>, DatabaseError> {
        let query = r#"
            SELECT schema_name::text
            FROM information_schema.schemata
            WHERE schema_name NOT IN ('pg_catalog', 'information_schema')
              AND schema_name NOT LIKE 'pg\_toast%'
              AND schema_name NOT LIKE 'pg\_temp%'
            ORDER BY schema_name
        "#;

        let names = self.fetch_strings(query, database, &[]).await?;
        Ok(names
            .into_iter()
            .map(|name| SchemaInfo::new(database, name))
            .collect())
    }

    async fn list_tables(&self, database: Option<&str>, schema: &str) -> Result<Vec<TableInfo>, DatabaseError> {
        let query = r#"
            SELECT table_name::text AS table_name, table_type::text AS table_type
            FROM information_schema.tables
            WHERE table_schema = $1
            ORDER BY table_name
        "#;

        let pool = self.pool_for(database).await;
        let rows = sqlx::query(query).bind(schema).fetch_all(&pool).await?;

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
        let pool = self.pool_for(target.database.as_deref()).await;
        let (schema, table) = (target.schema.as_str(), target.table.as_str());

        // Get column information
        let column_query = r#"
            SELECT
                column_name::text AS column_name,
                CASE WHEN data_type IN ('USER-DEFINED', 'ARRAY') THEN udt_name ELSE data_type END::text AS data_type,
                is_nullable::text AS is_nullable,
                column_default::text AS column_default
            FROM information_schema.columns
            WHERE table_schema = $1
              AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let column_rows = sqlx::query(column_query)
            .bind(schema)
            .bind(table)
            .fetch_all(&pool)
            .await?;

        if column_rows.is_empty() {
            return Err(DatabaseError::TableNotFound(table_id.to_string()));
        }

        // Get primary key columns
        let pk_query = r#"
            SELECT kcu.column_name::text
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
              AND tc.table_schema = kcu.table_schema
            WHERE tc.table_schema = $1
              AND tc.table_name = $2
              AND tc.constraint_type = 'PRIMARY KEY'
            ORDER BY kcu.ordinal_position
        "#;

        let primary_key_columns = self
            .fetch_strings(pk_query, target.database.as_deref(), &[schema, table])
            .await?;

        // Get foreign keys with their referential actions
        let fk_query = r#"
            SELECT
                tc.constraint_name::text AS constraint_name,
                kcu.column_name::text AS column_name,
                ccu.table_schema::text AS references_schema,
                ccu.table_name::text AS references_table,
                ccu.column_name::text AS references_column,
                rc.delete_rule::text AS delete_rule,
                rc.update_rule::text AS update_rule
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
              AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
              ON ccu.constraint_name = tc.constraint_name
              AND ccu.constraint_schema = tc.constraint_schema
            JOIN information_schema.referential_constraints rc
              ON rc.constraint_name = tc.constraint_name
              AND rc.constraint_schema = tc.constraint_schema
            WHERE tc.table_schema = $1
              AND tc.table_name = $2
              AND tc.constraint_type = 'FOREIGN KEY'
            ORDER BY tc.constraint_name, kcu.ordinal_position
        "#;

        let fk_rows = sqlx::query(fk_query)
            .bind(schema)
            .bind(table)
            .fetch_all(&pool)
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

        // Get non-primary indexes with their columns in key order
        let index_query = r#"
            SELECT
                index_class.relname::text AS index_name,
                ix.indisunique AS is_unique,
                array_agg(a.attname::text ORDER BY k.ordinality) AS columns
            FROM pg_class table_class
            JOIN pg_namespace n ON n.oid = table_class.relnamespace
            JOIN pg_index ix ON ix.indrelid = table_class.oid
            JOIN pg_class index_class ON index_class.oid = ix.indexrelid
            JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ordinality) ON true
            JOIN pg_attribute a ON a.attrelid = table_class.oid AND a.attnum = k.attnum
            WHERE n.nspname = $1
              AND table_class.relname = $2
              AND NOT ix.indisprimary
            GROUP BY index_class.relname, ix.indisunique
            ORDER BY index_class.relname
        "#;

        let index_rows = sqlx::query(index_query)
            .bind(schema)
            .bind(table)
            .fetch_all(&pool)
            .await?;

        let indexes: Vec<IndexInfo> = index_rows
            .iter()
            .map(|row| {
                Ok(IndexInfo {
                    name: row.try_get("index_name")?,
                    columns: row.try_get("columns")?,
                    unique: row.try_get("is_unique")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        // Build column info
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
        let pool = self.pool_for(options.database.as_deref()).await;
        let start_time = Instant::now();
        debug!(database = ?options.database, %sql, "executing statement");

        if returns_rows(sql) {
            let rows = tokio::time::timeout(self.limits.timeout, sqlx::query(sql).persistent(false).fetch_all(&pool))
                .await
                .map_err(|_| DatabaseError::Timeout)??;

            if rows.len() as u64 > self.limits.max_result_rows {
                return Err(DatabaseError::TooManyRows(self.limits.max_result_rows));
            }

            let columns = rows
                .first()
                .map(|row| row.columns().iter().map(|column| column.name().to_string()).collect())
                .unwrap_or_default();

            let json_rows = rows
                .iter()
                .map(Self::row_to_json)
                .collect::<Result<Vec<_>, _>>()?;

            Ok(QueryResult {
                columns,
                rows: json_rows,
                affected_rows: 0,
                execution_time_milliseconds: start_time.elapsed().as_millis() as u64,
                error: None,
            })
        } else {
            // Simple query protocol, so DDL and multi-statement text work
            let result = tokio::time::timeout(self.limits.timeout, sqlx::raw_sql(sql).execute(&pool))
                .await
                .map_err(|_| DatabaseError::Timeout)??;

            Ok(QueryResult {
                affected_rows: result.rows_affected(),
                execution_time_milliseconds: start_time.elapsed().as_millis() as u64,
                ..Default::default()
            })
        }
    }
}
