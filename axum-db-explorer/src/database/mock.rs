//! In-memory adapter that records every statement it is asked to run

use crate::database::traits::{DatabaseAdapter, DatabaseError};
use crate::dialect::Dialect;
use crate::identifier::{resolve, ObjectKind};
use crate::schema::{
    ColumnInfo, DatabaseInfo, QueryOptions, QueryResult, SchemaInfo, TableInfo, TableMetadata,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;

pub struct RecordingAdapter {
    dialect: Dialect,
    metadata: TableMetadata,
    rows: Vec<Value>,
    fail_on: Option<String>,
    stall_on: Option<String>,
    executed: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingAdapter {
    /// `users(id, name)` keyed on `id`, with `row_count` rows
    pub fn users(row_count: i64) -> Self {
        Self::with_primary_key(row_count, Some(vec!["id"]))
    }

    pub fn with_primary_key(row_count: i64, primary_key: Option<Vec<&str>>) -> Self {
        let column = |name: &str| ColumnInfo {
            name: name.to_string(),
            data_type: "text".to_string(),
            nullable: name != "id",
            default_value: None,
            is_primary_key: primary_key.as_ref().is_some_and(|key| key.contains(&name)),
        };

        Self {
            dialect: Dialect::Postgres,
            metadata: TableMetadata {
                database: None,
                schema: "public".into(),
                name: "users".into(),
                columns: vec![column("id"), column("name")],
                primary_key: primary_key.map(|key| key.into_iter().map(String::from).collect()),
                foreign_keys: vec![],
                indexes: vec![],
            },
            rows: (1..=row_count).map(|id| json!({"id": id, "name": format!("user {id}")})).collect(),
            fail_on: None,
            stall_on: None,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Fail any statement containing `fragment`
    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.fail_on = Some(fragment.to_string());
        self
    }

    /// Never finish any statement containing `fragment`
    pub fn stalling_on(mut self, fragment: &str) -> Self {
        self.stall_on = Some(fragment.to_string());
        self
    }

    pub fn metadata(&self) -> TableMetadata {
        self.metadata.clone()
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed_with_database().into_iter().map(|(sql, _)| sql).collect()
    }

    pub fn executed_with_database(&self) -> Vec<(String, Option<String>)> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl DatabaseAdapter for RecordingAdapter {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, DatabaseError> {
        Ok(vec![DatabaseInfo::new("app".into())])
    }

    async fn list_schemas(&self, database: Option<&str>) -> Result<Vec<SchemaInfo>, DatabaseError> {
        Ok(vec![SchemaInfo::new(database, "public".into())])
    }

    async fn list_tables(&self, database: Option<&str>, schema: &str) -> Result<Vec<TableInfo>, DatabaseError> {
        Ok(vec![TableInfo::new(database, schema, self.metadata.name.clone(), ObjectKind::Table)])
    }

    async fn get_metadata(&self, table_id: &str) -> Result<TableMetadata, DatabaseError> {
        match resolve(table_id).table_target() {
            Some(target) if target.table == self.metadata.name => Ok(self.metadata.clone()),
            _ => Err(DatabaseError::TableNotFound(table_id.to_string())),
        }
    }

    async fn execute_query(&self, sql: &str, options: &QueryOptions) -> Result<QueryResult, DatabaseError> {
        self.executed
            .lock()
            .unwrap()
            .push((sql.to_string(), options.database.clone()));

        if self.stall_on.as_deref().is_some_and(|fragment| sql.contains(fragment)) {
            std::future::pending::<()>().await;
        }
        if self.fail_on.as_deref().is_some_and(|fragment| sql.contains(fragment)) {
            return Err(DatabaseError::Query(format!("simulated failure: {sql}")));
        }

        if sql.starts_with("SELECT COUNT(*)") {
            return Ok(QueryResult {
                columns: vec!["count".into()],
                rows: vec![json!({"count": self.rows.len()})],
                ..Default::default()
            });
        }

        if sql.starts_with("SELECT") {
            return Ok(QueryResult {
                columns: vec!["id".into(), "name".into()],
                rows: self.rows.clone(),
                ..Default::default()
            });
        }

        Ok(QueryResult {
            affected_rows: 1,
            ..Default::default()
        })
    }
}
