//! Drives the explorer router end to end against an in-memory adapter

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use axum_db_explorer::identifier::resolve;
use axum_db_explorer::schema::{
    ColumnInfo, DatabaseInfo, QueryOptions, QueryResult, SchemaInfo, TableInfo, TableMetadata,
};
use axum_db_explorer::{DatabaseAdapter, DatabaseError, Dialect, ExplorerConfig, ExplorerLayer, ObjectKind};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// `public.users(id, name)` keyed on `id`; fails statements containing `fail_on`
struct FakeAdapter {
    rows: Vec<Value>,
    fail_on: Option<&'static str>,
    executed: Mutex<Vec<String>>,
}

impl FakeAdapter {
    fn new(row_count: i64) -> Self {
        Self {
            rows: (1..=row_count).map(|id| json!({"id": id, "name": format!("user {id}")})).collect(),
            fail_on: None,
            executed: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(mut self, fragment: &'static str) -> Self {
        self.fail_on = Some(fragment);
        self
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl DatabaseAdapter for FakeAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, DatabaseError> {
        Ok(vec![DatabaseInfo::new("app".into())])
    }

    async fn list_schemas(&self, database: Option<&str>) -> Result<Vec<SchemaInfo>, DatabaseError> {
        Ok(vec![SchemaInfo::new(database, "public".into())])
    }

    async fn list_tables(&self, database: Option<&str>, schema: &str) -> Result<Vec<TableInfo>, DatabaseError> {
        Ok(vec![
            TableInfo::new(database, schema, "users".into(), ObjectKind::Table),
            TableInfo::new(database, schema, "active_users".into(), ObjectKind::View),
        ])
    }

    async fn get_metadata(&self, table_id: &str) -> Result<TableMetadata, DatabaseError> {
        let target = resolve(table_id)
            .table_target()
            .filter(|target| target.table == "users")
            .ok_or_else(|| DatabaseError::TableNotFound(table_id.to_string()))?;

        let column = |name: &str, is_primary_key: bool| ColumnInfo {
            name: name.to_string(),
            data_type: "text".to_string(),
            nullable: !is_primary_key,
            default_value: None,
            is_primary_key,
        };

        Ok(TableMetadata {
            database: target.database,
            schema: target.schema,
            name: target.table,
            columns: vec![column("id", true), column("name", false)],
            primary_key: Some(vec!["id".to_string()]),
            foreign_keys: vec![],
            indexes: vec![],
        })
    }

    async fn execute_query(&self, sql: &str, _options: &QueryOptions) -> Result<QueryResult, DatabaseError> {
        self.executed.lock().unwrap().push(sql.to_string());

        if self.fail_on.is_some_and(|fragment| sql.contains(fragment)) {
            return Err(DatabaseError::Query("simulated failure".into()));
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

fn router(adapter: Arc<FakeAdapter>) -> Router {
    ExplorerLayer::new(ExplorerConfig::new())
        .connection("main", adapter)
        .into_router()
}

async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_lists_connections_and_catalog() {
    let adapter = Arc::new(FakeAdapter::new(0));

    let (status, body) = send(router(adapter.clone()), "GET", "/db-explorer/api/connections", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"id": "main", "dialect": "postgres"}]));

    let (status, body) = send(
        router(adapter.clone()),
        "GET",
        "/db-explorer/api/connections/main/tables?database=app&schema=public",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "db:app.schema:public.table:users");
    assert_eq!(body[1]["kind"], "view");
    assert_eq!(body[1]["id"], "db:app.schema:public.view:active_users");
}

#[tokio::test]
async fn test_unknown_connection_is_not_found() {
    let (status, body) = send(
        router(Arc::new(FakeAdapter::new(0))),
        "GET",
        "/db-explorer/api/connections/other/databases",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Unknown connection: other");
}

#[tokio::test]
async fn test_metadata_for_missing_table_is_not_found() {
    let (status, body) = send(
        router(Arc::new(FakeAdapter::new(0))),
        "GET",
        "/db-explorer/api/connections/main/objects/schema:public.table:ghosts/metadata",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("ghosts"));
}

#[tokio::test]
async fn test_rows_are_paged_with_clamped_limit() {
    let adapter = Arc::new(FakeAdapter::new(3));
    let (status, body) = send(
        router(adapter.clone()),
        "GET",
        "/db-explorer/api/connections/main/objects/schema:public.table:users/rows?limit=5000&sortBy=name&sortOrder=descending",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["limit"], 500);
    assert_eq!(body["primaryKeyColumn"], "id");
    assert_eq!(body["hasMore"], false);
    assert_eq!(body["rows"].as_array().unwrap().len(), 3);

    let executed = adapter.executed();
    assert_eq!(executed[0], r#"SELECT COUNT(*) AS "count" FROM "public"."users""#);
    assert!(executed[1].contains(r#"ORDER BY "name" DESC"#), "{}", executed[1]);
}

#[tokio::test]
async fn test_sorting_by_unknown_column_is_rejected() {
    let (status, _) = send(
        router(Arc::new(FakeAdapter::new(3))),
        "GET",
        "/db-explorer/api/connections/main/objects/users/rows?sortBy=nope",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_schema_operations_run_in_order() {
    let adapter = Arc::new(FakeAdapter::new(0));
    let (status, body) = send(
        router(adapter.clone()),
        "POST",
        "/db-explorer/api/connections/main/schema",
        Some(json!({
            "table": "users",
            "operations": [
                {"type": "drop_pk"},
                {"type": "add_pk", "columns": ["id"]}
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let expected = vec![
        r#"ALTER TABLE "public"."users" DROP CONSTRAINT "users_pkey""#,
        r#"ALTER TABLE "public"."users" ADD PRIMARY KEY ("id")"#,
    ];
    assert_eq!(body["statements"], json!(expected));
    assert_eq!(adapter.executed(), expected);
}

#[tokio::test]
async fn test_schema_partial_failure_is_conflict() {
    let adapter = Arc::new(FakeAdapter::new(0).failing_on("ADD PRIMARY KEY"));
    let (status, body) = send(
        router(adapter.clone()),
        "POST",
        "/db-explorer/api/connections/main/schema",
        Some(json!({
            "table": "users",
            "operations": [
                {"type": "drop_pk"},
                {"type": "add_pk", "columns": ["id"]},
                {"type": "drop_column", "name": "name"}
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed at operation 2 of 3"));
    assert_eq!(adapter.executed().len(), 2);
}

#[tokio::test]
async fn test_row_mutations() {
    let adapter = Arc::new(FakeAdapter::new(2));

    let (status, body) = send(
        router(adapter.clone()),
        "POST",
        "/db-explorer/api/connections/main/rows/update",
        Some(json!({
            "table": "users",
            "pkColumn": "id",
            "pkValue": 2,
            "updates": [["name", "O'Brien"]]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affectedRows"], 1);

    let (status, _) = send(
        router(adapter.clone()),
        "POST",
        "/db-explorer/api/connections/main/rows/delete",
        Some(json!({"tableId": "schema:public.table:users", "pkColumn": "id", "pkValues": [1, 2]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        router(adapter.clone()),
        "POST",
        "/db-explorer/api/connections/main/rows/insert",
        Some(json!({"tableId": "schema:public.table:users", "values": [["id", ""], ["name", "null"]]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        adapter.executed(),
        vec![
            r#"UPDATE "public"."users" SET "name" = 'O''Brien' WHERE "id" = 2"#,
            r#"DELETE FROM "public"."users" WHERE "id" IN (1, 2)"#,
            r#"INSERT INTO "public"."users" ("name") VALUES (NULL)"#,
        ]
    );
}

#[tokio::test]
async fn test_row_mutations_are_validated() {
    let adapter = Arc::new(FakeAdapter::new(1));

    let (status, _) = send(
        router(adapter.clone()),
        "POST",
        "/db-explorer/api/connections/main/rows/update",
        Some(json!({"table": "users", "pkColumn": "name", "pkValue": "x", "updates": [["id", 3]]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        router(adapter.clone()),
        "POST",
        "/db-explorer/api/connections/main/rows/insert",
        Some(json!({"tableId": "users", "values": [["name", ""]]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid statement: No values to insert");

    assert!(adapter.executed().is_empty());
}

#[tokio::test]
async fn test_query_errors_use_result_shape() {
    let adapter = Arc::new(FakeAdapter::new(0).failing_on("SELCT"));
    let (status, body) = send(
        router(adapter),
        "POST",
        "/db-explorer/api/connections/main/query",
        Some(json!({"sql": "SELCT 1"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Database error: simulated failure");
    assert_eq!(body["rows"], json!([]));
}

#[tokio::test]
async fn test_create_and_drop_database() {
    let adapter = Arc::new(FakeAdapter::new(0));

    let (status, body) = send(
        router(adapter.clone()),
        "POST",
        "/db-explorer/api/connections/main/databases",
        Some(json!({"name": "reports"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "db:reports");

    let (status, _) = send(
        router(adapter.clone()),
        "DELETE",
        "/db-explorer/api/connections/main/databases/reports",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(
        adapter.executed(),
        vec![r#"CREATE DATABASE "reports""#, r#"DROP DATABASE "reports""#]
    );
}
