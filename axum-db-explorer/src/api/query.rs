//! Raw SQL query execution endpoint

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{debug, warn};

use crate::api::{database_status, ApiState};
use crate::database::traits::DatabaseError;
use crate::schema::{QueryOptions, QueryRequest, QueryResult};

/// Handler for POST /api/connections/{id}/query
///
/// Executes a raw SQL statement, optionally inside another database of the
/// same connection.
///
/// # Security Warning
///
/// This endpoint allows executing ANY SQL statement including INSERT, UPDATE, DELETE.
/// It should only be used in development environments!
///
/// Request body:
/// ```json
/// {
///   "sql": "SELECT * FROM users LIMIT 10",
///   "database": "app"
/// }
/// ```
///
/// Response (error):
/// ```json
/// {
///   "columns": [],
///   "rows": [],
///   "affectedRows": 0,
///   "executionTimeMilliseconds": 0,
///   "error": "relation \"userz\" does not exist"
/// }
/// ```
pub async fn execute_query_handler(
    State(state): State<ApiState>,
    Path(connection_id): Path<String>,
    Json(request): Json<QueryRequest>,
) -> Response {
    let adapter = match state.registry.get(&connection_id) {
        Ok(adapter) => adapter,
        Err(error) => return failure(StatusCode::NOT_FOUND, error.to_string()),
    };

    debug!(connection = %connection_id, sql = %request.sql, "executing query");
    let options = QueryOptions::in_database(request.database);

    match adapter.execute_query(&request.sql, &options).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(error) => {
            warn!(connection = %connection_id, %error, "query failed");

            // Driver errors are the caller's SQL, not a server fault
            let status = match &error {
                DatabaseError::Query(_) => StatusCode::BAD_REQUEST,
                other => database_status(other),
            };
            failure(status, error.to_string())
        }
    }
}

/// Error reported inside the usual result shape
fn failure(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(QueryResult {
            error: Some(message),
            ..Default::default()
        }),
    )
        .into_response()
}
