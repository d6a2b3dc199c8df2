//! Connection listing and database-level endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::info;

use crate::api::{ApiError, ApiState};
use crate::schema::{ConnectionInfo, CreateDatabaseRequest, DatabaseInfo};

/// Handler for GET /api/connections
pub async fn list_connections_handler(State(state): State<ApiState>) -> Json<Vec<ConnectionInfo>> {
    Json(state.registry.list())
}

/// Handler for GET /api/connections/{id}/databases
///
/// Returns the databases visible to the connection.
pub async fn list_databases_handler(
    State(state): State<ApiState>,
    Path(connection_id): Path<String>,
) -> Result<Json<Vec<DatabaseInfo>>, ApiError> {
    let adapter = state.adapter(&connection_id)?;
    Ok(Json(adapter.list_databases().await?))
}

/// Handler for POST /api/connections/{id}/databases
///
/// Request body:
/// ```json
/// { "name": "reports" }
/// ```
pub async fn create_database_handler(
    State(state): State<ApiState>,
    Path(connection_id): Path<String>,
    Json(request): Json<CreateDatabaseRequest>,
) -> Result<Response, ApiError> {
    info!(connection = %connection_id, database = %request.name, "creating database");
    state.registry.create_database(&connection_id, &request.name).await?;
    Ok((StatusCode::CREATED, Json(DatabaseInfo::new(request.name))).into_response())
}

/// Handler for DELETE /api/connections/{id}/databases/{name}
pub async fn drop_database_handler(
    State(state): State<ApiState>,
    Path((connection_id, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    info!(connection = %connection_id, database = %name, "dropping database");
    state.registry.drop_database(&connection_id, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
