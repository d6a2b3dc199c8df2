//! Schema mutation endpoint

use axum::{
    extract::{Path, State},
    response::Json,
};
use tracing::info;

use crate::api::{ApiError, ApiState};
use crate::schema::{MutationResponse, UpdateSchemaRequest};

/// Handler for POST /api/connections/{id}/schema
///
/// Applies the operations in order, one statement each. There is no
/// surrounding transaction: when statement N of M fails, statements before
/// it stay applied and the response is 409 with
/// `"Failed at operation N of M: ..."`.
///
/// Request body:
/// ```json
/// {
///   "schema": "public",
///   "table": "users",
///   "operations": [
///     { "type": "drop_pk" },
///     { "type": "add_pk", "columns": ["id", "tenant_id"] }
///   ]
/// }
/// ```
pub async fn update_schema_handler(
    State(state): State<ApiState>,
    Path(connection_id): Path<String>,
    Json(request): Json<UpdateSchemaRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let adapter = state.adapter(&connection_id)?;
    info!(
        connection = %connection_id,
        table = %request.table,
        operations = request.operations.len(),
        "altering table"
    );

    let statements = adapter.update_schema(&request).await?;
    Ok(Json(MutationResponse {
        affected_rows: 0,
        statements,
    }))
}
