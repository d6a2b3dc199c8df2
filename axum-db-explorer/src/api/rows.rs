//! Row fetching and row mutation endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use tracing::debug;

use crate::api::{ApiError, ApiState};
use crate::database::traits::{queryable_target, DatabaseAdapter, DatabaseError};
use crate::literal::coerce_insert_text;
use crate::schema::{
    DeleteRowsRequest, InsertRowRequest, MutationResponse, RowQuery, RowsResponse, SortOrder, UpdateRowRequest,
};

/// Pagination and sorting parameters
///
/// Query parameters:
/// - offset: Starting row offset (default: 0)
/// - limit: Maximum rows to return (default and maximum from the config)
/// - sortBy: Column name to sort by (optional)
/// - sortOrder: "ascending" or "descending" (optional, default: "ascending")
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowsParams {
    #[serde(default)]
    pub offset: u64,
    pub limit: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

/// Handler for GET /api/connections/{id}/objects/{objectId}/rows
///
/// # Returns
///
/// JSON response containing rows, columns, the key column and pagination
/// metadata
pub async fn get_rows_handler(
    State(state): State<ApiState>,
    Path((connection_id, object_id)): Path<(String, String)>,
    Query(params): Query<RowsParams>,
) -> Result<Json<RowsResponse>, ApiError> {
    let adapter = state.adapter(&connection_id)?;
    let query = RowQuery {
        offset: params.offset,
        limit: state.config.page_size(params.limit),
        sort_by: params.sort_by,
        sort_order: params.sort_order,
    };

    Ok(Json(adapter.get_rows(&object_id, &query).await?))
}

/// Reject mutations addressed through anything but the table's single key column
async fn check_key_column(adapter: &dyn DatabaseAdapter, table_id: &str, pk_column: &str) -> Result<(), ApiError> {
    let metadata = adapter.get_metadata(table_id).await?;
    match metadata.primary_key_column() {
        Some(column) if column == pk_column => Ok(()),
        _ => Err(DatabaseError::InvalidColumn(pk_column.to_string()).into()),
    }
}

/// Handler for POST /api/connections/{id}/rows/update
///
/// Request body:
/// ```json
/// {
///   "database": "app",
///   "schema": "public",
///   "table": "users",
///   "pkColumn": "id",
///   "pkValue": 7,
///   "updates": [["name", "Ada"], ["email", null]]
/// }
/// ```
pub async fn update_row_handler(
    State(state): State<ApiState>,
    Path(connection_id): Path<String>,
    Json(request): Json<UpdateRowRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let adapter = state.adapter(&connection_id)?;
    check_key_column(adapter.as_ref(), &request.target().identifier(), &request.pk_column).await?;

    debug!(table = %request.table, key = %request.pk_value, "updating row");
    let affected_rows = adapter.update_row(&request).await?;
    Ok(Json(MutationResponse {
        affected_rows,
        statements: Vec::new(),
    }))
}

/// Handler for POST /api/connections/{id}/rows/delete
///
/// Deletes every listed row with a single statement.
pub async fn delete_rows_handler(
    State(state): State<ApiState>,
    Path(connection_id): Path<String>,
    Json(request): Json<DeleteRowsRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let adapter = state.adapter(&connection_id)?;
    let target = queryable_target(&request.table_id)?;
    check_key_column(adapter.as_ref(), &request.table_id, &request.pk_column).await?;

    debug!(table = %target.table, rows = request.pk_values.len(), "deleting rows");
    let affected_rows = adapter.delete_rows(&target, &request.pk_column, &request.pk_values).await?;
    Ok(Json(MutationResponse {
        affected_rows,
        statements: Vec::new(),
    }))
}

/// Handler for POST /api/connections/{id}/rows/insert
///
/// Values are raw form text. Empty values are left out so the column
/// default applies; the rest are coerced (`null`, booleans, numbers, text).
pub async fn insert_row_handler(
    State(state): State<ApiState>,
    Path(connection_id): Path<String>,
    Json(request): Json<InsertRowRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let adapter = state.adapter(&connection_id)?;
    let target = queryable_target(&request.table_id)?;

    let values: Vec<_> = request
        .values
        .iter()
        .filter(|(_, raw)| !raw.is_empty())
        .map(|(column, raw)| (column.clone(), coerce_insert_text(raw)))
        .collect();

    let affected_rows = adapter.insert_row(&target, &values).await?;
    Ok(Json(MutationResponse {
        affected_rows,
        statements: Vec::new(),
    }))
}
