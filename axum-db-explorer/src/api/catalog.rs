//! Schema, table listing and object metadata endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;

use crate::api::{ApiError, ApiState};
use crate::identifier::DEFAULT_SCHEMA;
use crate::schema::{SchemaInfo, TableInfo, TableMetadata};

/// Query parameters locating a node in the catalog tree
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    pub database: Option<String>,
    pub schema: Option<String>,
}

/// Handler for GET /api/connections/{id}/schemas?database=
pub async fn list_schemas_handler(
    State(state): State<ApiState>,
    Path(connection_id): Path<String>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<SchemaInfo>>, ApiError> {
    let adapter = state.adapter(&connection_id)?;
    Ok(Json(adapter.list_schemas(query.database.as_deref()).await?))
}

/// Handler for GET /api/connections/{id}/tables?database=&schema=
///
/// Lists tables and views; the schema defaults to `public`.
pub async fn list_tables_handler(
    State(state): State<ApiState>,
    Path(connection_id): Path<String>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<TableInfo>>, ApiError> {
    let adapter = state.adapter(&connection_id)?;
    let schema = query.schema.as_deref().unwrap_or(DEFAULT_SCHEMA);
    Ok(Json(adapter.list_tables(query.database.as_deref(), schema).await?))
}

/// Handler for GET /api/connections/{id}/objects/{objectId}/metadata
///
/// Returns columns, primary key, foreign keys and indexes of a table or view.
///
/// # Arguments
///
/// * `state` - Shared API state
/// * `connection_id` - Connection the object lives on
/// * `object_id` - Structured (or legacy) identifier of the object
pub async fn get_metadata_handler(
    State(state): State<ApiState>,
    Path((connection_id, object_id)): Path<(String, String)>,
) -> Result<Json<TableMetadata>, ApiError> {
    let adapter = state.adapter(&connection_id)?;
    Ok(Json(adapter.get_metadata(&object_id).await?))
}
