//! REST API endpoints
//!
//! This module contains all API endpoint handlers for the explorer. Every
//! route is scoped to a connection id looked up in the [`ConnectionRegistry`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tracing::{error, warn};

use crate::config::ExplorerConfig;
use crate::database::traits::{DatabaseAdapter, DatabaseError};
use crate::registry::{ConnectionRegistry, RegistryError};

pub mod catalog;
pub mod connections;
pub mod query;
pub mod rows;
pub mod schema;

// Re-export handlers for convenience
pub use catalog::{get_metadata_handler, list_schemas_handler, list_tables_handler};
pub use connections::{
    create_database_handler, drop_database_handler, list_connections_handler, list_databases_handler,
};
pub use query::execute_query_handler;
pub use rows::{delete_rows_handler, get_rows_handler, insert_row_handler, update_row_handler};
pub use schema::update_schema_handler;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<ConnectionRegistry>,
    pub config: Arc<ExplorerConfig>,
}

impl ApiState {
    pub fn new(registry: ConnectionRegistry, config: ExplorerConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
        }
    }

    fn adapter(&self, connection_id: &str) -> Result<Arc<dyn DatabaseAdapter>, ApiError> {
        Ok(self.registry.get(connection_id)?)
    }
}

/// Error returned by handlers, rendered as `{ "error": "..." }`
#[derive(Debug)]
pub enum ApiError {
    Registry(RegistryError),
    Database(DatabaseError),
}

impl From<RegistryError> for ApiError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::Database(error) => ApiError::Database(error),
            other => ApiError::Registry(other),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(error: DatabaseError) -> Self {
        ApiError::Database(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Registry(_) => StatusCode::NOT_FOUND,
            ApiError::Database(error) => database_status(error),
        }
    }
}

/// Status code for a database error
pub fn database_status(error: &DatabaseError) -> StatusCode {
    match error {
        DatabaseError::TableNotFound(_) => StatusCode::NOT_FOUND,
        DatabaseError::NotQueryable(_)
        | DatabaseError::InvalidColumn(_)
        | DatabaseError::InvalidName(_)
        | DatabaseError::Build(_)
        | DatabaseError::Translate(_) => StatusCode::BAD_REQUEST,
        DatabaseError::Timeout => StatusCode::REQUEST_TIMEOUT,
        DatabaseError::TooManyRows(_) => StatusCode::PAYLOAD_TOO_LARGE,
        DatabaseError::BatchPartialFailure { .. } => StatusCode::CONFLICT,
        DatabaseError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Registry(error) => error.to_string(),
            ApiError::Database(error) => error.to_string(),
        };

        if status.is_server_error() {
            error!(%status, error = %message, "request failed");
        } else {
            warn!(%status, error = %message, "request rejected");
        }

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Create the API router with all endpoints
///
/// # Arguments
///
/// * `state` - Registry and configuration shared by the handlers
///
/// # Returns
///
/// An Axum Router configured with all API routes
pub fn create_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/connections", get(list_connections_handler))
        .route(
            "/connections/{id}/databases",
            get(list_databases_handler).post(create_database_handler),
        )
        .route("/connections/{id}/databases/{name}", delete(drop_database_handler))
        .route("/connections/{id}/schemas", get(list_schemas_handler))
        .route("/connections/{id}/tables", get(list_tables_handler))
        .route("/connections/{id}/objects/{object_id}/metadata", get(get_metadata_handler))
        .route("/connections/{id}/objects/{object_id}/rows", get(get_rows_handler))
        .route("/connections/{id}/query", post(execute_query_handler))
        .route("/connections/{id}/rows/update", post(update_row_handler))
        .route("/connections/{id}/rows/delete", post(delete_rows_handler))
        .route("/connections/{id}/rows/insert", post(insert_row_handler))
        .route("/connections/{id}/schema", post(update_schema_handler))
        .with_state(state)
}
