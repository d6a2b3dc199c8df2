//! ExplorerLayer - Main Axum integration layer
//!
//! This module provides the main entry point for integrating the explorer
//! into an Axum application.

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api::{create_api_router, ApiState};
use crate::config::ExplorerConfig;
use crate::database::traits::DatabaseAdapter;
use crate::registry::ConnectionRegistry;

#[cfg(feature = "postgres")]
use crate::database::postgres::PostgresAdapter;

#[cfg(feature = "mysql")]
use crate::database::mysql::MySqlAdapter;

/// Main layer for integrating the explorer into an Axum application
///
/// # Example
///
/// ```rust,no_run
/// use axum::Router;
/// use axum_db_explorer::{ExplorerConfig, ExplorerLayer};
/// use sqlx::PgPool;
///
/// # async fn example() {
/// let pool = PgPool::connect("postgres://localhost/app").await.unwrap();
/// let explorer = ExplorerLayer::new(ExplorerConfig::new()).postgres("main", pool);
/// let app = Router::new().merge(explorer.into_router());
/// # }
/// ```
pub struct ExplorerLayer {
    config: ExplorerConfig,
    registry: ConnectionRegistry,
}

impl ExplorerLayer {
    /// Create an explorer without connections
    ///
    /// # Arguments
    ///
    /// * `config` - Mount path and query limits
    pub fn new(config: ExplorerConfig) -> Self {
        Self {
            config,
            registry: ConnectionRegistry::new(),
        }
    }

    /// Replace the registry with one built elsewhere
    pub fn with_registry(mut self, registry: ConnectionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Serve an adapter under a connection id
    pub fn connection(mut self, id: impl Into<String>, adapter: Arc<dyn DatabaseAdapter>) -> Self {
        self.registry.register(id, adapter);
        self
    }

    /// Serve a PostgreSQL pool under a connection id
    #[cfg(feature = "postgres")]
    pub fn postgres(self, id: impl Into<String>, pool: sqlx::PgPool) -> Self {
        let adapter = PostgresAdapter::new(pool).with_limits(self.config.query_limits());
        self.connection(id, Arc::new(adapter))
    }

    /// Serve a MySQL pool under a connection id
    #[cfg(feature = "mysql")]
    pub fn mysql(self, id: impl Into<String>, pool: sqlx::MySqlPool) -> Self {
        let adapter = MySqlAdapter::new(pool).with_limits(self.config.query_limits());
        self.connection(id, Arc::new(adapter))
    }

    /// Convert into an Axum Router that can be merged
    ///
    /// The returned router includes:
    /// - API endpoints at `{base_path}/api/*`
    /// - Permissive CORS middleware for development
    pub fn into_router(self) -> Router {
        let base_path = self.config.base_path.trim_end_matches('/').to_string();
        let api_router = create_api_router(ApiState::new(self.registry, self.config));

        Router::new()
            .nest(&format!("{base_path}/api"), api_router)
            .layer(
                CorsLayer::permissive(), // Permissive CORS for development
            )
    }
}
