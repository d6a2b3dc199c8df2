//! # axum-db-explorer
//!
//! Backend of a multi-database explorer, easily integrable as an Axum layer.
//!
//! ## Features
//!
//! - Structured object identifiers (`db:app.schema:sales.table:orders`) with
//!   fallback for legacy `schema.table` names
//! - Dialect-correct identifier quoting and literal encoding for PostgreSQL,
//!   MySQL and SQL Server
//! - Schema mutations (columns, primary and foreign keys) translated to one
//!   statement per operation
//! - Row editing with buffered changes, selection deletes and inserts
//! - Adapters for PostgreSQL and MySQL behind one async trait
//!
//! ## Security Warning
//!
//! **This is a development tool only!**
//!
//! - No authentication/authorization built-in
//! - Exposes full database schema and data
//! - Raw query execution and schema mutation allow full database access
//! - Should never be exposed in production or public networks
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use axum_db_explorer::{ExplorerConfig, ExplorerLayer};
//! use sqlx::PgPool;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = PgPool::connect("postgres://localhost/app")
//!         .await
//!         .unwrap();
//!
//!     let explorer = ExplorerLayer::new(ExplorerConfig::new().base_path("/db-explorer"))
//!         .postgres("main", pool);
//!
//!     let app = Router::new()
//!         .route("/", get(|| async { "Hello, World!" }))
//!         .merge(explorer.into_router());
//!
//!     // Serve the application...
//! }
//! ```

// Public modules
pub mod api;
pub mod config;
pub mod database;
pub mod dialect;
pub mod identifier;
pub mod layer;
pub mod literal;
pub mod operations;
pub mod registry;
pub mod schema;
pub mod session;
pub mod statement;

// Public exports
pub use config::{ExplorerConfig, QueryLimits};
pub use dialect::Dialect;
pub use identifier::{resolve, ObjectKind, ParsedIdentifier, TableTarget};
pub use layer::ExplorerLayer;
pub use operations::{translate, SchemaOperation};
pub use registry::{ConnectionRegistry, RegistryError};
pub use schema::{ColumnInfo, ForeignKeyInfo, IndexInfo, TableMetadata};
pub use session::{RowEditSession, SessionError, SessionState};
pub use statement::StatementBuilder;

// Re-export database adapters
pub use database::traits::{DatabaseAdapter, DatabaseError};

#[cfg(feature = "postgres")]
pub use database::postgres::PostgresAdapter;

#[cfg(feature = "mysql")]
pub use database::mysql::MySqlAdapter;
