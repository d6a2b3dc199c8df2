use axum::{extract::State, http::StatusCode, routing::get, Router};
use axum_db_explorer::{ConnectionRegistry, ExplorerLayer};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod database;

use config::ServerConfig;

#[derive(Clone)]
struct ApplicationState {
    registry: ConnectionRegistry,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();

    let config = ServerConfig::from_env().expect("Failed to load configuration");
    let limits = config.explorer.query_limits();

    // Connect every configured database and seed sample data if asked to
    let mut registry = ConnectionRegistry::new();
    for connection in &config.connections {
        let adapter = database::connect(connection, limits)
            .await
            .expect("Failed to connect to database");

        if config.seed {
            database::setup(adapter.as_ref())
                .await
                .expect("Failed to setup database");
        }

        registry.register(connection.id.clone(), adapter);
    }

    let application_state = ApplicationState {
        registry: registry.clone(),
    };
    let base_path = config.explorer.base_path.clone();

    // Create the Axum application router
    // Note: ExplorerLayer must be merged after with_state() since it returns a stateless Router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .with_state(application_state)
        .merge(ExplorerLayer::new(config.explorer).with_registry(registry).into_router())
        .layer(CorsLayer::permissive());

    // Bind to local address and start server
    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .expect("Failed to bind listen address");

    info!("Server running at http://{}", config.listen);
    info!("Health check at http://{}/api/health", config.listen);
    info!("Explorer API available at http://{}{}/api", config.listen, base_path);

    axum::serve(listener, app).await.expect("Server error");
}

async fn root_handler() -> &'static str {
    "Welcome to axum-db-explorer example server"
}

async fn health_handler(
    State(state): State<ApplicationState>,
) -> Result<(StatusCode, &'static str), StatusCode> {
    // Every connection must answer a trivial query
    for connection in state.registry.list() {
        let adapter = state
            .registry
            .get(&connection.id)
            .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

        if let Err(error) = adapter.execute_query("SELECT 1", &Default::default()).await {
            warn!(connection = %connection.id, %error, "health check failed");
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    Ok((StatusCode::OK, "Server is healthy"))
}
