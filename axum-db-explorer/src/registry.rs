//! Connection registry
//!
//! Maps connection ids to the adapters serving them. The registry is built
//! once at startup and shared read-only with the router.

use crate::database::traits::{DatabaseAdapter, DatabaseError};
use crate::schema::ConnectionInfo;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Adapters by connection id
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<String, Arc<dyn DatabaseAdapter>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one under the same id
    pub fn register(&mut self, id: impl Into<String>, adapter: Arc<dyn DatabaseAdapter>) -> &mut Self {
        let id = id.into();
        info!(connection = %id, dialect = %adapter.dialect(), "registered connection");
        self.connections.insert(id, adapter);
        self
    }

    /// Builder form of [`ConnectionRegistry::register`]
    pub fn with(mut self, id: impl Into<String>, adapter: Arc<dyn DatabaseAdapter>) -> Self {
        self.register(id, adapter);
        self
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn DatabaseAdapter>, RegistryError> {
        self.connections
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownConnection(id.to_string()))
    }

    /// Connections sorted by id
    pub fn list(&self) -> Vec<ConnectionInfo> {
        let mut connections: Vec<ConnectionInfo> = self
            .connections
            .iter()
            .map(|(id, adapter)| ConnectionInfo {
                id: id.clone(),
                dialect: adapter.dialect(),
            })
            .collect();
        connections.sort_by(|a, b| a.id.cmp(&b.id));
        connections
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub async fn create_database(&self, connection_id: &str, name: &str) -> Result<(), RegistryError> {
        let adapter = self.get(connection_id)?;
        adapter.create_database(name).await?;
        info!(connection = connection_id, database = name, "created database");
        Ok(())
    }

    pub async fn drop_database(&self, connection_id: &str, name: &str) -> Result<(), RegistryError> {
        let adapter = self.get(connection_id)?;
        adapter.drop_database(name).await?;
        info!(connection = connection_id, database = name, "dropped database");
        Ok(())
    }
}
