//! Registry of currently connected push subscribers.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::{connection_repo, Database, DatabaseError};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Subscriber registry database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Connection ids are opaque. `list_active` must reflect removals made by
/// earlier calls, so callers read it fresh for every delivery round.
#[async_trait]
pub trait SubscriberRegistry: Send + Sync {
    async fn register(&self, connection_id: &str) -> Result<(), RegistryError>;

    async fn list_active(&self) -> Result<Vec<String>, RegistryError>;

    /// Removing an unknown id succeeds and returns `false`.
    async fn remove(&self, connection_id: &str) -> Result<bool, RegistryError>;
}

/// In-process registry ordered by connection time.
#[derive(Default)]
pub struct MemoryRegistry {
    connections: RwLock<BTreeMap<String, DateTime<Utc>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriberRegistry for MemoryRegistry {
    async fn register(&self, connection_id: &str) -> Result<(), RegistryError> {
        let mut connections = self.connections.write().unwrap_or_else(|poisoned| {
            log::warn!("Subscriber registry lock was poisoned, recovering");
            poisoned.into_inner()
        });
        connections.insert(connection_id.to_string(), Utc::now());
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<String>, RegistryError> {
        let connections = self.connections.read().unwrap_or_else(|poisoned| {
            log::warn!("Subscriber registry lock was poisoned, recovering");
            poisoned.into_inner()
        });
        let mut entries: Vec<(&String, &DateTime<Utc>)> = connections.iter().collect();
        entries.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
        Ok(entries.into_iter().map(|(id, _)| id.clone()).collect())
    }

    async fn remove(&self, connection_id: &str) -> Result<bool, RegistryError> {
        let mut connections = self.connections.write().unwrap_or_else(|poisoned| {
            log::warn!("Subscriber registry lock was poisoned, recovering");
            poisoned.into_inner()
        });
        Ok(connections.remove(connection_id).is_some())
    }
}

/// Registry persisted in the `connections` table, shared between processes
/// that open the same database file.
#[derive(Clone)]
pub struct SqliteRegistry {
    db: Database,
}

impl SqliteRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SubscriberRegistry for SqliteRegistry {
    async fn register(&self, connection_id: &str) -> Result<(), RegistryError> {
        connection_repo::insert(&self.db, connection_id, &Utc::now().to_rfc3339())?;
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<String>, RegistryError> {
        Ok(connection_repo::list(&self.db)?)
    }

    async fn remove(&self, connection_id: &str) -> Result<bool, RegistryError> {
        Ok(connection_repo::delete(&self.db, connection_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(registry: &dyn SubscriberRegistry) {
        registry.register("a").await.unwrap();
        registry.register("b").await.unwrap();
        registry.register("a").await.unwrap();

        let mut active = registry.list_active().await.unwrap();
        active.sort();
        assert_eq!(active, vec!["a", "b"]);

        assert!(registry.remove("a").await.unwrap());
        assert!(!registry.remove("a").await.unwrap());
        assert_eq!(registry.list_active().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_memory_registry() {
        exercise(&MemoryRegistry::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_registry() {
        let db = Database::open_in_memory().unwrap();
        exercise(&SqliteRegistry::new(db)).await;
    }

    #[tokio::test]
    async fn test_sqlite_registry_is_shared_between_handles() {
        let db = Database::open_in_memory().unwrap();
        let writer = SqliteRegistry::new(db.clone());
        let reader = SqliteRegistry::new(db);

        writer.register("conn-1").await.unwrap();
        assert_eq!(reader.list_active().await.unwrap(), vec!["conn-1"]);
    }
}
