//! Relay storage

mod api;
pub use api::StorageApi;
mod memory;
mod pg;

use crate::types::{AaStateTransaction, AaTransaction, TxId};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

/// Relay storage interface.
#[derive(Debug, Clone)]
pub struct RelayStorage {
    inner: Arc<dyn StorageApi>,
}

impl RelayStorage {
    /// Create [`RelayStorage`] over any [`StorageApi`] backend.
    pub fn new(inner: Arc<dyn StorageApi>) -> Self {
        Self { inner }
    }

    /// Create [`RelayStorage`] with a in-memory backend. Jobs do not survive a restart.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(memory::InMemoryStorage::default()))
    }

    /// Create [`RelayStorage`] with a PostgreSQL backend.
    pub fn pg(pool: PgPool) -> Self {
        Self::new(Arc::new(pg::PgStorage::new(pool)))
    }
}

#[async_trait]
impl StorageApi for RelayStorage {
    async fn add(&self, tx: AaTransaction) -> api::Result<AaStateTransaction> {
        self.inner.add(tx).await
    }

    async fn get(&self, id: TxId) -> api::Result<AaStateTransaction> {
        self.inner.get(id).await
    }

    async fn get_all_pending(&self) -> api::Result<Vec<AaStateTransaction>> {
        self.inner.get_all_pending().await
    }

    async fn get_all_queued(&self) -> api::Result<Vec<AaStateTransaction>> {
        self.inner.get_all_queued().await
    }

    async fn update(&self, job: &AaStateTransaction) -> api::Result<()> {
        self.inner.update(job).await
    }
}
