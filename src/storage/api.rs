//! Relay storage api.

use crate::{
    error::StorageError,
    types::{AaStateTransaction, AaTransaction, TxId},
};
use async_trait::async_trait;
use std::fmt::Debug;

/// Type alias for `Result<T, StorageError>`
pub type Result<T> = core::result::Result<T, StorageError>;

/// Storage API.
///
/// Implementations synchronize internally and can be shared between the dispatch loop and the
/// submission path.
#[async_trait]
pub trait StorageApi: Debug + Send + Sync {
    /// Creates a [`Status::Queued`](crate::types::Status::Queued) job for `tx` and persists it.
    ///
    /// Fails with [`StorageError::AlreadyExists`] if a job with the same id is stored.
    async fn add(&self, tx: AaTransaction) -> Result<AaStateTransaction>;

    /// Reads a job.
    async fn get(&self, id: TxId) -> Result<AaStateTransaction>;

    /// Reads all jobs that were broadcast but not resolved, ordered by account and nonce.
    async fn get_all_pending(&self) -> Result<Vec<AaStateTransaction>>;

    /// Reads all jobs waiting to be broadcast, ordered by account and nonce.
    async fn get_all_queued(&self) -> Result<Vec<AaStateTransaction>>;

    /// Writes the full job record. The last write wins.
    ///
    /// Content is not validated, and writing the same record twice has no further effect.
    async fn update(&self, job: &AaStateTransaction) -> Result<()>;
}
