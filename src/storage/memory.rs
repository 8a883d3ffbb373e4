//! Relay storage implementation in-memory.

use super::{StorageApi, api::Result};
use crate::{
    error::StorageError,
    types::{AaStateTransaction, AaTransaction, Status, TxId},
};
use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};

/// [`StorageApi`] implementation in-memory. Used for testing and database-less deployments.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    jobs: DashMap<TxId, AaStateTransaction>,
}

impl InMemoryStorage {
    /// Returns all jobs with the given status, ordered by account and nonce.
    fn with_status(&self, status: Status) -> Vec<AaStateTransaction> {
        let mut jobs: Vec<_> = self
            .jobs
            .iter()
            .filter(|job| job.status == status)
            .map(|job| job.value().clone())
            .collect();
        jobs.sort_by_key(|job| (job.from(), job.tx.nonce()));
        jobs
    }
}

#[async_trait]
impl StorageApi for InMemoryStorage {
    async fn add(&self, tx: AaTransaction) -> Result<AaStateTransaction> {
        let job = AaStateTransaction::new(tx);
        match self.jobs.entry(job.id) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(job.id)),
            Entry::Vacant(entry) => {
                entry.insert(job.clone());
                Ok(job)
            }
        }
    }

    async fn get(&self, id: TxId) -> Result<AaStateTransaction> {
        self.jobs.get(&id).map(|job| job.value().clone()).ok_or(StorageError::NotFound(id))
    }

    async fn get_all_pending(&self) -> Result<Vec<AaStateTransaction>> {
        Ok(self.with_status(Status::Pending))
    }

    async fn get_all_queued(&self) -> Result<Vec<AaStateTransaction>> {
        Ok(self.with_status(Status::Queued))
    }

    async fn update(&self, job: &AaStateTransaction) -> Result<()> {
        self.jobs.insert(job.id, job.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;
    use alloy::primitives::{Address, B256, Bytes, U256};

    fn tx(from: Address, nonce: u64) -> AaTransaction {
        AaTransaction {
            signature: Bytes::from(vec![nonce as u8; 65]),
            transaction: Transaction { from, nonce: U256::from(nonce), payload: vec![] },
        }
    }

    #[tokio::test]
    async fn add_rejects_duplicates() {
        let storage = InMemoryStorage::default();
        let job = storage.add(tx(Address::ZERO, 0)).await.unwrap();
        assert_eq!(job.status, Status::Queued);
        assert_eq!(storage.get(job.id).await.unwrap(), job);

        assert!(matches!(
            storage.add(tx(Address::ZERO, 0)).await,
            Err(StorageError::AlreadyExists(id)) if id == job.id
        ));
    }

    #[tokio::test]
    async fn get_unknown() {
        let storage = InMemoryStorage::default();
        let id = TxId(B256::with_last_byte(1));
        assert!(matches!(
            storage.get(id).await,
            Err(StorageError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn recovery_sets_are_filtered_and_ordered() {
        let storage = InMemoryStorage::default();
        let alice = Address::with_last_byte(1);
        let bob = Address::with_last_byte(2);

        let bob_1 = storage.add(tx(bob, 1)).await.unwrap();
        let alice_1 = storage.add(tx(alice, 1)).await.unwrap();
        let mut alice_0 = storage.add(tx(alice, 0)).await.unwrap();
        let mut bob_0 = storage.add(tx(bob, 0)).await.unwrap();

        alice_0.set_tx_hash(B256::with_last_byte(1)).unwrap();
        alice_0.transition(Status::Pending).unwrap();
        storage.update(&alice_0).await.unwrap();

        bob_0.transition(Status::Pending).unwrap();
        bob_0.transition(Status::Completed).unwrap();
        storage.update(&bob_0).await.unwrap();

        let pending = storage.get_all_pending().await.unwrap();
        assert_eq!(pending, vec![alice_0]);

        let queued: Vec<_> =
            storage.get_all_queued().await.unwrap().into_iter().map(|job| job.id).collect();
        assert_eq!(queued, vec![alice_1.id, bob_1.id]);
    }

    #[tokio::test]
    async fn update_is_idempotent() {
        let storage = InMemoryStorage::default();
        let mut job = storage.add(tx(Address::ZERO, 0)).await.unwrap();
        job.transition(Status::Pending).unwrap();
        job.fail("dropped").unwrap();

        storage.update(&job).await.unwrap();
        let first = storage.get(job.id).await.unwrap();
        storage.update(&job).await.unwrap();

        assert_eq!(storage.get(job.id).await.unwrap(), first);
        assert_eq!(storage.jobs.len(), 1);
        assert!(storage.get_all_pending().await.unwrap().is_empty());
        assert!(storage.get_all_queued().await.unwrap().is_empty());
    }
}
