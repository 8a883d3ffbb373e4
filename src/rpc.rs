//! # AA Relay RPC
//!
//! Implementations of a custom `relay_` namespace.
//!
//! - `relay_sendTransaction` accepts a signed AA transaction and queues it for relaying.
//! - `relay_getTransactionReceipt` returns the tracked state of a submitted transaction.
//! - `relay_getNonce` returns the next AA nonce of an account.

use alloy::primitives::{Address, U256};
use jsonrpsee::{
    core::{RpcResult, async_trait},
    proc_macros::rpc,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::{
    error::{RelayError, ToRpcResult},
    storage::{RelayStorage, StorageApi},
    transactions::{AaPool, TxSender},
    types::{AaStateTransaction, AaTransaction, TxId},
};

/// Health of the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Version of the relay.
    pub version: String,
    /// Number of jobs waiting to be sent.
    pub queued: usize,
}

/// AA `relay_` RPC namespace.
#[rpc(server, client, namespace = "relay")]
pub trait RelayApi {
    /// Checks the health of the relay and returns its version.
    #[method(name = "health")]
    async fn health(&self) -> RpcResult<Health>;

    /// Submits a signed AA transaction, returning its id.
    #[method(name = "sendTransaction")]
    async fn send_transaction(&self, tx: AaTransaction) -> RpcResult<TxId>;

    /// Returns the tracked state of a submitted transaction.
    #[method(name = "getTransactionReceipt")]
    async fn get_transaction_receipt(&self, id: TxId) -> RpcResult<AaStateTransaction>;

    /// Returns the next AA nonce of `account` tracked by the invoker.
    #[method(name = "getNonce")]
    async fn get_nonce(&self, account: Address) -> RpcResult<U256>;
}

/// Implementation of the AA `relay_` namespace.
#[derive(Debug, Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

impl Relay {
    /// Create a new AA relay module.
    pub fn new(
        invoker: Address,
        chain_id: u64,
        sender: Arc<dyn TxSender>,
        pool: Arc<dyn AaPool>,
        storage: RelayStorage,
    ) -> Self {
        Self { inner: Arc::new(RelayInner { invoker, chain_id, sender, pool, storage }) }
    }
}

#[async_trait]
impl RelayApiServer for Relay {
    async fn health(&self) -> RpcResult<Health> {
        Ok(Health {
            version: env!("CARGO_PKG_VERSION").to_string(),
            queued: self.inner.pool.len(),
        })
    }

    #[instrument(skip_all, fields(from = %tx.from(), nonce = %tx.nonce()))]
    async fn send_transaction(&self, tx: AaTransaction) -> RpcResult<TxId> {
        tx.verify(self.inner.invoker, self.inner.chain_id)
            .map_err(RelayError::from)
            .to_rpc_result()?;

        let job = self.inner.storage.add(tx).await.to_rpc_result()?;
        let id = job.id;
        self.inner.pool.push(job);
        debug!(%id, "queued transaction");

        Ok(id)
    }

    async fn get_transaction_receipt(&self, id: TxId) -> RpcResult<AaStateTransaction> {
        self.inner.storage.get(id).await.to_rpc_result()
    }

    async fn get_nonce(&self, account: Address) -> RpcResult<U256> {
        self.inner
            .sender
            .get_aa_nonce(self.inner.invoker, account)
            .await
            .map_err(RelayError::from)
            .to_rpc_result()
    }
}

/// Implementation of the AA `relay_` namespace.
#[derive(Debug)]
struct RelayInner {
    /// Address of the invoker contract.
    invoker: Address,
    /// Chain the relay submits to.
    chain_id: u64,
    /// Chain access.
    sender: Arc<dyn TxSender>,
    /// Jobs waiting to be sent.
    pool: Arc<dyn AaPool>,
    /// Durable job records.
    storage: RelayStorage,
}
