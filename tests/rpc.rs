#![allow(missing_docs)]

use alloy::{
    consensus::TypedTransaction,
    primitives::{Address, B256, Bytes, U256, address},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use jsonrpsee::{
    core::client::Error as ClientError,
    http_client::{HttpClient, HttpClientBuilder},
    server::{Server, ServerHandle},
    types::error::INVALID_PARAMS_CODE,
};
use parking_lot::Mutex;
use relay::{
    config::RelayerServiceConfig,
    rpc::{Relay, RelayApiClient, RelayApiServer},
    signers::DynSigner,
    storage::{RelayStorage, StorageApi},
    transactions::{AaPool, NoncePool, RelayerService, SenderError, TxSender},
    types::{
        AaTransaction, RECEIPT_STATUS_SUCCESS, Receipt, Status, Transaction, TransactionPayload,
    },
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

const INVOKER: Address = address!("0x0000000000000000000000000000000000000301");
const CHAIN_ID: u64 = 31337;

/// Chain that includes every envelope in the next block.
#[derive(Debug, Default)]
struct InstantChain {
    sent: Mutex<Vec<TypedTransaction>>,
}

#[async_trait]
impl TxSender for InstantChain {
    async fn send_transaction(
        &self,
        tx: TypedTransaction,
        _signer: &DynSigner,
    ) -> Result<B256, SenderError> {
        let mut sent = self.sent.lock();
        sent.push(tx);
        Ok(B256::with_last_byte(sent.len() as u8))
    }

    async fn wait_for_receipt(
        &self,
        hash: B256,
        _poll_delay: Duration,
        _max_retries: u64,
    ) -> Result<Receipt, SenderError> {
        Ok(Receipt {
            status: RECEIPT_STATUS_SUCCESS,
            gas_used: 80_000,
            block_hash: hash,
            block_number: 1,
        })
    }

    async fn get_nonce(&self, _address: Address) -> Result<u64, SenderError> {
        Ok(0)
    }

    async fn get_aa_nonce(&self, _invoker: Address, account: Address) -> Result<U256, SenderError> {
        Ok(U256::from(account.0[19]))
    }
}

struct Env {
    client: HttpClient,
    server: ServerHandle,
    chain: Arc<InstantChain>,
    pool: Arc<NoncePool>,
    storage: RelayStorage,
}

impl Env {
    async fn new() -> eyre::Result<Self> {
        let chain = Arc::new(InstantChain::default());
        let pool = Arc::new(NoncePool::default());
        let storage = RelayStorage::in_memory();

        let rpc = Relay::new(INVOKER, CHAIN_ID, chain.clone(), pool.clone(), storage.clone());
        let server = Server::builder().build("127.0.0.1:0").await?;
        let addr = server.local_addr()?;
        let server = server.start(rpc.into_rpc());
        let client = HttpClientBuilder::default().build(format!("http://{addr}"))?;

        Ok(Self { client, server, chain, pool, storage })
    }
}

async fn signed_tx(signer: &DynSigner, nonce: u64) -> AaTransaction {
    let mut tx = AaTransaction::new(Transaction {
        from: signer.address(),
        nonce: U256::from(nonce),
        payload: vec![TransactionPayload {
            to: Address::with_last_byte(0xee),
            value: U256::ZERO,
            gasLimit: U256::from(30_000),
            data: Bytes::from_static(&[0x01]),
        }],
    });
    tx.sign(INVOKER, CHAIN_ID, signer).await.unwrap();
    tx
}

fn assert_invalid_params(err: ClientError) {
    match err {
        ClientError::Call(err) => assert_eq!(err.code(), INVALID_PARAMS_CODE),
        err => panic!("unexpected error {err:?}"),
    }
}

#[tokio::test]
async fn submission_is_stored_and_queued() -> eyre::Result<()> {
    let env = Env::new().await?;
    let signer = DynSigner::from(PrivateKeySigner::random());
    let tx = signed_tx(&signer, 0).await;

    let id = env.client.send_transaction(tx.clone()).await?;
    assert_eq!(id, tx.id());

    let job = env.client.get_transaction_receipt(id).await?;
    assert_eq!(job.status, Status::Queued);
    assert_eq!(job.tx, tx);
    assert_eq!(job.tx_hash(), None);
    assert_eq!(env.storage.get(id).await?, job);
    assert_eq!(env.pool.len(), 1);
    assert_eq!(env.client.health().await?.queued, 1);

    // Resubmitting the same transaction is rejected.
    assert_invalid_params(env.client.send_transaction(tx).await.unwrap_err());
    assert_eq!(env.pool.len(), 1);

    env.server.stop()?;
    Ok(())
}

#[tokio::test]
async fn bad_signatures_are_rejected() -> eyre::Result<()> {
    let env = Env::new().await?;
    let signer = DynSigner::from(PrivateKeySigner::random());

    // Signed by another key.
    let mut forged = signed_tx(&signer, 0).await;
    forged.transaction.from = Address::with_last_byte(7);
    assert_invalid_params(env.client.send_transaction(forged).await.unwrap_err());

    // Garbage signature.
    let mut garbage = signed_tx(&signer, 1).await;
    garbage.signature = Bytes::from_static(&[0x01, 0x02]);
    assert_invalid_params(env.client.send_transaction(garbage).await.unwrap_err());

    // Signed for another chain.
    let mut other_chain = signed_tx(&signer, 2).await;
    other_chain.sign(INVOKER, CHAIN_ID + 1, &signer).await?;
    assert_invalid_params(env.client.send_transaction(other_chain).await.unwrap_err());

    assert!(env.pool.is_empty());
    assert!(env.storage.get_all_queued().await?.is_empty());

    env.server.stop()?;
    Ok(())
}

#[tokio::test]
async fn unknown_transaction() -> eyre::Result<()> {
    let env = Env::new().await?;
    let tx = signed_tx(&DynSigner::from(PrivateKeySigner::random()), 0).await;

    assert_invalid_params(env.client.get_transaction_receipt(tx.id()).await.unwrap_err());

    env.server.stop()?;
    Ok(())
}

#[tokio::test]
async fn nonce_comes_from_invoker() -> eyre::Result<()> {
    let env = Env::new().await?;
    assert_eq!(env.client.get_nonce(Address::with_last_byte(5)).await?, U256::from(5));

    env.server.stop()?;
    Ok(())
}

#[tokio::test]
async fn submitted_transactions_complete_in_order() -> eyre::Result<()> {
    let env = Env::new().await?;
    let service = Arc::new(
        RelayerService::new(
            env.chain.clone(),
            env.pool.clone(),
            env.storage.clone(),
            PrivateKeySigner::random().into(),
            INVOKER,
            CHAIN_ID,
            RelayerServiceConfig::default().with_pull_interval(Duration::from_millis(10)),
        )
        .await?,
    );
    let cancel = CancellationToken::new();
    let dispatcher = service.spawn(cancel.clone());

    let signer = DynSigner::from(PrivateKeySigner::random());
    let mut ids = Vec::new();
    for nonce in [0, 1, 2] {
        ids.push(env.client.send_transaction(signed_tx(&signer, nonce).await).await?);
    }

    let mut completed = false;
    for _ in 0..200 {
        let mut statuses = Vec::new();
        for id in &ids {
            statuses.push(env.client.get_transaction_receipt(*id).await?.status);
        }
        if statuses.iter().all(|status| *status == Status::Completed) {
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(completed, "transactions did not complete");

    // Envelope nonces follow the AA nonces of the account.
    let hashes: Vec<_> = {
        let mut jobs = Vec::new();
        for id in &ids {
            jobs.push(env.client.get_transaction_receipt(*id).await?);
        }
        jobs.into_iter().map(|job| job.tx_hash()).collect()
    };
    assert_eq!(
        hashes,
        vec![
            Some(B256::with_last_byte(1)),
            Some(B256::with_last_byte(2)),
            Some(B256::with_last_byte(3))
        ]
    );

    cancel.cancel();
    dispatcher.await?;
    env.server.stop()?;
    Ok(())
}
