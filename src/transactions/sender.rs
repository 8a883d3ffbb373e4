use crate::{
    signers::DynSigner,
    types::{IInvoker, Receipt},
};
use alloy::{
    consensus::TypedTransaction,
    eips::Encodable2718,
    network::{Ethereum, EthereumWallet, NetworkWallet},
    primitives::{Address, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::client::{ClientBuilder, RpcClient},
    transports::{IntoBoxTransport, RpcError, TransportErrorKind, layers::RetryBackoffLayer},
};
use async_trait::async_trait;
use std::{fmt::Debug, io, time::Duration};
use tracing::{debug, instrument, trace};

/// [`RetryBackoffLayer`] used for chain reads.
///
/// We are allowing max 10 retries with a backoff of 800ms. The CU/s is set to max value to avoid
/// any throttling.
pub const RETRY_LAYER: RetryBackoffLayer = RetryBackoffLayer::new(10, 800, u64::MAX);

/// Errors that may occur while talking to the chain.
#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    /// RPC error.
    #[error(transparent)]
    Rpc(#[from] RpcError<TransportErrorKind>),

    /// Error occurred while signing transaction.
    #[error(transparent)]
    Sign(#[from] alloy::signers::Error),

    /// Error occurred while calling the invoker.
    #[error(transparent)]
    Contract(#[from] alloy::contract::Error),

    /// No receipt was found within the allowed number of attempts.
    #[error("no receipt for {hash} after {attempts} attempts")]
    ReceiptNotFound {
        /// Hash of the envelope.
        hash: B256,
        /// Number of receipt queries made.
        attempts: u64,
    },

    /// Other errors.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl SenderError {
    /// Whether the error means the connection to the node was closed.
    ///
    /// Only explicit transport failures qualify: the request may not have reached the node, so
    /// sending again later is safe.
    pub fn is_connection_closed(&self) -> bool {
        match self {
            Self::Rpc(RpcError::Transport(TransportErrorKind::BackendGone)) => true,
            Self::Rpc(RpcError::Transport(TransportErrorKind::Custom(err))) => {
                err.downcast_ref::<io::Error>().is_some_and(|err| is_closed_io(err.kind()))
            }
            Self::Other(err) => {
                err.downcast_ref::<io::Error>().is_some_and(|err| is_closed_io(err.kind()))
            }
            _ => false,
        }
    }
}

fn is_closed_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
    )
}

/// Capability to broadcast envelopes and observe their outcome.
#[async_trait]
pub trait TxSender: Debug + Send + Sync {
    /// Signs `tx` with `signer` and broadcasts it, returning its hash.
    async fn send_transaction(&self, tx: TypedTransaction, signer: &DynSigner)
    -> Result<B256, SenderError>;

    /// Polls for the receipt of `hash` at most `max_retries` times, `poll_delay` apart.
    async fn wait_for_receipt(
        &self,
        hash: B256,
        poll_delay: Duration,
        max_retries: u64,
    ) -> Result<Receipt, SenderError>;

    /// Returns the next nonce of `address`, including pending transactions.
    async fn get_nonce(&self, address: Address) -> Result<u64, SenderError>;

    /// Returns the next AA nonce of `account` tracked by `invoker`.
    async fn get_aa_nonce(&self, invoker: Address, account: Address) -> Result<U256, SenderError>;
}

/// [`TxSender`] backed by a JSON-RPC provider.
///
/// Broadcasts and receipt queries are made exactly once per call. Only nonce and chain ID reads go
/// through [`RETRY_LAYER`].
#[derive(Debug, Clone)]
pub struct ProviderSender {
    /// Provider for broadcasts and receipt queries.
    provider: DynProvider,
    /// Provider for nonce reads.
    reader: DynProvider,
}

impl ProviderSender {
    /// Creates a new [`ProviderSender`] on top of `transport`.
    pub fn from_transport(transport: impl IntoBoxTransport, is_local: bool) -> Self {
        let transport = transport.into_box_transport();
        let provider = ProviderBuilder::new()
            .connect_client(RpcClient::new(transport.clone(), is_local))
            .erased();
        let client = ClientBuilder::default().layer(RETRY_LAYER).transport(transport, is_local);
        let reader = ProviderBuilder::new().connect_client(client).erased();

        Self { provider, reader }
    }

    /// Returns the chain ID of the node.
    pub async fn chain_id(&self) -> Result<u64, SenderError> {
        Ok(self.reader.get_chain_id().await?)
    }
}

#[async_trait]
impl TxSender for ProviderSender {
    #[instrument(skip_all, fields(signer = %signer.address()))]
    async fn send_transaction(
        &self,
        tx: TypedTransaction,
        signer: &DynSigner,
    ) -> Result<B256, SenderError> {
        let wallet = EthereumWallet::new(signer.0.clone());
        let signed =
            NetworkWallet::<Ethereum>::sign_transaction_from(&wallet, signer.address(), tx).await?;

        let _ = self.provider.send_raw_transaction(&signed.encoded_2718()).await?;
        debug!(hash = %signed.tx_hash(), "broadcast envelope");

        Ok(*signed.tx_hash())
    }

    #[instrument(skip(self))]
    async fn wait_for_receipt(
        &self,
        hash: B256,
        poll_delay: Duration,
        max_retries: u64,
    ) -> Result<Receipt, SenderError> {
        for attempt in 1..=max_retries {
            if let Some(receipt) = self.provider.get_transaction_receipt(hash).await? {
                return Ok(receipt.into());
            }
            trace!(attempt, "receipt not available yet");

            if attempt < max_retries {
                tokio::time::sleep(poll_delay).await;
            }
        }

        Err(SenderError::ReceiptNotFound { hash, attempts: max_retries })
    }

    async fn get_nonce(&self, address: Address) -> Result<u64, SenderError> {
        Ok(self.reader.get_transaction_count(address).pending().await?)
    }

    async fn get_aa_nonce(&self, invoker: Address, account: Address) -> Result<U256, SenderError> {
        Ok(IInvoker::new(invoker, self.reader.clone()).getNonce(account).call().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{
        consensus::TxLegacy,
        primitives::{TxKind, U64},
        rpc::types::TransactionReceipt,
        signers::local::PrivateKeySigner,
        transports::mock::{Asserter, MockTransport},
    };
    use std::sync::Arc;
    use tokio::time::Instant;

    fn sender(asserter: &Asserter) -> ProviderSender {
        ProviderSender::from_transport(MockTransport::new(asserter.clone()), true)
    }

    #[tokio::test(start_paused = true)]
    async fn receipt_polling_is_bounded() {
        let asserter = Asserter::new();
        for _ in 0..3 {
            asserter.push_success(&Option::<TransactionReceipt>::None);
        }

        let start = Instant::now();
        let err = sender(&asserter)
            .wait_for_receipt(B256::with_last_byte(1), Duration::from_secs(3), 3)
            .await
            .unwrap_err();

        assert!(matches!(err, SenderError::ReceiptNotFound { attempts: 3, .. }));
        // Three queries, two delays between them.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
        assert!(asserter.read_q().is_empty());
    }

    #[tokio::test]
    async fn broadcast_returns_envelope_hash() {
        let asserter = Asserter::new();
        let signer = DynSigner(Arc::new(PrivateKeySigner::random()));
        let tx = envelope();

        let expected = {
            let wallet = EthereumWallet::new(signer.0.clone());
            *NetworkWallet::<Ethereum>::sign_transaction_from(&wallet, signer.address(), tx.clone())
                .await
                .unwrap()
                .tx_hash()
        };
        asserter.push_success(&expected);

        let hash = sender(&asserter).send_transaction(tx, &signer).await.unwrap();
        assert_eq!(hash, expected);
    }

    fn envelope() -> TypedTransaction {
        TypedTransaction::Legacy(TxLegacy {
            chain_id: Some(1),
            nonce: 0,
            gas_price: 1,
            gas_limit: 21_000,
            to: TxKind::Call(Address::ZERO),
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_send_is_not_retried() {
        let asserter = Asserter::new();
        asserter.push_failure_msg("rate limit exceeded, too many requests");
        asserter.push_success(&B256::with_last_byte(1));

        let signer = DynSigner(Arc::new(PrivateKeySigner::random()));
        let err = sender(&asserter).send_transaction(envelope(), &signer).await.unwrap_err();

        assert!(!err.is_connection_closed());
        assert_eq!(asserter.read_q().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_receipt_query_is_not_retried() {
        let asserter = Asserter::new();
        asserter.push_failure_msg("rate limit exceeded, too many requests");
        asserter.push_success(&Option::<TransactionReceipt>::None);

        let start = Instant::now();
        let err = sender(&asserter)
            .wait_for_receipt(B256::with_last_byte(1), Duration::from_secs(3), 2)
            .await
            .unwrap_err();

        assert!(matches!(err, SenderError::Rpc(_)), "{err:?}");
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(asserter.read_q().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_nonce_read_is_retried() {
        let asserter = Asserter::new();
        asserter.push_failure_msg("rate limit exceeded, too many requests");
        asserter.push_success(&U64::from(5));

        let nonce = sender(&asserter).get_nonce(Address::ZERO).await.unwrap();
        assert_eq!(nonce, 5);
        assert!(asserter.read_q().is_empty());
    }

    #[tokio::test]
    async fn rpc_rejection_is_not_transient() {
        let asserter = Asserter::new();
        asserter.push_failure_msg("nonce too low");

        let err = sender(&asserter).get_nonce(Address::ZERO).await.unwrap_err();
        assert!(!err.is_connection_closed());
    }

    #[test]
    fn classifies_closed_connections() {
        assert!(SenderError::from(TransportErrorKind::backend_gone()).is_connection_closed());
        assert!(
            SenderError::from(TransportErrorKind::custom(io::Error::from(
                io::ErrorKind::ConnectionReset
            )))
            .is_connection_closed()
        );
        assert!(
            SenderError::Other(Box::new(io::Error::from(io::ErrorKind::BrokenPipe)))
                .is_connection_closed()
        );

        assert!(
            !SenderError::from(TransportErrorKind::custom(io::Error::from(
                io::ErrorKind::TimedOut
            )))
            .is_connection_closed()
        );
        assert!(
            !SenderError::ReceiptNotFound { hash: B256::ZERO, attempts: 1 }.is_connection_closed()
        );
        assert!(!SenderError::from(RpcError::<TransportErrorKind>::NullResp).is_connection_closed());
    }
}
