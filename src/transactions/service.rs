use super::{AaPool, RelayerMetrics, SenderError, TxSender};
use crate::{
    config::RelayerServiceConfig,
    constants::{INVOKE_GAS_OVERHEAD, NONCE_GAP_GAS_LIMIT},
    error::StorageError,
    signers::DynSigner,
    storage::{RelayStorage, StorageApi},
    types::{AaStateTransaction, AaTransaction, IInvoker, JobError, Status},
};
use alloy::{
    consensus::{TxLegacy, TypedTransaction},
    primitives::{Address, B256, TxKind},
    sol_types::SolCall,
};
use chrono::Utc;
use futures_util::{StreamExt, lock::Mutex, stream::FuturesUnordered};
use std::sync::Arc;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Errors that may occur while executing a job.
#[derive(Debug, thiserror::Error)]
pub enum RelayerError {
    /// The envelope could not be sent for a transient reason. The job was put back into the pool.
    #[error("transient send failure: {0}")]
    TransientSend(#[source] SenderError),
    /// The envelope was rejected. The job failed.
    #[error("send failed: {0}")]
    PermanentSend(#[source] SenderError),
    /// No receipt could be obtained for the broadcast envelope. The job failed.
    #[error("receipt unavailable: {0}")]
    Receipt(#[source] SenderError),
    /// The job record could not be persisted.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The job could not be moved through its lifecycle.
    #[error(transparent)]
    Job(#[from] JobError),
    /// Execution was cancelled.
    #[error("job execution cancelled")]
    Cancelled,
}

/// Service broadcasting queued jobs through the invoker and tracking them to a final status.
#[derive(Debug)]
pub struct RelayerService {
    /// Chain access.
    sender: Arc<dyn TxSender>,
    /// Jobs waiting for dispatch.
    pool: Arc<dyn AaPool>,
    /// Durable job records.
    storage: RelayStorage,
    /// Key signing the envelopes.
    signer: DynSigner,
    /// Address of the invoker contract.
    invoker: Address,
    /// Chain the envelopes are signed for.
    chain_id: u64,
    /// Service configuration.
    config: RelayerServiceConfig,
    /// Next nonce of the signer.
    nonce: Mutex<u64>,
    /// Metrics of the service.
    metrics: RelayerMetrics,
}

impl RelayerService {
    /// Creates a new [`RelayerService`].
    ///
    /// Fetches the pending nonce of the signer. Neither the pool nor the storage are touched.
    pub async fn new(
        sender: Arc<dyn TxSender>,
        pool: Arc<dyn AaPool>,
        storage: RelayStorage,
        signer: DynSigner,
        invoker: Address,
        chain_id: u64,
        config: RelayerServiceConfig,
    ) -> Result<Self, SenderError> {
        let nonce = sender.get_nonce(signer.address()).await?;
        debug!(signer = %signer.address(), nonce, "loaded signer nonce");

        Ok(Self {
            sender,
            pool,
            storage,
            signer,
            invoker,
            chain_id,
            config,
            nonce: Mutex::new(nonce),
            metrics: RelayerMetrics::default(),
        })
    }

    /// Address of the signer.
    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    /// Spawns the dispatch loop.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Runs the dispatch loop until `cancel` fires.
    ///
    /// Every tick drains the eligible jobs from the pool and executes them concurrently.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            signer = %self.signer.address(),
            invoker = %self.invoker,
            interval = ?self.config.pull_interval,
            "starting dispatch loop"
        );

        let mut ticker = tokio::time::interval(self.config.pull_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut running = FuturesUnordered::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    while let Some(job) = self.pool.pop() {
                        running.push(self.dispatch(job, &cancel));
                    }
                    self.metrics.queued.set(self.pool.len() as f64);
                    self.metrics.in_flight.set(running.len() as f64);
                }
                Some(()) = running.next(), if !running.is_empty() => {}
            }
        }

        // Running jobs observe the cancellation and return.
        while running.next().await.is_some() {}
        info!("dispatch loop stopped");
    }

    async fn dispatch(&self, job: AaStateTransaction, cancel: &CancellationToken) {
        let id = job.id;
        match self.execute_job(job, cancel).await {
            Ok(job) => debug!(%id, status = %job.status, "job executed"),
            Err(RelayerError::Cancelled) => debug!(%id, "job cancelled"),
            Err(err) => error!(%id, %err, "failed to execute job"),
        }
    }

    /// Sends a job, waits for its receipt and records the outcome.
    ///
    /// A job is persisted once after the send and once after the receipt wait. The account of the
    /// job is released in the pool once the job reached a final status, or the job is pushed back
    /// into the pool if the envelope could not be sent for a transient reason.
    #[instrument(skip_all, fields(id = %job.id, from = %job.from(), nonce = %job.tx.nonce()))]
    pub async fn execute_job(
        &self,
        mut job: AaStateTransaction,
        cancel: &CancellationToken,
    ) -> Result<AaStateTransaction, RelayerError> {
        if job.status.is_final() {
            warn!(status = %job.status, "skipping job with final status");
            self.pool.update(job.from());
            return Ok(job);
        }

        let hash = match (job.status, job.tx_hash()) {
            (Status::Pending, Some(hash)) => {
                debug!(%hash, "resuming broadcast job");
                hash
            }
            _ => self.send_job(&mut job, cancel).await?,
        };

        let Some(result) = cancel
            .run_until_cancelled(self.sender.wait_for_receipt(
                hash,
                self.config.receipt_poll_delay,
                self.config.receipt_max_retries,
            ))
            .await
        else {
            return Err(RelayerError::Cancelled);
        };

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(err) => {
                warn!(%hash, %err, "failed to obtain receipt");
                job.fail(&err)?;
                self.metrics.failed.increment(1);

                let persisted = self.storage.update(&job).await;
                self.pool.update(job.from());
                persisted?;

                return Err(RelayerError::Receipt(err));
            }
        };

        job.receipt = Some(receipt);
        if receipt.is_success() {
            job.transition(Status::Completed)?;
            self.metrics.confirmed.increment(1);
            self.metrics
                .confirmation_time
                .record((Utc::now() - job.created_at).num_milliseconds() as f64);
        } else {
            job.fail("invoke reverted")?;
            self.metrics.failed.increment(1);
        }
        info!(%hash, status = %job.status, block = receipt.block_number, "job resolved");

        let persisted = self.storage.update(&job).await;
        self.pool.update(job.from());
        persisted?;

        Ok(job)
    }

    /// Broadcasts the envelope of a job and records it as pending.
    async fn send_job(
        &self,
        job: &mut AaStateTransaction,
        cancel: &CancellationToken,
    ) -> Result<B256, RelayerError> {
        let nonce = {
            let mut nonce = self.nonce.lock().await;
            let current_nonce = *nonce;
            *nonce += 1;
            current_nonce
        };

        job.attempts += 1;
        let envelope = self.build_envelope(&job.tx, nonce);
        let Some(result) = cancel
            .run_until_cancelled(self.sender.send_transaction(envelope, &self.signer))
            .await
        else {
            self.release_nonce(nonce).await;
            return Err(RelayerError::Cancelled);
        };

        let hash = match result {
            Ok(hash) => hash,
            Err(err) => {
                self.release_nonce(nonce).await;
                return Err(self.on_send_error(job, err).await);
            }
        };

        job.set_tx_hash(hash)?;
        job.transition(Status::Pending)?;
        job.last_error = None;
        self.metrics.sent.increment(1);
        debug!(%hash, envelope_nonce = nonce, "envelope broadcast");

        // The envelope is out. A job that can't be recorded as pending keeps its account locked
        // rather than risking a second broadcast.
        self.storage.update(job).await?;

        Ok(hash)
    }

    /// Records a failed send and releases or requeues the job.
    async fn on_send_error(&self, job: &mut AaStateTransaction, err: SenderError) -> RelayerError {
        if err.is_connection_closed() {
            warn!(%err, "connection closed while sending, requeueing job");
            if let Err(err) = job.transition(Status::Queued) {
                return err.into();
            }
            job.last_error = Some(err.to_string());
            self.metrics.requeued.increment(1);

            let persisted = self.storage.update(job).await;
            self.pool.push(job.clone());
            return match persisted {
                Ok(()) => RelayerError::TransientSend(err),
                Err(storage) => storage.into(),
            };
        }

        warn!(%err, "envelope rejected");
        if let Err(err) = job.fail(&err) {
            return err.into();
        }
        self.metrics.failed.increment(1);

        let persisted = self.storage.update(job).await;
        self.pool.update(job.from());
        match persisted {
            Ok(()) => RelayerError::PermanentSend(err),
            Err(storage) => storage.into(),
        }
    }

    /// Builds the envelope calling the invoker with `tx`.
    fn build_envelope(&self, tx: &AaTransaction, nonce: u64) -> TypedTransaction {
        let input = IInvoker::invokeCall {
            signature: tx.signature.clone(),
            transaction: tx.transaction.clone(),
        }
        .abi_encode();

        TypedTransaction::Legacy(TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price: self.config.gas_price.into(),
            gas_limit: tx.gas_limit().saturating_add(INVOKE_GAS_OVERHEAD),
            to: TxKind::Call(self.invoker),
            input: input.into(),
            ..Default::default()
        })
    }

    /// Gives back a nonce whose envelope was never broadcast.
    async fn release_nonce(&self, nonce: u64) {
        // If no other envelope occupied the next nonce, we can just reset it.
        {
            let mut lock = self.nonce.lock().await;
            if *lock == nonce + 1 {
                *lock = nonce;
                return;
            }
        }

        // Otherwise, we need to close the nonce gap.
        if let Err(err) = self.close_nonce_gap(nonce).await {
            error!(nonce, %err, "failed to close nonce gap");
        }
    }

    /// Closes a nonce gap by sending an empty transfer to the signer itself.
    async fn close_nonce_gap(&self, nonce: u64) -> Result<(), SenderError> {
        let tx = TypedTransaction::Legacy(TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price: self.config.gas_price.into(),
            gas_limit: NONCE_GAP_GAS_LIMIT,
            to: TxKind::Call(self.signer.address()),
            ..Default::default()
        });

        let hash = self.sender.send_transaction(tx, &self.signer).await?;
        self.metrics.closed_nonce_gaps.increment(1);
        debug!(nonce, %hash, "closed nonce gap");

        Ok(())
    }
}

/// Loads the unfinished jobs from `storage` into `pool`.
///
/// Pending jobs come first so that a resumed envelope is confirmed before its successors are sent.
pub async fn restore_pool(storage: &RelayStorage, pool: &dyn AaPool) -> Result<usize, StorageError> {
    let mut jobs = storage.get_all_pending().await?;
    jobs.extend(storage.get_all_queued().await?);

    let restored = jobs.len();
    pool.init(jobs);
    info!(restored, "restored pool from storage");

    Ok(restored)
}
