//! Relay spawn utilities.
use crate::{
    cli::Args,
    config::RelayConfig,
    metrics,
    rpc::{Relay, RelayApiServer},
    signers::DynSigner,
    storage::RelayStorage,
    transactions::{AaPool, NoncePool, ProviderSender, RelayerService, TxSender, restore_pool},
};
use alloy::{rpc::client::BuiltInConnectionString, transports::TransportConnect};
use eyre::{Context, OptionExt};
use jsonrpsee::server::{Server, ServerConfig, ServerHandle};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::{net::SocketAddr, path::Path, str::FromStr, sync::Arc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Context returned once relay is launched.
#[derive(Debug)]
pub struct RelayHandle {
    /// The socket address to which the server is bound.
    pub local_addr: SocketAddr,
    /// Handle to RPC server.
    pub server: ServerHandle,
    /// Storage of the relay.
    pub storage: RelayStorage,
    /// Jobs waiting to be sent.
    pub pool: Arc<dyn AaPool>,
    /// Metrics collector handle.
    pub metrics: PrometheusHandle,
    /// Stops the dispatch loop.
    cancel: CancellationToken,
    /// The dispatch loop.
    dispatcher: JoinHandle<()>,
}

impl RelayHandle {
    /// Returns the url to the http server
    pub fn http_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Stops the RPC server and waits for the dispatch loop to finish.
    pub async fn shutdown(self) {
        if self.server.stop().is_err() {
            warn!("RPC server already stopped");
        }
        self.cancel.cancel();
        if let Err(err) = self.dispatcher.await {
            warn!(%err, "dispatch loop did not shut down cleanly");
        }
    }
}

/// Attempts to spawn the relay service using CLI arguments and a configuration file.
pub async fn try_spawn_with_args<P: AsRef<Path>>(
    args: Args,
    config_path: P,
) -> eyre::Result<RelayHandle> {
    let config = if args.config_only {
        RelayConfig::load_from_file(&config_path)?
    } else if !config_path.as_ref().exists() {
        let config = args.merge_relay_config(RelayConfig::default());
        config.save_to_file(&config_path)?;
        config
    } else {
        // File exists: load and override with CLI values.
        args.merge_relay_config(RelayConfig::load_from_file(&config_path)?)
    };

    try_spawn(config).await
}

/// Spawns the relay service using the provided [`RelayConfig`].
pub async fn try_spawn(config: RelayConfig) -> eyre::Result<RelayHandle> {
    // construct db
    let storage = if let Some(db_url) = &config.database_url {
        info!("Using PostgreSQL as storage.");
        let pool = PgPool::connect(db_url).await?;
        sqlx::migrate!().run(&pool).await?;

        RelayStorage::pg(pool)
    } else {
        info!("Using in-memory storage.");
        RelayStorage::in_memory()
    };

    // construct sender
    let endpoint = config.chain.endpoint.as_ref().ok_or_eyre("missing chain endpoint")?;
    let connection = BuiltInConnectionString::from_str(endpoint.as_str())?;
    let is_local = connection.is_local();
    let transport = connection
        .connect_boxed()
        .await
        .wrap_err_with(|| format!("failed to connect to {endpoint}"))?;
    let provider_sender = ProviderSender::from_transport(transport, is_local);
    let chain_id = provider_sender.chain_id().await?;

    let signer = DynSigner::from_signing_key(&config.secrets.signer_key)
        .await
        .wrap_err("invalid signer key")?;
    let signer_addr = signer.address();

    // setup metrics exporter
    let metrics =
        metrics::setup_exporter((config.server.address, config.server.metrics_port)).await?;

    // construct relayer service and restore unfinished jobs
    let sender: Arc<dyn TxSender> = Arc::new(provider_sender);
    let pool: Arc<dyn AaPool> = Arc::new(NoncePool::default());
    let service = Arc::new(
        RelayerService::new(
            sender.clone(),
            pool.clone(),
            storage.clone(),
            signer,
            config.chain.invoker,
            chain_id,
            config.service.clone(),
        )
        .await?,
    );
    restore_pool(&storage, pool.as_ref()).await?;

    let cancel = CancellationToken::new();
    let dispatcher = service.spawn(cancel.clone());

    // construct rpc module
    let rpc = Relay::new(config.chain.invoker, chain_id, sender, pool.clone(), storage.clone())
        .into_rpc();

    // start server
    let server = Server::builder()
        .set_config(
            ServerConfig::builder()
                .http_only()
                .max_connections(config.server.max_connections)
                .build(),
        )
        .build((config.server.address, config.server.port))
        .await?;
    let addr = server.local_addr()?;
    info!(%addr, chain_id, invoker = %config.chain.invoker, "Started relay service");
    info!("Transaction signer: {}", signer_addr);

    Ok(RelayHandle {
        local_addr: addr,
        server: server.start(rpc),
        storage,
        pool,
        metrics,
        cancel,
        dispatcher,
    })
}
