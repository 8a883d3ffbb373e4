//! # Relay CLI
use crate::{
    config::RelayConfig,
    constants::{
        DEFAULT_GAS_PRICE, DEFAULT_MAX_CONNECTIONS, DEFAULT_METRICS_PORT, DEFAULT_PULL_INTERVAL,
        DEFAULT_RECEIPT_MAX_RETRIES, DEFAULT_RECEIPT_POLL_DELAY, DEFAULT_RPC_PORT,
    },
    spawn::try_spawn_with_args,
};
use alloy::primitives::Address;
use clap::Parser;
use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
    time::Duration,
};
use tracing::info;
use url::Url;

/// The AA relayer broadcasts account-abstraction transactions through an invoker contract.
#[derive(Debug, Parser)]
#[command(author, about = "Relay", long_about = None)]
pub struct Args {
    /// The configuration file.
    ///
    /// If missing, a default one will be used and stored in the working directory under
    /// `relay.yaml`.
    #[arg(long, value_name = "CONFIG", env = "RELAY_CONFIG", default_value = "relay.yaml")]
    pub config: PathBuf,
    /// The address to serve the RPC on.
    #[arg(long = "http.addr", value_name = "ADDR", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub address: IpAddr,
    /// The port to serve the RPC on.
    #[arg(long = "http.port", value_name = "PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub port: u16,
    /// The port to serve the metrics on.
    #[arg(long = "http.metrics-port", value_name = "PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,
    /// The maximum number of concurrent connections the relay can handle.
    #[arg(long = "max-connections", value_name = "NUM", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
    /// The RPC endpoint of the chain to send transactions to.
    ///
    /// Must be a valid HTTP, HTTPS or WS URL pointing to an Ethereum JSON-RPC endpoint.
    #[arg(long = "endpoint", required_unless_present("config_only"), value_name = "RPC_ENDPOINT")]
    pub endpoint: Option<Url>,
    /// The address of the invoker contract.
    #[arg(long = "invoker", required_unless_present("config_only"), value_name = "INVOKER")]
    pub invoker: Option<Address>,
    /// Interval at which queued transactions are dispatched, in milliseconds.
    #[arg(
        long,
        value_name = "MILLIS",
        default_value_t = DEFAULT_PULL_INTERVAL.as_millis() as u64
    )]
    pub pull_interval: u64,
    /// Delay between two receipt queries, in milliseconds.
    #[arg(
        long,
        value_name = "MILLIS",
        default_value_t = DEFAULT_RECEIPT_POLL_DELAY.as_millis() as u64
    )]
    pub receipt_poll_delay: u64,
    /// Number of receipt queries before a transaction is considered failed.
    #[arg(long, value_name = "NUM", default_value_t = DEFAULT_RECEIPT_MAX_RETRIES)]
    pub receipt_max_retries: u64,
    /// Gas price of envelope transactions, in wei.
    #[arg(long, value_name = "WEI", default_value_t = DEFAULT_GAS_PRICE)]
    pub gas_price: u64,
    /// The secret key to sign envelope transactions with.
    #[arg(long = "signer-key", value_name = "SECRET_KEY", env = "RELAY_SK")]
    pub signer_key: Option<String>,
    /// The database URL for the relay.
    #[arg(long = "database-url", value_name = "URL", env = "RELAY_DB_URL")]
    pub database_url: Option<String>,
    /// Reads all values from the config file.
    ///
    /// This makes required CLI args not required, but it is important that any required CLI args
    /// have been configured in the config and do not use default values, as this is likely not
    /// what you want.
    #[arg(long = "config-only", default_value_t = false)]
    pub config_only: bool,
}

impl Args {
    /// Run the relayer service.
    pub async fn run(self) -> eyre::Result<()> {
        let config_path = self.config.clone();
        let handle = try_spawn_with_args(self, &config_path).await?;

        tokio::select! {
            _ = handle.server.clone().stopped() => {}
            _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
        }
        handle.shutdown().await;

        Ok(())
    }

    /// Merges [`Args`] values into an existing [`RelayConfig`] instance.
    pub fn merge_relay_config(self, config: RelayConfig) -> RelayConfig {
        config
            .with_address(self.address)
            .with_port(self.port)
            .with_metrics_port(self.metrics_port)
            .with_max_connections(self.max_connections)
            .with_endpoint(self.endpoint)
            .with_invoker(self.invoker)
            .with_pull_interval(Duration::from_millis(self.pull_interval))
            .with_receipt_poll_delay(Duration::from_millis(self.receipt_poll_delay))
            .with_receipt_max_retries(self.receipt_max_retries)
            .with_gas_price(self.gas_price)
            .with_signer_key(self.signer_key)
            .with_database_url(self.database_url)
    }
}
