//! Relay configuration.
use crate::constants::{
    DEFAULT_GAS_PRICE, DEFAULT_MAX_CONNECTIONS, DEFAULT_METRICS_PORT, DEFAULT_PULL_INTERVAL,
    DEFAULT_RECEIPT_MAX_RETRIES, DEFAULT_RECEIPT_POLL_DELAY, DEFAULT_RPC_PORT,
};
use alloy::primitives::Address;
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, Ipv4Addr},
    path::Path,
    time::Duration,
};
use url::Url;

/// Relay configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Chain configuration.
    #[serde(default)]
    pub chain: ChainConfig,
    /// Relayer service configuration.
    #[serde(default)]
    pub service: RelayerServiceConfig,
    /// Secrets.
    #[serde(skip_serializing, default)]
    pub secrets: SecretsConfig,
    /// Database URL.
    ///
    /// Jobs are kept in memory if unset.
    pub database_url: Option<String>,
}

impl RelayConfig {
    /// Sets the IP address to serve the RPC on.
    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.server.address = address;
        self
    }

    /// Sets the port to serve the RPC on.
    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// Sets the port to serve the metrics on.
    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.server.metrics_port = port;
        self
    }

    /// Sets the maximum number of concurrent connections the relay can handle.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.server.max_connections = max_connections;
        self
    }

    /// Sets the RPC endpoint of the chain, if provided.
    pub fn with_endpoint(mut self, endpoint: Option<Url>) -> Self {
        if let Some(endpoint) = endpoint {
            self.chain.endpoint = Some(endpoint);
        }
        self
    }

    /// Sets the invoker address, if provided.
    pub fn with_invoker(mut self, invoker: Option<Address>) -> Self {
        if let Some(invoker) = invoker {
            self.chain.invoker = invoker;
        }
        self
    }

    /// Sets the interval at which the pool is drained.
    pub fn with_pull_interval(mut self, interval: Duration) -> Self {
        self.service = self.service.with_pull_interval(interval);
        self
    }

    /// Sets the delay between receipt queries.
    pub fn with_receipt_poll_delay(mut self, delay: Duration) -> Self {
        self.service = self.service.with_receipt_poll_delay(delay);
        self
    }

    /// Sets the number of receipt queries per envelope.
    pub fn with_receipt_max_retries(mut self, retries: u64) -> Self {
        self.service = self.service.with_receipt_max_retries(retries);
        self
    }

    /// Sets the gas price of envelopes.
    pub fn with_gas_price(mut self, gas_price: u64) -> Self {
        self.service = self.service.with_gas_price(gas_price);
        self
    }

    /// Sets the key signing envelopes, if provided.
    pub fn with_signer_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key {
            self.secrets.signer_key = key;
        }
        self
    }

    /// Sets the database URL, if provided.
    pub fn with_database_url(mut self, database_url: Option<String>) -> Self {
        self.database_url = database_url.or(self.database_url);
        self
    }

    /// Load from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save to a YAML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address to serve the RPC on.
    pub address: IpAddr,
    /// The port to serve the RPC on.
    pub port: u16,
    /// The port to serve the metrics on.
    pub metrics_port: u16,
    /// The maximum number of concurrent connections the relay can handle.
    pub max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_RPC_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Chain the relay submits to.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// The RPC endpoint of the chain to send transactions to.
    pub endpoint: Option<Url>,
    /// Address of the invoker contract.
    #[serde(default)]
    pub invoker: Address,
}

/// Configuration of the [`RelayerService`](crate::transactions::RelayerService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayerServiceConfig {
    /// Interval at which eligible jobs are pulled from the pool.
    #[serde(with = "crate::serde::duration")]
    pub pull_interval: Duration,
    /// Delay between two receipt queries.
    #[serde(with = "crate::serde::duration")]
    pub receipt_poll_delay: Duration,
    /// Number of receipt queries before a job is failed.
    pub receipt_max_retries: u64,
    /// Gas price of envelope transactions, in wei.
    pub gas_price: u64,
}

impl Default for RelayerServiceConfig {
    fn default() -> Self {
        Self {
            pull_interval: DEFAULT_PULL_INTERVAL,
            receipt_poll_delay: DEFAULT_RECEIPT_POLL_DELAY,
            receipt_max_retries: DEFAULT_RECEIPT_MAX_RETRIES,
            gas_price: DEFAULT_GAS_PRICE,
        }
    }
}

impl RelayerServiceConfig {
    /// Sets the interval at which the pool is drained.
    pub fn with_pull_interval(mut self, pull_interval: Duration) -> Self {
        self.pull_interval = pull_interval;
        self
    }

    /// Sets the delay between receipt queries.
    pub fn with_receipt_poll_delay(mut self, receipt_poll_delay: Duration) -> Self {
        self.receipt_poll_delay = receipt_poll_delay;
        self
    }

    /// Sets the number of receipt queries per envelope.
    pub fn with_receipt_max_retries(mut self, receipt_max_retries: u64) -> Self {
        self.receipt_max_retries = receipt_max_retries;
        self
    }

    /// Sets the gas price of envelopes.
    pub fn with_gas_price(mut self, gas_price: u64) -> Self {
        self.gas_price = gas_price;
        self
    }
}

/// Secrets.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Hex encoded private key signing envelopes.
    pub signer_key: String,
}
