//! Relay constants.

use std::time::Duration;

/// How often the dispatch loop pulls eligible jobs from the pool.
pub const DEFAULT_PULL_INTERVAL: Duration = Duration::from_secs(2);

/// Delay between two receipt queries for a broadcast envelope.
pub const DEFAULT_RECEIPT_POLL_DELAY: Duration = Duration::from_secs(3);

/// Number of receipt queries before a broadcast envelope is considered lost.
pub const DEFAULT_RECEIPT_MAX_RETRIES: u64 = 5;

/// Gas price of envelope transactions, in wei.
pub const DEFAULT_GAS_PRICE: u64 = 0x70000000;

/// Gas added on top of the payload gas limits to cover the invoker itself.
pub const INVOKE_GAS_OVERHEAD: u64 = 100_000;

/// Gas limit of the self transfer used to close a nonce gap.
pub const NONCE_GAP_GAS_LIMIT: u64 = 21_000;

/// Default port of the RPC server.
pub const DEFAULT_RPC_PORT: u16 = 9119;

/// Default port of the prometheus exporter.
pub const DEFAULT_METRICS_PORT: u16 = 9000;

/// Default number of concurrent RPC connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5_000;
