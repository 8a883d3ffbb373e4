//! Service responsible for broadcasting relayed transactions.

mod metrics;
pub use metrics::RelayerMetrics;
mod pool;
pub use pool::{AaPool, NoncePool};
mod sender;
pub use sender::{ProviderSender, SenderError, TxSender};
mod service;
pub use service::{RelayerError, RelayerService, restore_pool};
