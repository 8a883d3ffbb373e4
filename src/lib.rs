//! # AA Relay
//!
//! Library for a relayer of account-abstraction transactions.
//!
//! Users submit signed [`AaTransaction`](types::AaTransaction)s over the `relay_` RPC namespace.
//! Each one is stored, scheduled in a nonce-ordered pool and broadcast by the
//! [`RelayerService`](transactions::RelayerService) inside an envelope calling the invoker
//! contract, until it reaches a final status.

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod rpc;
pub mod serde;
pub mod signers;
pub mod spawn;
pub mod storage;
pub mod transactions;
pub mod types;
