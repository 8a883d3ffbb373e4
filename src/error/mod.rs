//! Relay error types.
use crate::{transactions::SenderError, types::AaSignatureError};
use alloy::primitives::Bytes;
use core::fmt;
use jsonrpsee::core::RpcResult;
use thiserror::Error;

mod storage;
pub use storage::StorageError;

/// The overarching error type returned by the `relay_` namespace.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The transaction signature does not match its account.
    #[error(transparent)]
    Signature(#[from] AaSignatureError),
    /// Errors related to storage.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// An error occurred talking to the chain.
    #[error(transparent)]
    Sender(#[from] SenderError),
}

impl From<RelayError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Signature(_) => invalid_params(err.to_string()),
            RelayError::Storage(inner) => inner.into(),
            RelayError::Sender(_) => internal_rpc(err.to_string()),
        }
    }
}

/// A helper trait to provide an RPC error code.
pub trait ToRpcResult<Ok, Err>: Sized {
    /// Converts result to [`RpcResult`] by converting error variant to
    /// [`jsonrpsee::types::error::ErrorObject`]
    fn to_rpc_result(self) -> RpcResult<Ok>
    where
        Err: fmt::Display;
}

macro_rules! impl_error_helpers {
    ($err:ty) => {
        impl<Ok> ToRpcResult<Ok, $err> for Result<Ok, $err> {
            fn to_rpc_result(self) -> RpcResult<Ok> {
                self.map_err(|err| err.into())
            }
        }

        impl From<$err> for String {
            fn from(err: $err) -> Self {
                err.to_string()
            }
        }
    };
}

impl_error_helpers!(RelayError);
impl_error_helpers!(StorageError);

/// Constructs an invalid params JSON‑RPC error.
fn invalid_params(msg: impl Into<String>) -> jsonrpsee::types::error::ErrorObject<'static> {
    rpc_err(jsonrpsee::types::error::INVALID_PARAMS_CODE, msg, None)
}

/// Constructs an internal JSON‑RPC error.
fn internal_rpc(msg: impl Into<String>) -> jsonrpsee::types::error::ErrorObject<'static> {
    rpc_err(jsonrpsee::types::error::INTERNAL_ERROR_CODE, msg, None)
}

/// Constructs a JSON‑RPC error with `code`, `message` and optional `data`.
fn rpc_err(
    code: i32,
    msg: impl Into<String>,
    data: Option<Bytes>,
) -> jsonrpsee::types::error::ErrorObject<'static> {
    jsonrpsee::types::error::ErrorObject::owned(code, msg.into(), data)
}
