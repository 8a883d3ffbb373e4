use super::{internal_rpc, invalid_params};
use crate::types::TxId;

/// Errors returned by [`StorageApi`](crate::storage::StorageApi).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A job with the same id is already stored.
    #[error("transaction {0} already exists")]
    AlreadyExists(TxId),
    /// No job with the given id is stored.
    #[error("transaction {0} not found")]
    NotFound(TxId),
    /// A deserialization error occurred.
    #[error("a deserialization error occurred")]
    SerdeError(#[from] serde_json::Error),
    /// An internal error occurred.
    #[error("an internal error occurred")]
    InternalError(#[from] eyre::Error),
}

impl From<StorageError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(..) | StorageError::NotFound(..) => {
                invalid_params(err.to_string())
            }
            StorageError::SerdeError(..) => internal_rpc("an internal error occurred"),
            StorageError::InternalError(..) => internal_rpc("an internal error occurred"),
        }
    }
}
