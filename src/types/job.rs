use super::{AaTransaction, Receipt, TxId};
use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a tracked job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting to be broadcast.
    #[default]
    Queued,
    /// Broadcast, waiting for a receipt.
    Pending,
    /// Included and executed successfully.
    Completed,
    /// Rejected, reverted, or never confirmed.
    Failed,
}

impl Status {
    /// Whether the status is final.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a job may move from `self` to `next`.
    ///
    /// `Queued | Pending -> Queued` is only taken when a send failed for a transient reason.
    pub fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Queued, Self::Queued | Self::Pending | Self::Failed) => true,
            (Self::Pending, Self::Queued | Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => f.write_str("queued"),
            Self::Pending => f.write_str("pending"),
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Errors raised when mutating an [`AaStateTransaction`].
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The lifecycle does not allow this transition.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: Status,
        /// Requested status.
        to: Status,
    },
    /// A different hash was already recorded for the job.
    #[error("transaction hash already set to {0}")]
    TxHashAlreadySet(B256),
}

/// An [`AaTransaction`] tracked through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AaStateTransaction {
    /// Id of the job, equal to the id of the wrapped transaction.
    pub id: TxId,
    /// The relayed transaction.
    pub tx: AaTransaction,
    /// Current status.
    pub status: Status,
    /// Hash of the envelope carrying the transaction.
    tx_hash: Option<B256>,
    /// Receipt of the envelope, once known.
    pub receipt: Option<Receipt>,
    /// Number of send attempts.
    pub attempts: u32,
    /// Last error observed while processing the job.
    pub last_error: Option<String>,
    /// Time the job was created.
    pub created_at: DateTime<Utc>,
    /// Time of the last change.
    pub updated_at: DateTime<Utc>,
}

impl AaStateTransaction {
    /// Creates a queued job for `tx`.
    pub fn new(tx: AaTransaction) -> Self {
        let now = Utc::now();
        Self {
            id: tx.id(),
            tx,
            status: Status::Queued,
            tx_hash: None,
            receipt: None,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The account the job belongs to.
    pub fn from(&self) -> Address {
        self.tx.from()
    }

    /// Hash of the envelope, if the job was broadcast.
    pub fn tx_hash(&self) -> Option<B256> {
        self.tx_hash
    }

    /// Records the envelope hash. The hash can only be set once.
    pub fn set_tx_hash(&mut self, hash: B256) -> Result<(), JobError> {
        match self.tx_hash {
            Some(existing) if existing != hash => Err(JobError::TxHashAlreadySet(existing)),
            _ => {
                self.tx_hash = Some(hash);
                self.updated_at = Utc::now();
                Ok(())
            }
        }
    }

    /// Moves the job to `next`.
    pub fn transition(&mut self, next: Status) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Moves the job to [`Status::Failed`], remembering `reason`.
    pub fn fail(&mut self, reason: impl fmt::Display) -> Result<(), JobError> {
        self.transition(Status::Failed)?;
        self.last_error = Some(reason.to_string());
        Ok(())
    }
}
