use alloy::{network::ReceiptResponse, primitives::B256, rpc::types::TransactionReceipt};
use serde::{Deserialize, Serialize};

/// Receipt status code of a successfully executed transaction.
pub const RECEIPT_STATUS_SUCCESS: u64 = 1;

/// Receipt status code of a reverted transaction.
pub const RECEIPT_STATUS_FAILURE: u64 = 0;

/// Summary of the on-chain receipt of a relayed envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Execution status code reported by the chain.
    pub status: u64,
    /// Gas used by the envelope.
    pub gas_used: u64,
    /// Hash of the including block.
    pub block_hash: B256,
    /// Number of the including block.
    pub block_number: u64,
}

impl Receipt {
    /// Whether the envelope executed successfully.
    pub fn is_success(&self) -> bool {
        self.status == RECEIPT_STATUS_SUCCESS
    }
}

impl From<TransactionReceipt> for Receipt {
    fn from(receipt: TransactionReceipt) -> Self {
        Self {
            status: if receipt.status() { RECEIPT_STATUS_SUCCESS } else { RECEIPT_STATUS_FAILURE },
            gas_used: receipt.gas_used,
            block_hash: receipt.block_hash.unwrap_or_default(),
            block_number: receipt.block_number.unwrap_or_default(),
        }
    }
}
