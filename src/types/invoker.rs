use alloy::{
    primitives::{Address, U256},
    sol,
    sol_types::Eip712Domain,
};
use serde::{Deserialize, Serialize};

/// EIP-712 domain name of the invoker contract.
pub const INVOKER_DOMAIN_NAME: &str = "Invoker";

/// EIP-712 domain version of the invoker contract.
pub const INVOKER_DOMAIN_VERSION: &str = "1.0.0";

sol! {
    /// A single call the invoker executes on behalf of an account.
    #[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct TransactionPayload {
        /// Call target.
        address to;
        /// Native value forwarded with the call.
        uint256 value;
        /// Gas forwarded to the call.
        uint256 gasLimit;
        /// Calldata.
        bytes data;
    }

    /// The account intent signed by the user and executed by the invoker.
    #[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Transaction {
        /// The account the calls are executed for.
        address from;
        /// Per account AA nonce tracked by the invoker.
        uint256 nonce;
        /// Calls to execute, in order.
        TransactionPayload[] payload;
    }

    /// The on-chain invoker that validates and executes relayed transactions.
    #[sol(rpc)]
    interface IInvoker {
        /// Validates `signature` over `transaction` and executes its payload.
        function invoke(bytes signature, Transaction transaction) external;

        /// Returns the next AA nonce of `account`.
        function getNonce(address account) external view returns (uint256);
    }
}

/// Returns the EIP-712 domain of the invoker deployed at `invoker` on `chain_id`.
pub fn invoker_domain(invoker: Address, chain_id: u64) -> Eip712Domain {
    Eip712Domain::new(
        Some(INVOKER_DOMAIN_NAME.into()),
        Some(INVOKER_DOMAIN_VERSION.into()),
        Some(U256::from(chain_id)),
        Some(invoker),
        None,
    )
}
