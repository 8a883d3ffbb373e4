use super::{Transaction, invoker_domain};
use crate::signers::DynSigner;
use alloy::{
    primitives::{
        Address, B256, Bytes, Signature, SignatureError, U256, keccak256, wrap_fixed_bytes,
    },
    signers::Signer,
    sol_types::{SolStruct, SolValue},
};
use serde::{Deserialize, Serialize};

wrap_fixed_bytes! {
    /// Id of an AA transaction handled by the relay.
    ///
    /// Derived from the signed request, so resubmitting the same request yields the same id.
    pub struct TxId<32>;
}

/// Errors returned when checking the signature of an [`AaTransaction`].
#[derive(Debug, thiserror::Error)]
pub enum AaSignatureError {
    /// The signature could not be parsed or recovered.
    #[error(transparent)]
    Invalid(#[from] SignatureError),
    /// The signature is valid but was produced by another key.
    #[error("transaction signed by {recovered}, expected {expected}")]
    SignerMismatch {
        /// The `from` field of the transaction.
        expected: Address,
        /// The recovered signer.
        recovered: Address,
    },
}

/// An account-abstraction transaction submitted by a user.
///
/// The signature binds the transaction to a single invoker deployment on a single chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AaTransaction {
    /// Signature over the EIP-712 digest of `transaction`.
    pub signature: Bytes,
    /// The signed transaction.
    pub transaction: Transaction,
}

impl AaTransaction {
    /// Creates an unsigned [`AaTransaction`].
    pub fn new(transaction: Transaction) -> Self {
        Self { signature: Bytes::new(), transaction }
    }

    /// Deterministic id of the transaction.
    pub fn id(&self) -> TxId {
        TxId(keccak256((self.signature.clone(), self.transaction.clone()).abi_encode()))
    }

    /// The account this transaction is executed for.
    pub fn from(&self) -> Address {
        self.transaction.from
    }

    /// The AA nonce of the transaction.
    pub fn nonce(&self) -> U256 {
        self.transaction.nonce
    }

    /// Total gas forwarded to the payload calls.
    pub fn gas_limit(&self) -> u64 {
        self.transaction
            .payload
            .iter()
            .map(|call| call.gasLimit.saturating_to::<u64>())
            .fold(0, u64::saturating_add)
    }

    /// EIP-712 digest the account signs.
    pub fn signing_hash(&self, invoker: Address, chain_id: u64) -> B256 {
        self.transaction.eip712_signing_hash(&invoker_domain(invoker, chain_id))
    }

    /// Signs the transaction for the given invoker and chain.
    pub async fn sign(
        &mut self,
        invoker: Address,
        chain_id: u64,
        signer: &DynSigner,
    ) -> alloy::signers::Result<()> {
        let signature = signer.sign_hash(&self.signing_hash(invoker, chain_id)).await?;
        self.signature = signature.as_bytes().into();
        Ok(())
    }

    /// Recovers the address that produced `signature`.
    pub fn recover_signer(
        &self,
        invoker: Address,
        chain_id: u64,
    ) -> Result<Address, SignatureError> {
        Signature::from_raw(&self.signature)?
            .recover_address_from_prehash(&self.signing_hash(invoker, chain_id))
    }

    /// Ensures the transaction was signed by its `from` account.
    pub fn verify(&self, invoker: Address, chain_id: u64) -> Result<(), AaSignatureError> {
        let recovered = self.recover_signer(invoker, chain_id)?;
        if recovered != self.from() {
            return Err(AaSignatureError::SignerMismatch { expected: self.from(), recovered });
        }
        Ok(())
    }
}
