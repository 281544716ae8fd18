use alloy_consensus::{Transaction, TxEnvelope, transaction::SignerRecoverable};
use alloy_primitives::Address;
use thiserror::Error;

/// Reasons a transaction sender cannot be resolved
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SenderRecoveryError {
    /// Legacy transaction signed without EIP-155 replay protection
    #[error("transaction does not declare a chain id")]
    MissingChainId,
    /// Signature values do not recover to a public key
    #[error("signature does not recover to a public key")]
    InvalidSignature,
}

/// Recover the signer of `tx`.
///
/// The signature hash is keyed to the chain id the transaction declares (EIP-155 for legacy
/// transactions, the `chainId` field for typed ones), so a transaction signed for any chain
/// resolves to its real sender.
pub fn recover_sender(tx: &TxEnvelope) -> Result<Address, SenderRecoveryError> {
    if tx.chain_id().is_none() {
        return Err(SenderRecoveryError::MissingChainId);
    }

    tx.recover_signer().map_err(|_| SenderRecoveryError::InvalidSignature)
}
