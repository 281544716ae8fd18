//! Builders for signed transactions used by tests across the workspace.
use alloy::signers::{SignerSync, local::PrivateKeySigner};
use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy_primitives::{Address, B256, ChainId, Signature, TxKind, U256};

/// Deterministic signer derived from a non-zero seed byte
pub fn signer(seed: u8) -> PrivateKeySigner {
    assert_ne!(seed, 0, "zero is not a valid secp256k1 key");
    PrivateKeySigner::from_bytes(&B256::repeat_byte(seed)).expect("valid private key")
}

fn kind(to: Option<Address>) -> TxKind {
    to.map_or(TxKind::Create, TxKind::Call)
}

/// Legacy transaction signed by `signer`; `chain_id = None` produces a pre-EIP-155 signature
pub fn legacy_tx(
    signer: &PrivateKeySigner,
    chain_id: Option<ChainId>,
    nonce: u64,
    to: Option<Address>,
    value: U256,
) -> TxEnvelope {
    let tx = TxLegacy {
        chain_id,
        nonce,
        gas_price: 1_000_000_000,
        gas_limit: 21_000,
        to: kind(to),
        value,
        ..Default::default()
    };
    let signature = signer.sign_hash_sync(&tx.signature_hash()).expect("signing succeeds");
    tx.into_signed(signature).into()
}

/// EIP-1559 transaction signed by `signer`
pub fn eip1559_tx(
    signer: &PrivateKeySigner,
    chain_id: ChainId,
    nonce: u64,
    to: Option<Address>,
    value: U256,
) -> TxEnvelope {
    let tx = TxEip1559 {
        chain_id,
        nonce,
        gas_limit: 21_000,
        max_fee_per_gas: 2_000_000_000,
        max_priority_fee_per_gas: 1_000_000_000,
        to: kind(to),
        value,
        ..Default::default()
    };
    let signature = signer.sign_hash_sync(&tx.signature_hash()).expect("signing succeeds");
    tx.into_signed(signature).into()
}

/// Legacy transaction carrying an all-zero signature, which never recovers
pub fn unrecoverable_tx(chain_id: ChainId, nonce: u64, to: Option<Address>) -> TxEnvelope {
    let tx = TxLegacy {
        chain_id: Some(chain_id),
        nonce,
        gas_price: 1_000_000_000,
        gas_limit: 21_000,
        to: kind(to),
        value: U256::from(1),
        ..Default::default()
    };
    tx.into_signed(Signature::new(U256::ZERO, U256::ZERO, false)).into()
}
