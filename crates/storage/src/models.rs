//! Records written by the ingestion engine.
use sqlx::FromRow;

use crate::StoreError;

/// Address whose transactions are recorded
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct WatchedAddress {
    /// Canonical (EIP-55) address text
    pub address: String,
}

/// Transaction that touched a watched address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedTransaction {
    /// Transaction hash, 0x-prefixed lowercase hex
    pub hash: String,
    /// Transferred value in wei, decimal
    pub value: String,
    /// JSON encoding of the signed transaction envelope
    pub raw_encoded: String,
    /// Resolved sender, empty when the signature could not be resolved
    pub from: String,
    /// Recipient, empty for contract creations
    pub to: String,
    /// Block the transaction was observed in
    pub block_number: u64,
}

/// One processed block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    /// Block number
    pub block_number: u64,
    /// Block hash, 0x-prefixed lowercase hex
    pub block_hash: String,
    /// Number of transactions in the block, matched or not
    pub transaction_count: u64,
}

#[derive(Debug, FromRow)]
pub(crate) struct TransactionRow {
    pub(crate) hash: String,
    pub(crate) value: String,
    pub(crate) raw_encoded: String,
    pub(crate) from_address: String,
    pub(crate) to_address: String,
    pub(crate) block_number: i64,
}

impl TryFrom<TransactionRow> for TrackedTransaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            hash: row.hash,
            value: row.value,
            raw_encoded: row.raw_encoded,
            from: row.from_address,
            to: row.to_address,
            block_number: from_column(row.block_number, "block_number")?,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct BlockRow {
    pub(crate) block_number: i64,
    pub(crate) block_hash: String,
    pub(crate) transaction_count: i64,
}

impl TryFrom<BlockRow> for BlockSummary {
    type Error = StoreError;

    fn try_from(row: BlockRow) -> Result<Self, Self::Error> {
        Ok(Self {
            block_number: from_column(row.block_number, "block_number")?,
            block_hash: row.block_hash,
            transaction_count: from_column(row.transaction_count, "transaction_count")?,
        })
    }
}

/// SQLite integers are signed 64-bit
pub(crate) fn to_column(value: u64, column: &'static str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange(column))
}

pub(crate) fn from_column(value: i64, column: &'static str) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::OutOfRange(column))
}
