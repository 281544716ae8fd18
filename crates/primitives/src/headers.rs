//! Block header and block body types delivered by the chain client.
use alloy_consensus::TxEnvelope;
use alloy_primitives::{BlockHash, BlockNumber};

/// Header announced by a new-head subscription or the latest-block query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHeader {
    /// Block number
    pub number: BlockNumber,
    /// Block hash
    pub hash: BlockHash,
}

/// Full block body with its signed transactions, in block order
#[derive(Debug, Clone)]
pub struct ChainBlock {
    /// Block number
    pub number: BlockNumber,
    /// Block hash
    pub hash: BlockHash,
    /// Signed transactions
    pub transactions: Vec<TxEnvelope>,
}

impl ChainBlock {
    /// Number of transactions in the block, matched or not
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}
