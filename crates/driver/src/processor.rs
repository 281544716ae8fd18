//! Per-block filtering and persistence
use std::sync::Arc;

use alloy_consensus::{Transaction, TxEnvelope};
use primitives::{
    headers::ChainBlock,
    sender::recover_sender,
    watchlist::{Watchlist, canonical},
};
use storage::{BlockSummary, Store, StoreError, TrackedTransaction};
use tracing::{debug, error, info, warn};

/// What happened to a single transaction of a processed block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// Neither sender nor recipient is watched
    Unmatched,
    /// Persisted as a tracked transaction
    Recorded,
    /// Already persisted by an earlier run
    Duplicate,
    /// Matched, but could not be encoded or stored
    Failed,
}

/// Tally of a processed block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockOutcome {
    /// Transactions that touched a watched address
    pub matched: usize,
    /// Newly recorded transactions
    pub recorded: usize,
    /// Matched transactions that were already recorded
    pub duplicates: usize,
    /// Matched transactions that could not be recorded
    pub failed: usize,
    /// Whether a summary for this block number already existed
    pub summary_existed: bool,
}

impl BlockOutcome {
    fn count(&mut self, outcome: TxOutcome) {
        match outcome {
            TxOutcome::Unmatched => return,
            TxOutcome::Recorded => self.recorded += 1,
            TxOutcome::Duplicate => self.duplicates += 1,
            TxOutcome::Failed => self.failed += 1,
        }
        self.matched += 1;
    }
}

/// Filters block transactions against the watchlist and persists matches and a block summary
#[derive(Debug, Clone)]
pub struct BlockProcessor {
    store: Arc<dyn Store>,
    watchlist: Watchlist,
}

impl BlockProcessor {
    /// Create a processor with a fixed watchlist snapshot
    pub fn new(store: Arc<dyn Store>, watchlist: Watchlist) -> Self {
        Self { store, watchlist }
    }

    /// Backing store
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Watched addresses this processor filters on
    pub const fn watchlist(&self) -> &Watchlist {
        &self.watchlist
    }

    /// Record every watched transaction of `block`, then its summary.
    ///
    /// Per-transaction failures are logged and skipped. The only error returned is a store
    /// failure other than a uniqueness violation while writing the summary.
    pub async fn process_block(&self, block: &ChainBlock) -> Result<BlockOutcome, StoreError> {
        let mut outcome = BlockOutcome::default();

        for tx in &block.transactions {
            let result = self.process_transaction(block, tx).await;
            outcome.count(result);
        }

        let summary = BlockSummary {
            block_number: block.number,
            block_hash: block.hash.to_string(),
            transaction_count: block.transaction_count() as u64,
        };

        match self.store.create_block(&summary).await {
            Ok(()) => {}
            Err(e) if e.is_constraint_violation() => {
                warn!(
                    block_number = block.number,
                    block_hash = %block.hash,
                    "Block already recorded, keeping existing summary"
                );
                outcome.summary_existed = true;
            }
            Err(e) => return Err(e),
        }

        debug!(
            block_number = block.number,
            transactions = summary.transaction_count,
            matched = outcome.matched,
            recorded = outcome.recorded,
            "Processed block"
        );
        Ok(outcome)
    }

    async fn process_transaction(&self, block: &ChainBlock, tx: &TxEnvelope) -> TxOutcome {
        let hash = tx.tx_hash();

        let from = match recover_sender(tx) {
            Ok(sender) => Some(sender),
            Err(e) => {
                warn!(tx_hash = %hash, block_number = block.number, err = %e, "Failed to recover sender");
                None
            }
        };
        let to = tx.to();

        if !self.watchlist.matches(from.as_ref(), to.as_ref()) {
            return TxOutcome::Unmatched;
        }

        let raw_encoded = match serde_json::to_string(tx) {
            Ok(raw) => raw,
            Err(e) => {
                error!(tx_hash = %hash, err = %e, "Failed to encode transaction");
                return TxOutcome::Failed;
            }
        };

        let record = TrackedTransaction {
            hash: hash.to_string(),
            value: tx.value().to_string(),
            raw_encoded,
            from: from.as_ref().map(canonical).unwrap_or_default(),
            to: to.as_ref().map(canonical).unwrap_or_default(),
            block_number: block.number,
        };

        match self.store.create_transaction(&record).await {
            Ok(()) => {
                info!(
                    tx_hash = %record.hash,
                    block_number = block.number,
                    from = %record.from,
                    to = %record.to,
                    value = %record.value,
                    "Recorded transaction"
                );
                TxOutcome::Recorded
            }
            Err(e) if e.is_constraint_violation() => {
                warn!(tx_hash = %record.hash, "Transaction already recorded");
                TxOutcome::Duplicate
            }
            Err(e) => {
                error!(tx_hash = %record.hash, err = %e, "Failed to store transaction");
                TxOutcome::Failed
            }
        }
    }
}
