//! Chainwatch driver
use std::{fmt, sync::Arc, time::Duration};

use alloy_primitives::{Address, BlockNumber, ChainId};
use config::Opts;
use extractor::{ChainClient, Extractor};
use eyre::{Result, WrapErr};
use storage::{SqliteStore, Store, WatchedAddress};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    backfill::{BackfillConfig, BackfillOutcome, DEFAULT_MAX_RETRIES, run_backfill},
    processor::BlockProcessor,
    prompt::{AssumeYes, Confirm, StdinConfirm},
    registry::{RegistrationError, load_watchlist, register_address},
    watcher::watch,
};

/// How far the recorded chain lags the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Chain id of the connected node
    pub chain_id: ChainId,
    /// Head block known to the node
    pub chain_head: BlockNumber,
    /// Highest recorded block, `None` before the first block
    pub latest_block: Option<BlockNumber>,
    /// Recorded block summaries
    pub blocks: u64,
    /// Recorded transactions
    pub transactions: u64,
    /// Watched addresses
    pub addresses: usize,
}

impl Status {
    /// Blocks between the latest recorded block and the head
    pub fn lag(&self) -> Option<u64> {
        self.latest_block.map(|latest| self.chain_head.saturating_sub(latest))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "chain id:          {}", self.chain_id)?;
        writeln!(f, "chain head:        {}", self.chain_head)?;
        match (self.latest_block, self.lag()) {
            (Some(latest), Some(lag)) => {
                writeln!(f, "latest recorded:   {latest} ({lag} behind)")?;
            }
            _ => writeln!(f, "latest recorded:   none")?,
        }
        writeln!(f, "blocks recorded:   {}", self.blocks)?;
        writeln!(f, "txs recorded:      {}", self.transactions)?;
        write!(f, "watched addresses: {}", self.addresses)
    }
}

/// Wires the chain client and the store into the `start` and `status` run modes
#[derive(Debug)]
pub struct Driver {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn Store>,
    confirm: Box<dyn Confirm>,
    backfill: BackfillConfig,
    skip_backfill: bool,
    head_timeout: Duration,
}

impl Driver {
    /// Connect to the node and open the database described by `opts`
    pub async fn new(opts: &Opts) -> Result<Self> {
        let chain = Extractor::new(opts.rpc.url.clone(), opts.rpc.timeout())
            .await
            .wrap_err_with(|| format!("Failed to connect to {}", opts.rpc.url))?;
        let store = open_store(opts).await?;

        let confirm: Box<dyn Confirm> =
            if opts.backfill.assume_yes { Box::new(AssumeYes) } else { Box::new(StdinConfirm) };
        let backfill = BackfillConfig {
            concurrency: opts.backfill.concurrency_limit(),
            max_retries: DEFAULT_MAX_RETRIES,
        };

        Ok(Self::from_parts(
            Arc::new(chain),
            Arc::new(store),
            confirm,
            backfill,
            opts.backfill.skip,
            opts.rpc.new_head_timeout(),
        ))
    }

    /// Build a driver from already-constructed parts
    pub fn from_parts(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn Store>,
        confirm: Box<dyn Confirm>,
        backfill: BackfillConfig,
        skip_backfill: bool,
        head_timeout: Duration,
    ) -> Self {
        Self { chain, store, confirm, backfill, skip_backfill, head_timeout }
    }

    /// Backfill missed blocks, then process new blocks until shutdown or a fatal error.
    ///
    /// The watchlist is read once here; addresses registered while running are picked up on
    /// the next start.
    pub async fn start(&self, shutdown: Option<broadcast::Receiver<()>>) -> Result<()> {
        let chain_id = self.chain.chain_id().await.wrap_err("Failed to get chain id")?;
        let watchlist =
            load_watchlist(self.store.as_ref()).await.wrap_err("Failed to load watched addresses")?;
        if watchlist.is_empty() {
            warn!("No watched addresses, only block summaries will be recorded");
        }
        info!(chain_id, watched = watchlist.len(), "Starting chainwatch");

        let processor = Arc::new(BlockProcessor::new(Arc::clone(&self.store), watchlist));

        if self.skip_backfill {
            info!("Backfill disabled");
        } else {
            let outcome = run_backfill(
                Arc::clone(&self.chain),
                Arc::clone(&processor),
                self.confirm.as_ref(),
                self.backfill,
            )
            .await?;
            if let BackfillOutcome::Declined { latest, head } = outcome {
                warn!(latest, head, "Continuing without backfill, missed blocks stay unrecorded");
            }
        }

        watch(self.chain.as_ref(), &processor, self.head_timeout, shutdown).await
    }

    /// Current progress against the chain head
    pub async fn status(&self) -> Result<Status> {
        let chain_id = self.chain.chain_id().await.wrap_err("Failed to get chain id")?;
        let head = self.chain.current_head().await.wrap_err("Failed to get chain head")?;
        let latest = self.store.latest_block().await?;

        Ok(Status {
            chain_id,
            chain_head: head.number,
            latest_block: latest.map(|summary| summary.block_number),
            blocks: self.store.count_blocks().await?,
            transactions: self.store.count_transactions().await?,
            addresses: self.store.all_addresses().await?.len(),
        })
    }
}

/// Open the database described by `opts`
pub async fn open_store(opts: &Opts) -> Result<SqliteStore> {
    SqliteStore::connect(&opts.database.url, opts.database.max_connections)
        .await
        .wrap_err_with(|| format!("Failed to open database {}", opts.database.url))
}

/// Register `input` as a watched address. Needs only the database.
pub async fn add_address(store: &dyn Store, input: &str) -> Result<Address, RegistrationError> {
    register_address(store, input).await
}

/// Every watched address, in registration order
pub async fn list_addresses(store: &dyn Store) -> Result<Vec<WatchedAddress>> {
    store.all_addresses().await.wrap_err("Failed to list watched addresses")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockChain, block_with, hash_of};
    use alloy_primitives::U256;
    use extractor::ChainError;
    use primitives::{headers::ChainHeader, testing};
    use storage::BlockSummary;

    const CHAIN_ID: u64 = 1;

    fn driver(chain: MockChain, store: Arc<SqliteStore>, skip_backfill: bool) -> Driver {
        Driver::from_parts(
            Arc::new(chain),
            store,
            Box::new(AssumeYes),
            BackfillConfig { concurrency: Some(4), max_retries: 0 },
            skip_backfill,
            Duration::from_secs(30),
        )
    }

    async fn seeded_store(latest: u64) -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let summary = BlockSummary {
            block_number: latest,
            block_hash: hash_of(latest).to_string(),
            transaction_count: 0,
        };
        store.create_block(&summary).await.unwrap();
        store
    }

    #[tokio::test]
    async fn start_backfills_then_watches() {
        let alice = testing::signer(1);
        let store = seeded_store(100).await;
        let input = alice.address().to_string().to_lowercase();
        let watched = add_address(store.as_ref(), &input).await.unwrap();

        let backfilled = testing::eip1559_tx(&alice, CHAIN_ID, 0, Some(Address::ZERO), U256::from(1));
        let live = testing::eip1559_tx(&alice, CHAIN_ID, 1, Some(Address::ZERO), U256::from(2));
        let chain = MockChain::new(CHAIN_ID, 102)
            .with_empty_blocks(101..=103)
            .with_block(block_with(101, vec![backfilled.clone()]))
            .with_block(block_with(103, vec![live.clone()]))
            .with_heads(vec![
                Ok(ChainHeader { number: 103, hash: hash_of(103) }),
                Err(ChainError::SubscriptionClosed),
            ]);

        let err = driver(chain, store.clone(), false).start(None).await.unwrap_err();
        assert!(err.to_string().contains("subscription"), "{err:?}");

        let recorded = store.all_transactions().await.unwrap();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].hash, backfilled.tx_hash().to_string());
        assert_eq!(recorded[1].hash, live.tx_hash().to_string());
        assert!(recorded.iter().all(|tx| tx.from == primitives::watchlist::canonical(&watched)));
        assert_eq!(store.latest_block().await.unwrap().unwrap().block_number, 103);
        assert_eq!(store.count_blocks().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn skip_backfill_goes_straight_to_watching() {
        let store = seeded_store(10).await;
        let chain = MockChain::new(CHAIN_ID, 20)
            .with_empty_blocks(11..=20)
            .with_heads(vec![Err(ChainError::SubscriptionClosed)]);

        let _ = driver(chain, store.clone(), true).start(None).await.unwrap_err();

        assert_eq!(store.count_blocks().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn status_reports_lag() {
        let store = seeded_store(90).await;
        let chain = MockChain::new(CHAIN_ID, 100);

        let status = driver(chain, store, true).status().await.unwrap();

        assert_eq!(status.latest_block, Some(90));
        assert_eq!(status.lag(), Some(10));
        assert_eq!(status.blocks, 1);
        assert!(status.to_string().contains("90 (10 behind)"));
    }
}
