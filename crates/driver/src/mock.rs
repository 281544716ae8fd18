//! Scripted [`ChainClient`] and fixtures shared by the driver tests
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use alloy_consensus::TxEnvelope;
use alloy_primitives::{Address, B256, BlockHash, BlockNumber, ChainId};
use async_trait::async_trait;
use extractor::{ChainClient, ChainError, HeaderStream};
use futures::{StreamExt, stream};
use primitives::{
    headers::{ChainBlock, ChainHeader},
    watchlist::Watchlist,
};

/// Block with a hash derived from its number
pub(crate) fn block_with(number: BlockNumber, transactions: Vec<TxEnvelope>) -> ChainBlock {
    ChainBlock { number, hash: hash_of(number), transactions }
}

pub(crate) fn hash_of(number: BlockNumber) -> BlockHash {
    B256::left_padding_from(&number.to_be_bytes())
}

pub(crate) fn watchlist_of(addresses: &[Address]) -> Watchlist {
    addresses.iter().copied().collect()
}

#[derive(Debug, Default)]
pub(crate) struct MockChain {
    chain_id: ChainId,
    heads_by_poll: Mutex<VecDeque<BlockNumber>>,
    blocks: HashMap<BlockNumber, ChainBlock>,
    failing: HashSet<BlockNumber>,
    heads: Mutex<Option<Vec<Result<ChainHeader, ChainError>>>>,
    fetch_delay: Duration,
    fetched: Mutex<Vec<BlockNumber>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockChain {
    pub(crate) fn new(chain_id: ChainId, head: BlockNumber) -> Self {
        Self { chain_id, heads_by_poll: Mutex::new(VecDeque::from([head])), ..Default::default() }
    }

    /// Later `current_head` calls return these heads in order, the last one repeating
    pub(crate) fn with_head_progression(self, heads: &[BlockNumber]) -> Self {
        self.heads_by_poll.lock().unwrap().extend(heads);
        self
    }

    /// Serve `block` by number and hash
    pub(crate) fn with_block(mut self, block: ChainBlock) -> Self {
        self.blocks.insert(block.number, block);
        self
    }

    /// Serve empty blocks for every number in `range`
    pub(crate) fn with_empty_blocks(mut self, range: std::ops::RangeInclusive<BlockNumber>) -> Self {
        for number in range {
            self.blocks.entry(number).or_insert_with(|| block_with(number, Vec::new()));
        }
        self
    }

    /// Every fetch of `number` fails with a transport-level error
    pub(crate) fn failing_at(mut self, number: BlockNumber) -> Self {
        self.failing.insert(number);
        self
    }

    /// Items yielded by the new-head subscription; the stream stays open afterwards
    pub(crate) fn with_heads(self, heads: Vec<Result<ChainHeader, ChainError>>) -> Self {
        *self.heads.lock().unwrap() = Some(heads);
        self
    }

    pub(crate) fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Block numbers requested by number, in request order
    pub(crate) fn fetched(&self) -> Vec<BlockNumber> {
        self.fetched.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lookup(&self, number: BlockNumber) -> Result<ChainBlock, ChainError> {
        if self.failing.contains(&number) {
            return Err(ChainError::Timeout {
                method: "eth_getBlockByNumber",
                timeout: Duration::from_millis(1),
            });
        }
        self.blocks.get(&number).cloned().ok_or_else(|| ChainError::BlockNotFound(number.to_string()))
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<ChainId, ChainError> {
        Ok(self.chain_id)
    }

    async fn current_head(&self) -> Result<ChainHeader, ChainError> {
        let mut heads = self.heads_by_poll.lock().unwrap();
        let number = if heads.len() > 1 { heads.pop_front() } else { heads.front().copied() };
        let number = number.unwrap_or_default();
        Ok(ChainHeader { number, hash: hash_of(number) })
    }

    async fn block_by_number(&self, number: BlockNumber) -> Result<ChainBlock, ChainError> {
        self.fetched.lock().unwrap().push(number);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.lookup(number)
    }

    async fn block_by_hash(&self, hash: BlockHash) -> Result<ChainBlock, ChainError> {
        self.blocks
            .values()
            .find(|block| block.hash == hash)
            .cloned()
            .ok_or_else(|| ChainError::BlockNotFound(hash.to_string()))
    }

    async fn subscribe_new_heads(&self) -> Result<HeaderStream, ChainError> {
        let heads = self.heads.lock().unwrap().take().unwrap_or_default();
        Ok(Box::pin(stream::iter(heads).chain(stream::pending())))
    }
}
