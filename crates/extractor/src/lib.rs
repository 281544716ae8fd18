//! Chainwatch Extractor
//!
//! [`ChainClient`] is the chain capability consumed by the ingestion engine. [`Extractor`]
//! implements it on top of an alloy WebSocket provider.
pub mod retries;

use std::{future::IntoFuture, pin::Pin, time::Duration};

use alloy::{
    primitives::{BlockHash, BlockNumber, ChainId},
    providers::{
        Provider, ProviderBuilder, RootProvider, fillers::FillProvider,
        utils::JoinedRecommendedFillers,
    },
    transports::{TransportError, TransportResult},
};
use alloy_rpc_client::ClientBuilder;
use alloy_rpc_types_eth::{BlockNumberOrTag, BlockTransactions};
use async_trait::async_trait;
use derive_more::Debug;
use eyre::Result;
use futures::{Stream, StreamExt, stream};
use primitives::headers::{ChainBlock, ChainHeader};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::retries::{DEFAULT_RETRY_LAYER, RetryWsConnect};

/// Alias to the default provider with all recommended fillers (read-only).
pub type DefaultProvider = FillProvider<JoinedRecommendedFillers, RootProvider>;

/// Stream of new block headers. Yields an error, then ends, when the subscription breaks.
pub type HeaderStream = Pin<Box<dyn Stream<Item = Result<ChainHeader, ChainError>> + Send>>;

/// Errors returned by a [`ChainClient`]
#[derive(Debug, Error)]
pub enum ChainError {
    /// The request did not complete in time
    #[error("{method} timed out after {timeout:?}")]
    Timeout {
        /// RPC method
        method: &'static str,
        /// Timeout that expired
        timeout: Duration,
    },
    /// The node does not know the requested block
    #[error("block {0} not found")]
    BlockNotFound(String),
    /// The node answered a full-block request with transaction hashes only
    #[error("block {0} returned without transaction bodies")]
    MissingBodies(BlockNumber),
    /// The new-head subscription ended
    #[error("new-head subscription closed")]
    SubscriptionClosed,
    /// Transport or JSON-RPC failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ChainError {
    /// Whether repeating the same request may succeed
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::BlockNotFound(_) | Self::Transport(_))
    }
}

/// Chain capability consumed by the ingestion engine
#[async_trait]
pub trait ChainClient: Send + Sync + std::fmt::Debug {
    /// Chain id of the connected network
    async fn chain_id(&self) -> Result<ChainId, ChainError>;

    /// Header of the most recent block known to the node
    async fn current_head(&self) -> Result<ChainHeader, ChainError>;

    /// Full block by number
    async fn block_by_number(&self, number: BlockNumber) -> Result<ChainBlock, ChainError>;

    /// Full block by hash
    async fn block_by_hash(&self, hash: BlockHash) -> Result<ChainBlock, ChainError>;

    /// Subscribe to new block headers
    async fn subscribe_new_heads(&self) -> Result<HeaderStream, ChainError>;
}

/// Extractor client
#[derive(Debug)]
pub struct Extractor {
    #[debug(skip)]
    provider: DefaultProvider,
    rpc_timeout: Duration,
}

impl Extractor {
    /// Connect to a WebSocket RPC endpoint. Every request is bounded by `rpc_timeout`.
    pub async fn new(rpc_url: Url, rpc_timeout: Duration) -> Result<Self> {
        let ws = RetryWsConnect::from_url(rpc_url);
        let client = ClientBuilder::default().layer(DEFAULT_RETRY_LAYER).pubsub(ws).await?;
        let provider = ProviderBuilder::new().connect_client(client);

        Ok(Self { provider, rpc_timeout })
    }

    async fn timed<F, T>(&self, method: &'static str, request: F) -> Result<T, ChainError>
    where
        F: IntoFuture<Output = TransportResult<T>>,
    {
        match tokio::time::timeout(self.rpc_timeout, request).await {
            Ok(result) => result.map_err(ChainError::from),
            Err(_) => Err(ChainError::Timeout { method, timeout: self.rpc_timeout }),
        }
    }
}

#[async_trait]
impl ChainClient for Extractor {
    async fn chain_id(&self) -> Result<ChainId, ChainError> {
        self.timed("eth_chainId", self.provider.get_chain_id()).await
    }

    async fn current_head(&self) -> Result<ChainHeader, ChainError> {
        let block = self
            .timed(
                "eth_getBlockByNumber",
                self.provider.get_block_by_number(BlockNumberOrTag::Latest),
            )
            .await?
            .ok_or_else(|| ChainError::BlockNotFound("latest".to_owned()))?;

        Ok(ChainHeader { number: block.header.number, hash: block.header.hash })
    }

    async fn block_by_number(&self, number: BlockNumber) -> Result<ChainBlock, ChainError> {
        let request = self.provider.get_block_by_number(BlockNumberOrTag::Number(number)).full();
        let block = self
            .timed("eth_getBlockByNumber", request)
            .await?
            .ok_or_else(|| ChainError::BlockNotFound(number.to_string()))?;

        into_chain_block(block)
    }

    async fn block_by_hash(&self, hash: BlockHash) -> Result<ChainBlock, ChainError> {
        let request = self.provider.get_block_by_hash(hash).full();
        let block = self
            .timed("eth_getBlockByHash", request)
            .await?
            .ok_or_else(|| ChainError::BlockNotFound(hash.to_string()))?;

        into_chain_block(block)
    }

    async fn subscribe_new_heads(&self) -> Result<HeaderStream, ChainError> {
        let subscription = self.timed("eth_subscribe", self.provider.subscribe_blocks()).await?;
        info!("Subscribed to new block headers");

        let heads = subscription
            .into_stream()
            .map(|header| Ok(ChainHeader { number: header.number, hash: header.hash }));
        let closed = stream::once(async {
            warn!("New block header stream ended");
            Err(ChainError::SubscriptionClosed)
        });

        Ok(Box::pin(heads.chain(closed)))
    }
}

/// Convert a full RPC block into a [`ChainBlock`].
///
/// Nodes may encode an empty transaction list as hashes; any non-empty hash list means the
/// bodies are missing.
fn into_chain_block(block: alloy_rpc_types_eth::Block) -> Result<ChainBlock, ChainError> {
    let number = block.header.number;
    let hash = block.header.hash;

    let transactions = match block.transactions {
        BlockTransactions::Full(txs) => txs.into_iter().map(|tx| tx.inner.into_inner()).collect(),
        BlockTransactions::Hashes(hashes) if hashes.is_empty() => Vec::new(),
        _ => return Err(ChainError::MissingBodies(number)),
    };

    Ok(ChainBlock { number, hash, transactions })
}
