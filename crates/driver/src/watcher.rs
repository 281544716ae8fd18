//! Live processing of new blocks
use std::time::Duration;

use extractor::ChainClient;
use eyre::{Result, WrapErr, eyre};
use futures::StreamExt;
use tokio::sync::broadcast;
use tracing::info;

use crate::processor::BlockProcessor;

/// Process every new block announced by the chain, one at a time, in arrival order.
///
/// Returns `Ok` only on shutdown. A broken subscription, a failed block fetch, a store
/// failure while recording a block summary, or no announcement within `head_timeout` ends
/// the watch with an error.
pub async fn watch(
    client: &dyn ChainClient,
    processor: &BlockProcessor,
    head_timeout: Duration,
    mut shutdown: Option<broadcast::Receiver<()>>,
) -> Result<()> {
    let mut heads =
        client.subscribe_new_heads().await.wrap_err("Failed to subscribe to new blocks")?;
    info!(watched = processor.watchlist().len(), "Watching new blocks");

    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => {
                info!("Shutdown requested, stopping block watcher");
                return Ok(());
            }
            next = tokio::time::timeout(head_timeout, heads.next()) => {
                let header = match next {
                    Ok(Some(Ok(header))) => header,
                    Ok(Some(Err(e))) => return Err(e).wrap_err("New block subscription failed"),
                    Ok(None) => return Err(eyre!("New block subscription ended")),
                    Err(_) => {
                        return Err(eyre!("No new block announced within {head_timeout:?}"));
                    }
                };

                let block = client
                    .block_by_hash(header.hash)
                    .await
                    .wrap_err_with(|| format!("Failed to fetch block {} ({})", header.number, header.hash))?;

                let outcome = processor
                    .process_block(&block)
                    .await
                    .wrap_err_with(|| format!("Failed to record block {}", block.number))?;

                info!(
                    block_number = block.number,
                    block_hash = %block.hash,
                    transactions = block.transaction_count(),
                    recorded = outcome.recorded,
                    "Processed new block"
                );
            }
        }
    }
}

async fn shutdown_requested(shutdown: &mut Option<broadcast::Receiver<()>>) {
    match shutdown {
        Some(rx) => {
            let _ = rx.recv().await;
        }
        None => std::future::pending().await,
    }
}
