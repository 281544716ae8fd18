//! Catch-up of blocks missed while the process was down
use std::{ops::RangeInclusive, panic::AssertUnwindSafe, sync::Arc};

use alloy_primitives::BlockNumber;
use extractor::{ChainClient, ChainError, retries::retry_with_backoff_if};
use eyre::{Result, WrapErr};
use futures::FutureExt;
use tokio::{sync::Mutex, task::JoinSet};
use tracing::{error, info, warn};

use crate::{
    processor::{BlockOutcome, BlockProcessor},
    prompt::Confirm,
};

/// Extra attempts for a block whose fetch failed transiently
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Head re-reads after a confirmed backfill before handing over to the watcher
const CATCH_UP_PASSES: usize = 5;

/// Backfill tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillConfig {
    /// Maximum blocks fetched and processed at once, `None` for no limit
    pub concurrency: Option<usize>,
    /// Extra attempts per block on transient chain errors
    pub max_retries: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self { concurrency: Some(16), max_retries: DEFAULT_MAX_RETRIES }
    }
}

/// Result of a backfill run over `start..=end`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    /// First block of the range
    pub start: BlockNumber,
    /// Last block of the range
    pub end: BlockNumber,
    /// Blocks fetched and processed
    pub processed: u64,
    /// Blocks that could not be backfilled, ascending
    pub failed: Vec<BlockNumber>,
}

/// How a startup backfill check ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackfillOutcome {
    /// No block has been recorded yet
    EmptyStore,
    /// The latest recorded block is at or past the chain head
    UpToDate {
        /// Latest recorded block
        latest: BlockNumber,
    },
    /// The operator declined the backfill
    Declined {
        /// Latest recorded block
        latest: BlockNumber,
        /// Chain head
        head: BlockNumber,
    },
    /// The missed range was backfilled
    Completed(BackfillReport),
}

/// Compare the latest recorded block with the chain head and, once confirmed, process every
/// block in between.
///
/// Blocks produced while the backfill runs are caught up without asking again, so the
/// watcher starts close to the head. Failure to read the head or the latest recorded block is
/// fatal. Individual block failures are only reported.
pub async fn run_backfill(
    client: Arc<dyn ChainClient>,
    processor: Arc<BlockProcessor>,
    confirm: &dyn Confirm,
    config: BackfillConfig,
) -> Result<BackfillOutcome> {
    let head = client.current_head().await.wrap_err("Failed to get chain head")?;
    let latest = processor
        .store()
        .latest_block()
        .await
        .wrap_err("Failed to get latest recorded block")?;

    let Some(latest) = latest.map(|summary| summary.block_number) else {
        info!(head = head.number, "No block recorded yet, skipping backfill");
        return Ok(BackfillOutcome::EmptyStore);
    };

    if latest >= head.number {
        info!(latest, head = head.number, "Database is up to date");
        return Ok(BackfillOutcome::UpToDate { latest });
    }

    let start = latest + 1;
    let gap = head.number - latest;
    warn!(latest, head = head.number, gap, "Database is behind the chain head");

    let question = format!("Backfill {gap} missed blocks ({start}..={})? [y/N]", head.number);
    if !confirm.confirm(&question).await? {
        info!(latest, head = head.number, "Backfill declined");
        return Ok(BackfillOutcome::Declined { latest, head: head.number });
    }

    let mut report =
        backfill_range(Arc::clone(&client), Arc::clone(&processor), start, head.number, config)
            .await;
    for pass in 1..=CATCH_UP_PASSES {
        let head = client.current_head().await.wrap_err("Failed to get chain head")?;
        if head.number <= report.end {
            break;
        }
        let from = report.end + 1;
        info!(from, head = head.number, "Catching up blocks produced during backfill");
        let more = backfill_range(
            Arc::clone(&client),
            Arc::clone(&processor),
            from,
            head.number,
            config,
        )
        .await;
        report.end = more.end;
        report.processed += more.processed;
        report.failed.extend(more.failed);
        if pass == CATCH_UP_PASSES {
            warn!(end = report.end, "Stopped catching up before reaching the head");
        }
    }

    if report.failed.is_empty() {
        info!(start, end = report.end, processed = report.processed, "Backfill complete");
    } else {
        error!(
            start,
            end = report.end,
            processed = report.processed,
            failed = report.failed.len(),
            failed_blocks = ?report.failed,
            "Backfill finished with failed blocks"
        );
    }
    Ok(BackfillOutcome::Completed(report))
}

/// Fetch and process every block in `start..=end` with a fixed pool of workers, bounded by
/// `config.concurrency`.
pub async fn backfill_range(
    client: Arc<dyn ChainClient>,
    processor: Arc<BlockProcessor>,
    start: BlockNumber,
    end: BlockNumber,
    config: BackfillConfig,
) -> BackfillReport {
    if start > end {
        return BackfillReport { start, end, processed: 0, failed: Vec::new() };
    }

    let total = end - start + 1;
    let workers = config.concurrency.map_or(total, |limit| (limit.max(1) as u64).min(total));
    let queue: Arc<Mutex<RangeInclusive<BlockNumber>>> = Arc::new(Mutex::new(start..=end));
    let mut tasks = JoinSet::new();

    info!(start, end, workers, "Starting backfill");

    for _ in 0..workers {
        let client = Arc::clone(&client);
        let processor = Arc::clone(&processor);
        let queue = Arc::clone(&queue);

        tasks.spawn(async move {
            let mut processed = 0;
            let mut failed = Vec::new();
            loop {
                let Some(number) = queue.lock().await.next() else { break };
                let result = AssertUnwindSafe(backfill_block(
                    client.as_ref(),
                    &processor,
                    number,
                    config.max_retries,
                ))
                .catch_unwind()
                .await;
                match result {
                    Ok(Ok(outcome)) => {
                        processed += 1;
                        if outcome.recorded > 0 {
                            let recorded = outcome.recorded;
                            info!(block_number = number, recorded, "Backfilled block");
                        }
                    }
                    Ok(Err(e)) => {
                        error!(block_number = number, err = %e, "Failed to backfill block");
                        failed.push(number);
                    }
                    Err(_) => {
                        error!(block_number = number, "Backfill of block panicked");
                        failed.push(number);
                    }
                }
            }
            (processed, failed)
        });
    }

    let mut processed = 0;
    let mut failed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((worker_processed, worker_failed)) => {
                processed += worker_processed;
                failed.extend(worker_failed);
            }
            Err(e) => error!(err = %e, "Backfill worker stopped"),
        }
    }
    failed.sort_unstable();

    BackfillReport { start, end, processed, failed }
}

async fn backfill_block(
    client: &dyn ChainClient,
    processor: &BlockProcessor,
    number: BlockNumber,
    max_retries: usize,
) -> Result<BlockOutcome> {
    let block =
        retry_with_backoff_if(|| client.block_by_number(number), ChainError::is_transient, max_retries)
            .await
            .wrap_err_with(|| format!("Failed to fetch block {number}"))?;

    processor
        .process_block(&block)
        .await
        .wrap_err_with(|| format!("Failed to record block {number}"))
}
