//! 🎬 *[a channel fills with sample batches. somewhere, a sink waits.]*
//! *[the clock on the wall reads 2:47am. the target reads 23,000,000,000.]*
//!
//! 🗑️ The SinkWorker — patient, tireless, deeply unbothered by the chaos upstream.
//! It receives batches. It hands every sample to the `BulkBatcher`. It asks no questions.
//! When the channel closes it finishes the batcher (final flush, close) and reports totals.
//!
//! There is exactly one of these. The batcher's buffer has exactly one owner.
//! That's the whole concurrency story for the buffer, and we like it that way. 🦆

use anyhow::{Context, Result};
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Worker;
use crate::app_config::WriteMode;
use crate::backends::IndexBackend;
use crate::batcher::{BatcherTotals, BulkBatcher};
use crate::common::SampleBatch;
use crate::progress::ProgressMetrics;

#[derive(Debug)]
pub(crate) struct SinkWorker<B: IndexBackend + 'static> {
    rx: Receiver<SampleBatch>,
    batcher: BulkBatcher<B>,
    write_mode: WriteMode,
    progress: ProgressMetrics,
}

impl<B: IndexBackend + 'static> SinkWorker<B> {
    pub(crate) fn new(
        rx: Receiver<SampleBatch>,
        batcher: BulkBatcher<B>,
        write_mode: WriteMode,
        progress: ProgressMetrics,
    ) -> Self {
        Self {
            rx,
            batcher,
            write_mode,
            progress,
        }
    }

    async fn sink(&mut self, batch: SampleBatch) -> Result<()> {
        for sample in &batch.samples {
            match self.write_mode {
                WriteMode::Bulk => {
                    if let Some(stats) = self.batcher.add(sample).await? {
                        debug!("🚚 flushed: {}", stats);
                    }
                }
                WriteMode::Single => self.batcher.write_single(sample).await?,
            }
        }
        self.progress.update(self.batcher.totals());
        Ok(())
    }
}

impl<B: IndexBackend + 'static> Worker for SinkWorker<B> {
    type Output = BatcherTotals;

    fn start(mut self) -> JoinHandle<Result<BatcherTotals>> {
        tokio::spawn(async move {
            debug!("📥 SinkWorker started draining channel...");
            while let Ok(batch) = self.rx.recv().await {
                if let Err(err) = self.sink(batch).await {
                    // -- 🚪 hang up first so the generators stop talking to a dead line
                    self.rx.close();
                    self.progress.finish();
                    if let Err(close_err) = self.batcher.close().await {
                        warn!("⚠️ closing the backend after a failure also failed: {:#}", close_err);
                    }
                    return Err(err.context("💀 SinkWorker gave up on the current batch"));
                }
            }
            debug!("🏁 SinkWorker: channel closed, finishing the batcher");
            self.batcher
                .finish()
                .await
                .context("💀 SinkWorker failed to finish the batcher")?;
            self.progress.update(self.batcher.totals());
            self.progress.finish();
            Ok(self.batcher.totals())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemorySink;
    use crate::batcher::BatcherConfig;
    use crate::common::Sample;
    use crate::stats::StatsLog;

    fn batch_of(count: usize, value_len: usize) -> SampleBatch {
        let mut batch = SampleBatch::with_capacity(count);
        for i in 0..count {
            batch.samples.push(Sample::new(
                "xyabcd-0001".to_string(),
                1,
                format!("col{i}"),
                "v".repeat(value_len),
            ));
        }
        batch
    }

    async fn worker_for(
        sink: InMemorySink,
        dir: &tempfile::TempDir,
        write_mode: WriteMode,
        config: BatcherConfig,
    ) -> Result<(SinkWorker<InMemorySink>, async_channel::Sender<SampleBatch>)> {
        let (tx, rx) = async_channel::bounded(4);
        let stats_log = StatsLog::open(&dir.path().join("writeoutput.csv")).await?;
        let batcher = BulkBatcher::new(sink, stats_log, config);
        let progress = ProgressMetrics::new("InMemory".to_string(), 100, false);
        Ok((SinkWorker::new(rx, batcher, write_mode, progress), tx))
    }

    #[tokio::test]
    async fn the_one_where_the_channel_closes_and_leftovers_get_flushed() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sink = InMemorySink::new(true);
        let ledger = sink.ledger();
        let (worker, tx) = worker_for(sink, &dir, WriteMode::Bulk, BatcherConfig::default()).await?;

        let handle = worker.start();
        tx.send(batch_of(3, 10)).await?;
        tx.send(batch_of(2, 10)).await?;
        drop(tx);

        let totals = handle.await??;
        assert_eq!(totals.documents_added, 5);
        assert_eq!(totals.flushes, 1);
        assert_eq!(ledger.lock().await.bulk_document_count, 5);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_single_mode_never_touches_bulk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sink = InMemorySink::new(true);
        let ledger = sink.ledger();
        let (worker, tx) =
            worker_for(sink, &dir, WriteMode::Single, BatcherConfig::default()).await?;

        let handle = worker.start();
        tx.send(batch_of(4, 10)).await?;
        drop(tx);

        let totals = handle.await??;
        assert_eq!(totals.single_writes, 4);
        assert_eq!(totals.flushes, 0);
        let ledger = ledger.lock().await;
        assert_eq!(ledger.single_writes.len(), 4);
        assert!(ledger.bulk_requests.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_sink_quits_and_hangs_up_the_phone() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = BatcherConfig {
            flush_threshold_bytes: 1,
            max_consecutive_bulk_errors: Some(1),
            ..BatcherConfig::default()
        };
        let sink = InMemorySink::failing();
        let ledger = sink.ledger();
        let (worker, tx) = worker_for(sink, &dir, WriteMode::Bulk, config).await?;

        let handle = worker.start();
        tx.send(batch_of(1, 10)).await?;

        assert!(handle.await?.is_err());
        assert!(tx.send(batch_of(1, 10)).await.is_err());
        // -- 🚪 even a failed run closes the backend
        assert_eq!(ledger.lock().await.close_count, 1);
        Ok(())
    }
}
