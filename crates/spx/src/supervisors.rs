//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where workers toil endlessly..."
//! 🎬 "One supervisor dared to manage them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor wires the pipeline together, starts every worker, and waits.
//! Part middle manager, part helicopter parent.
//!
//! ⚠️ DO NOT MAKE THE WORKERS PUB EVER
//! 💀 WORKERS ARE THE SUPERVISOR'S PRIVATE LITTLE MINIONS WHOM THE WORLD FORGOT ABOUT

mod workers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::app_config::AppConfig;
use crate::backends::IndexBackend;
use crate::batcher::{BatcherConfig, BatcherTotals, BulkBatcher};
use crate::budget::WriteBudget;
use crate::progress::ProgressMetrics;
use crate::row_count::RowCountBackend;
use crate::stats::StatsLog;
use workers::{DescriptorWorker, GeneratorWorker, SinkWorker, Worker};

/// 📊 What a run accomplished. Returned by `spx::run`, printed by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub passes: u32,
    pub descriptors_read: u64,
    pub samples_generated: u64,
    pub totals: BatcherTotals,
    pub elapsed: Duration,
}

/// 📦 The Supervisor: because even async tasks need someone hovering over them
/// asking "is it done yet?" every 5 milliseconds.
pub(crate) struct Supervisor {
    app_config: AppConfig,
}

impl Supervisor {
    pub(crate) fn new(app_config: AppConfig) -> Self {
        Self { app_config }
    }

    /// 🧵 Unleash the workers against `backend`, and wait for every last one of them.
    ///
    /// Every worker is joined before returning, even when one fails, so the final
    /// flush and stats line always happen if the sink is still standing.
    pub(crate) async fn start_workers<B: IndexBackend + 'static>(
        &self,
        backend: B,
        sink_name: String,
    ) -> Result<RunSummary> {
        let started = Instant::now();
        let runtime = &self.app_config.runtime;

        let oracle = Arc::new(
            RowCountBackend::from_config(&self.app_config.row_count.oracle)
                .context("💀 Could not build the row count oracle")?,
        );
        let stats_log = StatsLog::open(&runtime.stats_log).await?;
        let batcher = BulkBatcher::new(
            backend,
            stats_log,
            BatcherConfig {
                flush_threshold_bytes: self
                    .app_config
                    .sink
                    .common_config()
                    .flush_threshold_bytes,
                flush_on_finish: runtime.flush_on_finish,
                max_consecutive_bulk_errors: runtime.max_consecutive_bulk_errors,
            },
        );
        let budget = Arc::new(WriteBudget::new(runtime.target_total_writes));

        let queue_capacity = runtime.queue_capacity.max(1);
        let (descriptor_tx, descriptor_rx) = async_channel::bounded(queue_capacity);
        let (batch_tx, batch_rx) = async_channel::bounded(queue_capacity);
        // -- 🧾 generators tick this per descriptor so the reader can spot a pass of nothing
        let (processed_tx, processed_rx) = watch::channel(0u64);
        let processed_tx = Arc::new(processed_tx);

        let parallelism = runtime.generator_parallelism.max(1);
        info!(
            "🚀 starting {} generator worker(s) toward {} writes into {}",
            parallelism, runtime.target_total_writes, sink_name
        );

        let progress = ProgressMetrics::new(sink_name, runtime.target_total_writes, runtime.progress);
        let sink_handle = SinkWorker::new(batch_rx, batcher, runtime.write_mode, progress).start();

        let generator_handles: Vec<_> = (0..parallelism)
            .map(|id| {
                GeneratorWorker::new(
                    id,
                    self.app_config.generator.clone(),
                    self.app_config.row_count.default_row_count,
                    runtime.chunk_size,
                    Arc::clone(&oracle),
                    Arc::clone(&budget),
                    descriptor_rx.clone(),
                    batch_tx.clone(),
                    Arc::clone(&processed_tx),
                )
                .start()
            })
            .collect();
        // -- 🚪 the workers hold the only live ends now; when they go, the channels close
        drop(descriptor_rx);
        drop(batch_tx);
        drop(processed_tx);

        let descriptor_handle = DescriptorWorker::new(
            runtime.input_file.clone(),
            runtime.max_passes,
            Arc::clone(&budget),
            descriptor_tx,
            processed_rx,
        )
        .start();

        let descriptor_result = descriptor_handle
            .await
            .context("💀 DescriptorWorker panicked")?;
        let generator_results = futures::future::join_all(generator_handles).await;
        let sink_result = sink_handle.await.context("💀 SinkWorker panicked")?;

        let tally = descriptor_result?;
        let mut samples_generated = 0u64;
        for result in generator_results {
            samples_generated += result.context("💀 GeneratorWorker panicked")??;
        }
        let totals = sink_result?;

        if tally.descriptors == 0 {
            warn!("⚠️ not a single descriptor was read. Quiet run.");
        }

        Ok(RunSummary {
            passes: tally.passes,
            descriptors_read: tally.descriptors,
            samples_generated,
            totals,
            elapsed: started.elapsed(),
        })
    }
}
