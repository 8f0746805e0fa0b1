//! 🏭 GeneratorWorker — takes a descriptor, builds a factory, and mass-produces samples.
//!
//! Per descriptor: a fresh `SampleFactory` (new fake columns, new pools, new dataset id),
//! one row-count lookup, then for every column, `row_count` samples (plus one more
//! under inclusive bounds). Column-major: all of column 0, then all of column 1, etc.
//!
//! Samples are reserved from the shared `WriteBudget` a chunk at a time and shipped
//! downstream as `SampleBatch`es. When the budget says zero, we stop mid-column.
//! The target is the target.

use std::sync::Arc;

use anyhow::Result;
use async_channel::{Receiver, Sender};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::Worker;
use crate::budget::WriteBudget;
use crate::common::SampleBatch;
use crate::descriptors::DatasetDescriptor;
use crate::row_count::RowCountBackend;
use crate::sample_factory::{GeneratorConfig, SampleFactory};

/// 🚦 Why a descriptor loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

#[derive(Debug)]
pub(crate) struct GeneratorWorker {
    id: usize,
    config: GeneratorConfig,
    default_row_count: u64,
    chunk_size: usize,
    oracle: Arc<RowCountBackend>,
    budget: Arc<WriteBudget>,
    rng: StdRng,
    rx: Receiver<DatasetDescriptor>,
    tx: Sender<SampleBatch>,
    /// 🧾 descriptors fully handled, shared by every generator, watched by the reader
    processed: Arc<watch::Sender<u64>>,
}

impl GeneratorWorker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: usize,
        config: GeneratorConfig,
        default_row_count: u64,
        chunk_size: usize,
        oracle: Arc<RowCountBackend>,
        budget: Arc<WriteBudget>,
        rx: Receiver<DatasetDescriptor>,
        tx: Sender<SampleBatch>,
        processed: Arc<watch::Sender<u64>>,
    ) -> Self {
        // -- 🎲 seeded runs stay reproducible per worker; unseeded runs take whatever the OS deals
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id as u64)),
            None => StdRng::from_os_rng(),
        };
        Self {
            id,
            config,
            default_row_count,
            chunk_size: chunk_size.max(1),
            oracle,
            budget,
            rng,
            rx,
            tx,
            processed,
        }
    }

    async fn generate(&mut self, descriptor: &DatasetDescriptor) -> Result<(Flow, u64)> {
        let factory_rng = StdRng::from_rng(&mut self.rng);
        let mut factory = SampleFactory::new(descriptor, &self.config, factory_rng);
        let rows = factory
            .row_count(self.oracle.as_ref(), self.default_row_count)
            .await;
        let samples_per_column = self.config.loop_bounds.span(rows);
        debug!(
            "🏭 worker {} generating {}/{}: {} columns × {} samples",
            self.id,
            factory.domain(),
            factory.dataset_uid(),
            factory.column_count(),
            samples_per_column
        );

        let mut produced = 0u64;
        for column in 0..factory.column_count() {
            let mut remaining = samples_per_column;
            while remaining > 0 {
                let granted = self.budget.reserve(remaining.min(self.chunk_size as u64));
                if granted == 0 {
                    return Ok((Flow::Stop, produced));
                }
                let mut batch = SampleBatch::with_capacity(granted as usize);
                for _ in 0..granted {
                    if let Some(sample) = factory.sample(column) {
                        batch.samples.push(sample);
                    }
                }
                produced += batch.len() as u64;
                trace!("📦 worker {} shipping {} samples", self.id, batch.len());
                if self.tx.send(batch).await.is_err() {
                    debug!("🏁 worker {}: the sink hung up", self.id);
                    return Ok((Flow::Stop, produced));
                }
                remaining -= granted;
            }
        }
        Ok((Flow::Continue, produced))
    }

    async fn run(&mut self) -> Result<u64> {
        let mut generated = 0u64;
        while let Ok(descriptor) = self.rx.recv().await {
            let (flow, produced) = self.generate(&descriptor).await?;
            generated += produced;
            self.processed.send_modify(|done| *done += 1);
            if flow == Flow::Stop {
                break;
            }
        }
        Ok(generated)
    }
}

impl Worker for GeneratorWorker {
    /// 📊 samples generated
    type Output = u64;

    fn start(mut self) -> JoinHandle<Result<u64>> {
        tokio::spawn(async move {
            debug!("🏭 GeneratorWorker {} punching in", self.id);
            let result = self.run().await;
            // -- 🚪 close the descriptor channel on every exit, clean or not, so neither
            // -- the reader nor the other generators wait on a worker that has left
            self.rx.close();
            match &result {
                Ok(generated) => {
                    debug!("🏁 GeneratorWorker {} generated {} samples", self.id, generated)
                }
                Err(err) => debug!("💀 GeneratorWorker {} bailed: {:#}", self.id, err),
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row_count::RowCountOracleConfig;
    use crate::sample_factory::LoopBounds;

    fn descriptor(uid: &str, column_count: u64) -> DatasetDescriptor {
        DatasetDescriptor {
            domain: "data.example.com".to_string(),
            dataset_uid: uid.to_string(),
            column_count,
        }
    }

    fn worker(
        loop_bounds: LoopBounds,
        rows: u64,
        target: u64,
        chunk_size: usize,
    ) -> Result<(
        GeneratorWorker,
        Sender<DatasetDescriptor>,
        Receiver<SampleBatch>,
    )> {
        let (descriptor_tx, descriptor_rx) = async_channel::bounded(4);
        let (batch_tx, batch_rx) = async_channel::unbounded();
        let config = GeneratorConfig {
            seed: Some(7),
            loop_bounds,
            ..GeneratorConfig::default()
        };
        let oracle = Arc::new(RowCountBackend::from_config(&RowCountOracleConfig::Fixed {
            rows,
        })?);
        let worker = GeneratorWorker::new(
            0,
            config,
            1,
            chunk_size,
            oracle,
            Arc::new(WriteBudget::new(target)),
            descriptor_rx,
            batch_tx,
            Arc::new(watch::channel(0).0),
        );
        Ok((worker, descriptor_tx, batch_rx))
    }

    async fn collect(rx: Receiver<SampleBatch>) -> Vec<SampleBatch> {
        let mut batches = Vec::new();
        while let Ok(batch) = rx.recv().await {
            batches.push(batch);
        }
        batches
    }

    #[tokio::test]
    async fn the_one_where_inclusive_bounds_add_a_column_and_a_row() -> Result<()> {
        let (worker, tx, rx) = worker(LoopBounds::Inclusive, 2, u64::MAX, 100)?;
        tx.send(descriptor("abcd-0001", 3)).await?;
        drop(tx);

        let generated = worker.start().await??;
        let batches = collect(rx).await;

        // -- 🧮 (3 + 1) columns × (2 + 1) rows
        assert_eq!(generated, 12);
        assert_eq!(batches.len(), 4);
        assert!(batches.iter().all(|batch| batch.len() == 3));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_exclusive_bounds_mean_exactly_what_they_say() -> Result<()> {
        let (worker, tx, rx) = worker(LoopBounds::Exclusive, 5, u64::MAX, 2)?;
        tx.send(descriptor("abcd-0001", 2)).await?;
        drop(tx);

        let generated = worker.start().await??;
        let batches = collect(rx).await;

        assert_eq!(generated, 10);
        // -- 📦 chunks of 2 never straddle columns: 2 + 2 + 1 per column
        let sizes: Vec<usize> = batches.iter().map(SampleBatch::len).collect();
        assert_eq!(sizes, vec![2, 2, 1, 2, 2, 1]);

        let first_column = batches[0].samples[0].column_id().to_string();
        assert!(batches[..3]
            .iter()
            .flat_map(|batch| batch.samples.iter())
            .all(|sample| sample.column_id() == first_column));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_budget_runs_out_mid_column() -> Result<()> {
        let (worker, tx, rx) = worker(LoopBounds::Exclusive, 100, 7, 5)?;
        tx.send(descriptor("abcd-0001", 2)).await?;
        tx.send(descriptor("abcd-0002", 2)).await?;
        drop(tx);

        let generated = worker.start().await??;
        let batches = collect(rx).await;

        assert_eq!(generated, 7);
        assert_eq!(batches.iter().map(SampleBatch::len).sum::<usize>(), 7);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_every_sample_carries_a_composite_id() -> Result<()> {
        let (worker, tx, rx) = worker(LoopBounds::Exclusive, 1, u64::MAX, 10)?;
        tx.send(descriptor("abcd-0001", 1)).await?;
        drop(tx);

        worker.start().await??;
        let batches = collect(rx).await;
        let sample = &batches[0].samples[0];
        assert!(sample.composite_id().ends_with(&format!("|1|{}", sample.column_id())));
        assert!(sample.dataset_composite_id().ends_with("abcd-0001"));
        Ok(())
    }
}
