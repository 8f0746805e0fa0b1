//! 📦 BulkBatcher — the loading dock.
//!
//! 🎬 *[samples arrive one at a time. the dock fills up. someone watches the scale.]*
//! *[the needle crosses 15 MiB. a horn sounds. the truck leaves. the dock is empty again.]*
//!
//! Each sample is serialized on arrival, wrapped as an `index` operation keyed by its
//! composite id, and parked in the buffer. The serialized document's byte length goes
//! on the running tab. The moment the tab EXCEEDS the threshold, everything in the
//! buffer ships as one bulk request, one line goes into the stats log, and both the
//! buffer and the tab go back to zero. Together. Always together.
//!
//! Failure policy: a failed bulk is written down (`had_errors = true`), logged, and
//! forgotten. The buffer is cleared anyway. No retries. No backpressure. At most once.
//! Unless `max_consecutive_bulk_errors` says enough is enough, in which case we bail. 🦆
//!
//! 🧠 Knowledge graph:
//! - Owned by exactly one `SinkWorker`; every mutation goes through `&mut self`,
//!   so a flush always sees the buffer and the byte tab in sync
//! - Talks to: any `IndexBackend` (usually `SinkBackend`)
//! - Writes: `stats::StatsLog`

use std::time::Instant;

use anyhow::Result;
use tracing::{debug, warn};

use crate::backends::IndexBackend;
use crate::common::{BulkOperation, Sample};
use crate::stats::{FlushStats, StatsLog};

/// 🔧 How the batcher behaves. Built from the sink's common config plus runtime knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatcherConfig {
    /// 🚰 flush once buffered document bytes EXCEED this
    pub flush_threshold_bytes: usize,
    /// 🏁 flush the leftovers in `finish()`
    pub flush_on_finish: bool,
    /// 💀 abort after this many failed writes in a row. `None` = never give up.
    pub max_consecutive_bulk_errors: Option<u32>,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            flush_threshold_bytes: 15_728_640,
            flush_on_finish: true,
            max_consecutive_bulk_errors: None,
        }
    }
}

/// 📊 Running totals, for the progress panel and the final summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatcherTotals {
    pub documents_added: u64,
    pub documents_flushed: u64,
    pub bytes_flushed: u64,
    pub flushes: u64,
    pub failed_flushes: u64,
    pub single_writes: u64,
    pub failed_single_writes: u64,
}

#[derive(Debug)]
pub struct BulkBatcher<B: IndexBackend> {
    backend: B,
    stats_log: StatsLog,
    config: BatcherConfig,
    buffer: Vec<BulkOperation>,
    buffered_bytes: usize,
    consecutive_failures: u32,
    totals: BatcherTotals,
}

impl<B: IndexBackend> BulkBatcher<B> {
    pub fn new(backend: B, stats_log: StatsLog, config: BatcherConfig) -> Self {
        Self {
            backend,
            stats_log,
            config,
            buffer: Vec::new(),
            buffered_bytes: 0,
            consecutive_failures: 0,
            totals: BatcherTotals::default(),
        }
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn totals(&self) -> BatcherTotals {
        self.totals
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 📥 Queue one sample. Returns the flush stats if this add tipped the scale.
    pub async fn add(&mut self, sample: &Sample) -> Result<Option<FlushStats>> {
        let operation = BulkOperation::from_sample(sample)?;
        self.buffered_bytes += operation.source_len();
        self.buffer.push(operation);
        self.totals.documents_added += 1;

        if self.buffered_bytes > self.config.flush_threshold_bytes {
            return self.flush().await;
        }
        Ok(None)
    }

    /// 🚚 Ship whatever is buffered as one bulk request, write the receipt, reset.
    ///
    /// The buffer and the byte tab are cleared whether or not the bulk succeeded.
    /// Only a stats-log write failure or the consecutive-error limit returns `Err`.
    /// An empty buffer is `Ok(None)`: no request, no stats line.
    pub async fn flush(&mut self) -> Result<Option<FlushStats>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let document_count = self.buffer.len();
        let flushed_bytes = self.buffered_bytes;
        let started = Instant::now();
        let result = self.backend.bulk(&self.buffer).await;
        let wall_ms = started.elapsed().as_millis() as u64;

        self.buffer.clear();
        self.buffered_bytes = 0;

        let stats = match result {
            Ok(outcome) => {
                if outcome.errors {
                    warn!(
                        "⚠️ bulk of {} documents landed with item-level errors",
                        document_count
                    );
                }
                FlushStats {
                    document_count,
                    elapsed_ms: outcome.took_ms,
                    had_errors: outcome.errors,
                }
            }
            Err(err) => {
                warn!(
                    "⚠️ bulk of {} documents failed after {}ms, dropping them: {:#}",
                    document_count, wall_ms, err
                );
                FlushStats {
                    document_count,
                    elapsed_ms: wall_ms,
                    had_errors: true,
                }
            }
        };

        self.stats_log.append(&stats).await?;

        self.totals.flushes += 1;
        self.totals.documents_flushed += document_count as u64;
        self.totals.bytes_flushed += flushed_bytes as u64;
        debug!(
            "📡 flushed {} documents ({} bytes) in {}ms, errors={}",
            document_count, flushed_bytes, stats.elapsed_ms, stats.had_errors
        );

        if stats.had_errors {
            self.totals.failed_flushes += 1;
            self.record_failure()?;
        } else {
            self.consecutive_failures = 0;
        }
        Ok(Some(stats))
    }

    /// 📄 Skip the buffer: one document, one request. For trickles, not floods.
    pub async fn write_single(&mut self, sample: &Sample) -> Result<()> {
        let id = sample.composite_id();
        let document = sample.document();
        self.totals.single_writes += 1;
        match self.backend.index(&id, &document).await {
            Ok(()) => {
                self.consecutive_failures = 0;
                Ok(())
            }
            Err(err) => {
                warn!("⚠️ single write of '{}' failed: {:#}", id, err);
                self.totals.failed_single_writes += 1;
                self.record_failure()
            }
        }
    }

    /// 🏁 Flush the leftovers (if configured) and close the backend.
    pub async fn finish(&mut self) -> Result<Option<FlushStats>> {
        let stats = if self.config.flush_on_finish {
            self.flush().await?
        } else {
            if !self.buffer.is_empty() {
                debug!(
                    "🗑️ leaving {} buffered documents unflushed, as configured",
                    self.buffer.len()
                );
            }
            None
        };
        self.backend.close().await?;
        Ok(stats)
    }

    /// 🚪 Close the backend without flushing. For when the run is already going down.
    pub async fn close(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            debug!("🗑️ closing with {} documents still buffered", self.buffer.len());
        }
        self.backend.close().await
    }

    fn record_failure(&mut self) -> Result<()> {
        self.consecutive_failures += 1;
        if let Some(limit) = self.config.max_consecutive_bulk_errors {
            if self.consecutive_failures >= limit {
                anyhow::bail!(
                    "💀 {} writes in a row failed (limit {}). The cluster is not having it. Stopping.",
                    self.consecutive_failures,
                    limit
                );
            }
        }
        Ok(())
    }
}
