//! # Previously, on spx...
//!
//! 🎬 The cluster was down. Or it never existed. Or it's a unit test and nobody wanted
//! to spin up a JVM for a 12-line assertion. Enter the in-memory sink: it accepts every
//! bulk, remembers what it was told (if asked to), and never returns a 429.
//!
//! ⚠️ Retaining operations keeps every serialized document on the heap. Fine for tests.
//! For dry runs of a few billion samples, leave `retain_operations` off and it only counts.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::backends::{BulkOutcome, CommonSinkConfig, IndexBackend};
use crate::common::{BulkOperation, SampleDocument};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InMemorySinkConfig {
    /// 🧠 keep every operation around for inspection
    #[serde(default)]
    pub retain_operations: bool,
    #[serde(flatten, default)]
    pub common_config: CommonSinkConfig,
}

/// 🗄️ Everything the in-memory sink has seen.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    /// 📦 one entry per bulk call, only when retaining
    pub bulk_requests: Vec<Vec<BulkOperation>>,
    /// 📄 single-document writes, `(id, document)`, only when retaining
    pub single_writes: Vec<(String, SampleDocument)>,
    pub bulk_call_count: usize,
    pub bulk_document_count: usize,
    pub single_write_count: usize,
    pub recreate_count: usize,
    pub close_count: usize,
}

/// 📦 A sink that never forgets (when told to remember).
///
/// Clone-able because tests need to peek inside after handing `self` off to the
/// pipeline. The `Arc` means every clone shares the same ledger.
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    retain_operations: bool,
    /// 💀 test hook: every bulk call returns `Err`
    fail_bulk: bool,
    pub(crate) ledger: Arc<Mutex<InMemoryLedger>>,
}

impl InMemorySink {
    pub fn new(retain_operations: bool) -> Self {
        Self {
            retain_operations,
            fail_bulk: false,
            ledger: Arc::new(Mutex::new(InMemoryLedger::default())),
        }
    }

    /// 💀 A sink whose bulk endpoint is permanently on fire.
    #[cfg(test)]
    pub(crate) fn failing() -> Self {
        Self {
            fail_bulk: true,
            ..Self::new(true)
        }
    }

    pub fn ledger(&self) -> Arc<Mutex<InMemoryLedger>> {
        Arc::clone(&self.ledger)
    }
}

#[async_trait]
impl IndexBackend for InMemorySink {
    async fn recreate_index(&mut self) -> Result<()> {
        let mut ledger = self.ledger.lock().await;
        ledger.bulk_requests.clear();
        ledger.single_writes.clear();
        ledger.bulk_call_count = 0;
        ledger.bulk_document_count = 0;
        ledger.single_write_count = 0;
        ledger.recreate_count += 1;
        Ok(())
    }

    async fn bulk(&mut self, operations: &[BulkOperation]) -> Result<BulkOutcome> {
        if self.fail_bulk {
            anyhow::bail!("💀 the in-memory cluster is on fire (on purpose)");
        }
        let mut ledger = self.ledger.lock().await;
        ledger.bulk_call_count += 1;
        ledger.bulk_document_count += operations.len();
        if self.retain_operations {
            ledger.bulk_requests.push(operations.to_vec());
        }
        Ok(BulkOutcome {
            took_ms: 0,
            errors: false,
            item_count: operations.len(),
        })
    }

    async fn index(&mut self, id: &str, document: &SampleDocument) -> Result<()> {
        let mut ledger = self.ledger.lock().await;
        ledger.single_write_count += 1;
        if self.retain_operations {
            ledger.single_writes.push((id.to_string(), document.clone()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        // -- 🗑️ nothing to release. we live in RAM. we just note that we were told.
        self.ledger.lock().await.close_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Sample;

    #[tokio::test]
    async fn the_one_where_a_dry_run_only_counts() -> Result<()> {
        let mut sink = InMemorySink::new(false);
        let ledger = sink.ledger();
        let sample = Sample::new("xxabcd-1234", 1, "aaaa-bbbb", "value");
        let operation = BulkOperation::from_sample(&sample)?;

        for _ in 0..1_000 {
            sink.index(&sample.composite_id(), &sample.document()).await?;
            sink.bulk(std::slice::from_ref(&operation)).await?;
        }

        let ledger = ledger.lock().await;
        assert_eq!(ledger.single_write_count, 1_000);
        assert_eq!(ledger.bulk_call_count, 1_000);
        assert_eq!(ledger.bulk_document_count, 1_000);
        assert!(ledger.single_writes.is_empty());
        assert!(ledger.bulk_requests.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_retaining_keeps_the_receipts() -> Result<()> {
        let mut sink = InMemorySink::new(true);
        let ledger = sink.ledger();
        let sample = Sample::new("xxabcd-1234", 1, "aaaa-bbbb", "value");

        sink.index(&sample.composite_id(), &sample.document()).await?;
        sink.bulk(&[BulkOperation::from_sample(&sample)?]).await?;

        let ledger = ledger.lock().await;
        assert_eq!(ledger.single_writes.len(), 1);
        assert_eq!(ledger.bulk_requests.len(), 1);
        assert_eq!(ledger.single_write_count, 1);
        Ok(())
    }
}
