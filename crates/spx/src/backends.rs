//! 🔌 Backends — where the documents finally land.
//!
//! 🚰 The batcher decides WHEN to write. Backends decide HOW. Elasticsearch over HTTP
//! for the real thing, an in-memory vault for tests and dry runs.
//!
//! 🎭 This module is the casting agency. Same pattern as always: a trait, one concrete
//! type per destination, and an enum that dispatches so callers never care which one
//! they got. Ancient proverb: "He who hardcodes the backend, loads only once."
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::common::{BulkOperation, SampleDocument};

pub(crate) mod common_config;
pub(crate) mod elasticsearch;
pub(crate) mod in_mem;

pub use common_config::CommonSinkConfig;
pub use elasticsearch::{ElasticsearchSink, ElasticsearchSinkConfig};
pub use in_mem::{InMemorySink, InMemorySinkConfig};

/// 📬 What a bulk call reported back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkOutcome {
    /// ⏱️ server-side time the bulk took, in milliseconds
    pub took_ms: u64,
    /// 💀 true if ANY item in the batch was rejected
    pub errors: bool,
    /// 📦 how many per-item results came back
    pub item_count: usize,
}

/// 🕳️ A search/index service that can take documents in bulk or one at a time.
///
/// # Contract
/// - `bulk` sends every operation in one request. `Err` means the request itself failed;
///   `Ok` with `errors = true` means it arrived but some items were rejected.
/// - `index` writes a single document under `id`. No batching. No buffering.
/// - `recreate_index` DESTROYS the index and recreates it with the sample schema.
/// - `close` releases whatever needs releasing. Call it. Always.
#[async_trait]
pub trait IndexBackend: std::fmt::Debug + Send {
    async fn recreate_index(&mut self) -> Result<()>;
    async fn bulk(&mut self, operations: &[BulkOperation]) -> Result<BulkOutcome>;
    async fn index(&mut self, id: &str, document: &SampleDocument) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 Which backend? Externally tagged: `[sink.Elasticsearch]` or `[sink.InMemory]`.
#[derive(Debug, Deserialize, Clone)]
pub enum SinkConfig {
    Elasticsearch(ElasticsearchSinkConfig),
    InMemory(InMemorySinkConfig),
}

impl SinkConfig {
    /// 🔧 The shared knobs, wherever they live.
    pub fn common_config(&self) -> &CommonSinkConfig {
        match self {
            SinkConfig::Elasticsearch(config) => &config.common_config,
            SinkConfig::InMemory(config) => &config.common_config,
        }
    }

    /// ⚠️ Should we nuke and rebuild the index before writing?
    pub fn recreate_index(&self) -> bool {
        match self {
            SinkConfig::Elasticsearch(config) => config.recreate_index,
            SinkConfig::InMemory(_) => true,
        }
    }
}

/// 🎭 The many faces of an IndexBackend.
#[derive(Debug)]
pub enum SinkBackend {
    InMemory(InMemorySink),
    Elasticsearch(ElasticsearchSink),
}

impl SinkBackend {
    /// 🏗️ Stand up the backend the config asked for. Elasticsearch pings the cluster here,
    /// so a dead cluster fails the run before the first sample is generated.
    pub async fn from_config(config: &SinkConfig) -> Result<Self> {
        match config {
            SinkConfig::Elasticsearch(es_config) => Ok(SinkBackend::Elasticsearch(
                ElasticsearchSink::new(es_config.clone()).await?,
            )),
            SinkConfig::InMemory(mem_config) => {
                Ok(SinkBackend::InMemory(InMemorySink::new(mem_config.retain_operations)))
            }
        }
    }
}

#[async_trait]
impl IndexBackend for SinkBackend {
    async fn recreate_index(&mut self) -> Result<()> {
        match self {
            SinkBackend::InMemory(sink) => sink.recreate_index().await,
            SinkBackend::Elasticsearch(sink) => sink.recreate_index().await,
        }
    }

    async fn bulk(&mut self, operations: &[BulkOperation]) -> Result<BulkOutcome> {
        match self {
            SinkBackend::InMemory(sink) => sink.bulk(operations).await,
            SinkBackend::Elasticsearch(sink) => sink.bulk(operations).await,
        }
    }

    async fn index(&mut self, id: &str, document: &SampleDocument) -> Result<()> {
        match self {
            SinkBackend::InMemory(sink) => sink.index(id, document).await,
            SinkBackend::Elasticsearch(sink) => sink.index(id, document).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            SinkBackend::InMemory(sink) => sink.close().await,
            SinkBackend::Elasticsearch(sink) => sink.close().await,
        }
    }
}
