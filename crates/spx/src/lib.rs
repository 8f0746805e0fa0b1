//! 🧪 spx — the sample pusher.
//!
//! Reads a list of datasets, invents plausible-looking column values for each of them,
//! and shovels those values into a search index in 15 MiB bulk requests until it has
//! written as many as it was told to. Then it stops. Mostly.
//!
//! 🧠 Knowledge graph:
//! - `app_config` → what to do
//! - `descriptors` → which datasets
//! - `row_count` → how many rows each dataset claims to have
//! - `generators` + `sample_factory` → what the values look like
//! - `batcher` + `backends` → where they go, and when
//! - `stats` → the receipt, one line per flush
//! - `supervisors` → who does all of the above, concurrently

pub mod app_config;
pub mod backends;
pub mod batcher;
pub mod budget;
pub mod common;
pub mod descriptors;
pub mod generators;
pub(crate) mod progress;
pub mod row_count;
pub mod sample_factory;
pub mod stats;
mod supervisors;

use anyhow::{Context, Result};
use tracing::info;

use crate::app_config::AppConfig;
use crate::backends::{IndexBackend, SinkBackend, SinkConfig};
use crate::supervisors::Supervisor;

pub use crate::supervisors::RunSummary;

/// 🚀 Run the whole thing: stand up the sink, (re)create the index, generate until the
/// target is met or the input runs dry, flush, close, report.
pub async fn run(app_config: AppConfig) -> Result<RunSummary> {
    let sink_name = match &app_config.sink {
        SinkConfig::Elasticsearch(config) => format!("Elasticsearch {}/{}", config.url, config.index),
        SinkConfig::InMemory(_) => "InMemory".to_string(),
    };

    let mut backend = SinkBackend::from_config(&app_config.sink)
        .await
        .context("💀 Could not stand up the sink backend")?;
    if app_config.sink.recreate_index() {
        info!("🧨 recreating the index before writing");
        backend
            .recreate_index()
            .await
            .context("💀 Could not recreate the index")?;
    }

    let summary = Supervisor::new(app_config)
        .start_workers(backend, sink_name)
        .await?;
    info!(
        "🏁 done: {} samples, {} flushes ({} failed) in {:?}",
        summary.samples_generated,
        summary.totals.flushes,
        summary.totals.failed_flushes,
        summary.elapsed
    );
    Ok(summary)
}
