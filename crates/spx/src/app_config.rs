//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment. Every tunable that used to be a hardcoded constant (threshold,
//! paths, host, credentials, the 23-billion-write goal) now lives here and nowhere else.
//! No globals. The config is built once and handed down.

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::SinkConfig;
use crate::row_count::RowCountConfig;
use crate::sample_factory::GeneratorConfig;

/// 📦 The AppConfig: one struct to rule them all.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub row_count: RowCountConfig,
    /// 🕳️ where the documents go. No default: we don't guess where your cluster lives.
    pub sink: SinkConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// ✍️ Bulk batches, or one document per request?
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    #[default]
    Bulk,
    Single,
}

/// 🧵 Driver knobs: inputs, outputs, how far to go, how many workers to hire.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// 📂 CSV of `domain,dataset_uid,column_count`
    #[serde(default = "default_input_file")]
    pub input_file: PathBuf,
    /// 📓 append-only flush stats
    #[serde(default = "default_stats_log")]
    pub stats_log: PathBuf,
    /// 🎯 stop after this many samples. The old goal was 23 billion. We kept it.
    #[serde(default = "default_target_total_writes")]
    pub target_total_writes: u64,
    /// 🔁 stop after this many passes over the input, target or not
    #[serde(default)]
    pub max_passes: Option<u32>,
    /// 📬 bounded channel size, in chunks
    #[serde(default = "default_queue_capacity", alias = "channel_size")]
    pub queue_capacity: usize,
    /// 👷 how many generator workers run in parallel
    #[serde(default = "default_generator_parallelism")]
    pub generator_parallelism: usize,
    /// 📦 samples per channel message
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub write_mode: WriteMode,
    #[serde(default = "default_true")]
    pub flush_on_finish: bool,
    #[serde(default)]
    pub max_consecutive_bulk_errors: Option<u32>,
    /// 📊 draw the progress panel
    #[serde(default = "default_true")]
    pub progress: bool,
}

fn default_input_file() -> PathBuf {
    PathBuf::from("textcolumns.csv")
}

fn default_stats_log() -> PathBuf {
    PathBuf::from("writeoutput.csv")
}

fn default_target_total_writes() -> u64 {
    23_000_000_000
}

fn default_queue_capacity() -> usize {
    10
}

fn default_generator_parallelism() -> usize {
    1
}

fn default_chunk_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            input_file: default_input_file(),
            stats_log: default_stats_log(),
            target_total_writes: default_target_total_writes(),
            max_passes: None,
            queue_capacity: default_queue_capacity(),
            generator_parallelism: default_generator_parallelism(),
            chunk_size: default_chunk_size(),
            write_mode: WriteMode::default(),
            flush_on_finish: true,
            max_consecutive_bulk_errors: None,
            progress: true,
        }
    }
}

/// 🚀 Load the config — env vars (`SPX_*`, `__` for nesting) merged with an optional TOML file.
///
/// 📐 If `config_file_name` is None → env vars only. If Some → env + TOML, TOML wins on conflicts.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("SPX_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (SPX_*). \
             The file exists in our hearts, but apparently not on disk. Or it has a typo.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (SPX_*). \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}
