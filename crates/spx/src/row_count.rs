//! 🔢 Row counts — "how big is this dataset, really?" asked politely over HTTPS.
//!
//! 🎬 *[a dataset uid walks into a proxy. the proxy asks for credentials.]*
//! *[the dataset shows a Basic header and an app token. the proxy shrugs. "go on in."]*
//!
//! A `SampleFactory` needs to know how many rows to fake per column. The truth lives
//! behind a count endpoint. Sometimes the truth answers. Sometimes it times out, 404s,
//! or returns JSON shaped like modern art. The oracle reports what happened; the
//! factory decides what to do about it (spoiler: fall back to a default and move on).
//!
//! 🧠 Knowledge graph:
//! - Trait: [`RowCountOracle`], one async `count(domain, dataset_uid)` call
//! - Enum dispatch: [`RowCountBackend`] (`Http` or `Fixed`), same pattern as `backends::SinkBackend`
//! - Config: [`RowCountConfig`] holds the fallback default plus the tagged oracle config
//! - Fallback policy: NOT here. Lives in `SampleFactory::row_count`. The oracle never lies
//!   about failing. 🦆

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

pub(crate) mod http_count;

pub use http_count::HttpRowCountConfig;

/// 🔮 Something that knows how many rows a dataset has. Or claims to.
#[async_trait]
pub trait RowCountOracle: std::fmt::Debug + Send + Sync {
    /// 📡 Ask for the row count of `dataset_uid` on `domain`.
    /// Errors are honest errors. Fallbacks are the caller's business.
    async fn count(&self, domain: &str, dataset_uid: &str) -> Result<u64>;
}

/// 📋 Row-count settings: which oracle to ask, and what to believe when it won't answer.
#[derive(Debug, Deserialize, Clone)]
pub struct RowCountConfig {
    /// 🎯 the number we use when the oracle fails us. 8 million: big enough to hurt.
    #[serde(default = "default_row_count")]
    pub default_row_count: u64,
    #[serde(default)]
    pub oracle: RowCountOracleConfig,
}

fn default_row_count() -> u64 {
    8_000_000
}

impl Default for RowCountConfig {
    fn default() -> Self {
        Self {
            default_row_count: default_row_count(),
            oracle: RowCountOracleConfig::default(),
        }
    }
}

/// 🎭 Which oracle? Externally tagged, so TOML reads `[row_count.oracle.Http]`.
#[derive(Debug, Deserialize, Clone)]
pub enum RowCountOracleConfig {
    Http(HttpRowCountConfig),
    /// 🧊 no network: every dataset has exactly `rows` rows. Great for offline runs.
    Fixed { rows: u64 },
}

impl Default for RowCountOracleConfig {
    fn default() -> Self {
        RowCountOracleConfig::Http(HttpRowCountConfig::default())
    }
}

/// 🧊 The oracle that doesn't need the internet. It just knows.
#[derive(Debug, Clone, Copy)]
pub struct FixedRowCountOracle {
    rows: u64,
}

impl FixedRowCountOracle {
    pub fn new(rows: u64) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl RowCountOracle for FixedRowCountOracle {
    async fn count(&self, _domain: &str, _dataset_uid: &str) -> Result<u64> {
        Ok(self.rows)
    }
}

/// 🎭 The many faces of a RowCountOracle.
#[derive(Debug)]
pub enum RowCountBackend {
    Http(http_count::HttpRowCountOracle),
    Fixed(FixedRowCountOracle),
}

impl RowCountBackend {
    /// 🏗️ Build whichever oracle the config asked for.
    pub fn from_config(config: &RowCountOracleConfig) -> Result<Self> {
        match config {
            RowCountOracleConfig::Http(http_config) => Ok(RowCountBackend::Http(
                http_count::HttpRowCountOracle::new(http_config.clone())?,
            )),
            RowCountOracleConfig::Fixed { rows } => {
                Ok(RowCountBackend::Fixed(FixedRowCountOracle::new(*rows)))
            }
        }
    }
}

#[async_trait]
impl RowCountOracle for RowCountBackend {
    async fn count(&self, domain: &str, dataset_uid: &str) -> Result<u64> {
        match self {
            RowCountBackend::Http(oracle) => oracle.count(domain, dataset_uid).await,
            RowCountBackend::Fixed(oracle) => oracle.count(domain, dataset_uid).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_the_fixed_oracle_never_hesitates() -> Result<()> {
        let backend = RowCountBackend::from_config(&RowCountOracleConfig::Fixed { rows: 42 })?;
        assert_eq!(backend.count("data.example.com", "abcd-1234").await?, 42);
        Ok(())
    }

    #[test]
    fn the_one_where_the_default_is_eight_million_and_http() {
        let config = RowCountConfig::default();
        assert_eq!(config.default_row_count, 8_000_000);
        assert!(matches!(config.oracle, RowCountOracleConfig::Http(_)));
    }
}
