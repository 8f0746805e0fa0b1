//! 🏭 SampleFactory — one dataset's worth of make-believe.
//!
//! 🎬 *[a CSV line arrives: a domain, a uid, a column count. humble beginnings.]*
//! *[the factory rolls column ids, hires one generator per column, and gets to work.]*
//!
//! A factory is built per dataset descriptor and owned by exactly one generator worker,
//! which is how every `ValueGenerator` pool stays single-writer without a single lock.
//!
//! 🧠 Knowledge graph:
//! - Built from: `descriptors::DatasetDescriptor` + `GeneratorConfig` + an rng
//! - Owns: column ids, one `ValueGenerator` per column, the memoized row count
//! - Asks: `row_count::RowCountOracle` exactly once, falls back to the configured default
//! - Emits: `common::Sample`

use rand::Rng;
use rand::rngs::StdRng;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::common::Sample;
use crate::descriptors::DatasetDescriptor;
use crate::generators::{GeneratorKind, GeneratorSpec, ValueGenerator, random_lowercase};
use crate::row_count::RowCountOracle;

/// 📎 The working copy never changes. It's a constant in a struct's clothing.
pub const WORKING_COPY: u64 = 1;

/// 📏 Are `0..=n` loops inclusive (one extra column, one extra row) or `0..n`?
///
/// `Inclusive` is the historical behavior: ask for 3 columns, get 4. `Exclusive`
/// gives you what you asked for. Pick one on purpose.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoopBounds {
    #[default]
    Inclusive,
    Exclusive,
}

impl LoopBounds {
    /// 🔢 How many iterations a loop "up to n" actually runs.
    pub fn span(self, n: u64) -> u64 {
        match self {
            LoopBounds::Inclusive => n.saturating_add(1),
            LoopBounds::Exclusive => n,
        }
    }
}

/// 🪪 Does the two-letter dataset prefix get rolled once per factory, or once per sample?
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DatasetIdentity {
    /// one prefix per factory: every sample of a dataset shares its `dataset_id`
    #[default]
    Stable,
    /// a fresh prefix on every sample
    PerSample,
}

/// 🎲 Generator knobs.
#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    /// 📏 string lengths are drawn from `[0, string_length_max)`
    #[serde(default = "default_string_length_max")]
    pub string_length_max: usize,
    /// 🔁 pool sizes for `low`, `medium`, `high`
    #[serde(default = "default_pool_sizes")]
    pub pool_sizes: Vec<usize>,
    /// 🎠 generator kinds handed out to columns, cycled by column index
    #[serde(default = "default_cycle")]
    pub cycle: Vec<GeneratorKind>,
    /// 🌱 fixed seed for reproducible runs; `None` seeds from the OS
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub loop_bounds: LoopBounds,
    #[serde(default)]
    pub dataset_identity: DatasetIdentity,
}

fn default_string_length_max() -> usize {
    255
}

fn default_pool_sizes() -> Vec<usize> {
    vec![20, 100, 1000]
}

fn default_cycle() -> Vec<GeneratorKind> {
    vec![GeneratorKind::Unique, GeneratorKind::Low, GeneratorKind::Medium]
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            string_length_max: default_string_length_max(),
            pool_sizes: default_pool_sizes(),
            cycle: default_cycle(),
            seed: None,
            loop_bounds: LoopBounds::default(),
            dataset_identity: DatasetIdentity::default(),
        }
    }
}

/// 🎠 Which kind does column `index` get? `cycle[(len - index) mod len]`, so with the
/// default cycle the columns go unique, medium, low, unique, medium, low, ...
pub fn kind_for_column(cycle: &[GeneratorKind], index: usize) -> GeneratorKind {
    if cycle.is_empty() {
        return GeneratorKind::Unique;
    }
    let len = cycle.len();
    cycle[(len - index % len) % len]
}

/// 🪪 `xxxx-xxxx`, lowercase.
fn fake_column_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{}-{}", random_lowercase(rng, 4), random_lowercase(rng, 4))
}

/// 🏭 Produces `Sample`s for one dataset.
#[derive(Debug)]
pub struct SampleFactory {
    domain: String,
    dataset_uid: String,
    dataset_id: String,
    identity: DatasetIdentity,
    columns: Vec<String>,
    generators: Vec<ValueGenerator>,
    row_count: Option<u64>,
    rng: StdRng,
}

impl SampleFactory {
    pub fn new(descriptor: &DatasetDescriptor, config: &GeneratorConfig, mut rng: StdRng) -> Self {
        let column_total = config.loop_bounds.span(descriptor.column_count);
        let columns: Vec<String> = (0..column_total).map(|_| fake_column_id(&mut rng)).collect();
        let generators = (0..columns.len())
            .map(|index| {
                let kind = kind_for_column(&config.cycle, index);
                ValueGenerator::new(GeneratorSpec::roll(
                    kind,
                    config.string_length_max,
                    &config.pool_sizes,
                    &mut rng,
                ))
            })
            .collect();
        let dataset_id = format!("{}{}", random_lowercase(&mut rng, 2), descriptor.dataset_uid);

        debug!(
            "🏭 factory for {}/{} ready with {} columns",
            descriptor.domain,
            descriptor.dataset_uid,
            columns.len()
        );

        Self {
            domain: descriptor.domain.clone(),
            dataset_uid: descriptor.dataset_uid.clone(),
            dataset_id,
            identity: config.dataset_identity,
            columns,
            generators,
            row_count: None,
            rng,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn dataset_uid(&self) -> &str {
        &self.dataset_uid
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_ids(&self) -> &[String] {
        &self.columns
    }

    pub fn generators(&self) -> &[ValueGenerator] {
        &self.generators
    }

    /// 🔢 Memoized row count. The oracle is asked once; if it fails, `default_row_count`
    /// is memoized instead and the oracle is never bothered again.
    pub async fn row_count<O>(&mut self, oracle: &O, default_row_count: u64) -> u64
    where
        O: RowCountOracle + ?Sized,
    {
        if let Some(rows) = self.row_count {
            return rows;
        }
        let rows = match oracle.count(&self.domain, &self.dataset_uid).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(
                    "⚠️ row count for {}/{} unavailable, using default {}: {:#}",
                    self.domain, self.dataset_uid, default_row_count, err
                );
                default_row_count
            }
        };
        self.row_count = Some(rows);
        rows
    }

    /// 🧬 One sample from column `column_index`. `None` if the column doesn't exist.
    pub fn sample(&mut self, column_index: usize) -> Option<Sample> {
        let column_id = self.columns.get(column_index)?;
        let generator = self.generators.get_mut(column_index)?;
        let value = generator.sample(&mut self.rng);
        let dataset_id = match self.identity {
            DatasetIdentity::Stable => self.dataset_id.clone(),
            DatasetIdentity::PerSample => {
                format!("{}{}", random_lowercase(&mut self.rng, 2), self.dataset_uid)
            }
        };
        Some(Sample::new(dataset_id, WORKING_COPY, column_id.clone(), value))
    }
}
