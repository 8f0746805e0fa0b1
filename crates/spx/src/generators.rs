//! 🎲 Generators — the fake-data bakery. Fresh strings, baked to order, some of them reheated.
//!
//! 🎬 COLD OPEN — INT. SEARCH CLUSTER — CAPACITY PLANNING MEETING — 4:55 PM ON A FRIDAY
//!
//! "How many distinct values per column?" someone asks. Nobody knows. Somebody says
//! "a few". Somebody else says "all of them". The index mapping does not care about
//! your feelings, but the autocomplete latency very much does.
//!
//! This module answers that question with knobs instead of meetings. Each column gets
//! exactly one [`ValueGenerator`]. The generator either invents a brand new string every
//! time (`Unique`, `Point`) or invents up to `pool_limit` strings and then cycles through
//! them forever (`Low`, `Medium`, `High`). Same generator, different [`GeneratorSpec`].
//! No class hierarchy. No inheritance. Just a tagged config and a match. 🦆
//!
//! ## Knowledge Graph 🧠
//! - Used by: `sample_factory::SampleFactory` (one generator per column)
//! - Pool ownership: exclusive to the generator, never shared across columns
//! - Cursor: stored modulo the pool size, so it cannot overflow no matter how long we run
//! - Randomness: any `rand::Rng`, seeded or not. Not cryptographic. Nobody is guessing these.

use rand::Rng;
use serde::Deserialize;

/// 🔤 The alphabet. All 26 letters, lowercase, no drama.
const ALPHABET: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

/// 🏷️ Which flavor of column are we faking?
///
/// `Unique` and `Point` never reuse a value. `Low`, `Medium` and `High` draw from a
/// bounded pool whose size comes from `GeneratorConfig::pool_sizes` (20 / 100 / 1000
/// by default). Low variability means few distinct values. It's in the name.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    /// 🦄 every value is a snowflake
    Unique,
    /// 🔁 20 distinct values, on repeat, like a mall playlist
    Low,
    /// 🔁 100 distinct values
    Medium,
    /// 🔁 1000 distinct values
    High,
    /// 📍 pass-through: no special behavior beyond `Unique`
    Point,
}

impl GeneratorKind {
    /// 📏 The pool limit this kind implies, given the configured `[low, medium, high]` sizes.
    /// `None` means unbounded. Missing entries in `pool_sizes` also mean unbounded, because
    /// we'd rather generate too many distinct strings than index out of bounds at 3am.
    pub fn pool_limit(self, pool_sizes: &[usize]) -> Option<usize> {
        match self {
            GeneratorKind::Unique | GeneratorKind::Point => None,
            GeneratorKind::Low => pool_sizes.first().copied(),
            GeneratorKind::Medium => pool_sizes.get(1).copied(),
            GeneratorKind::High => pool_sizes.get(2).copied(),
        }
    }
}

/// 📋 The tagged configuration value a [`ValueGenerator`] is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorSpec {
    pub kind: GeneratorKind,
    /// 📏 exact length of every string this generator produces
    pub string_length: usize,
    /// 🔒 `None` = unbounded; `Some(n)` = at most `n` distinct values, ever
    pub pool_limit: Option<usize>,
}

impl GeneratorSpec {
    /// 🎲 Roll a spec for `kind`: the string length is drawn once, uniformly, from
    /// `[0, string_length_max)`. A max of zero yields empty strings instead of a panic.
    pub fn roll<R: Rng + ?Sized>(
        kind: GeneratorKind,
        string_length_max: usize,
        pool_sizes: &[usize],
        rng: &mut R,
    ) -> Self {
        let string_length = if string_length_max == 0 {
            0
        } else {
            rng.random_range(0..string_length_max)
        };
        Self {
            kind,
            string_length,
            pool_limit: kind.pool_limit(pool_sizes),
        }
    }
}

/// 🔡 A uniformly random lowercase string of exactly `len` characters.
pub fn random_lowercase<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}

/// 🏭 One column's worth of fake values.
///
/// Bounded generators fill their pool on the way up, then switch to read-only mode and
/// cycle through it. The pool never grows past `pool_limit`, and once it's full no new
/// strings are ever invented. Cardinality: controlled. Autocomplete: stress-tested.
#[derive(Debug, Clone)]
pub struct ValueGenerator {
    spec: GeneratorSpec,
    pool: Vec<String>,
    /// 🔄 always in `[0, pool.len())` once the pool is full
    cursor: usize,
}

impl ValueGenerator {
    pub fn new(spec: GeneratorSpec) -> Self {
        // -- 📦 pre-size the pool, but cap the reservation. A 1000-slot Vec is fine.
        // -- A typo'd pool_limit of 10^12 should not eat the heap before the first sample.
        let capacity = spec.pool_limit.unwrap_or(0).min(1024);
        Self {
            spec,
            pool: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    pub fn spec(&self) -> &GeneratorSpec {
        &self.spec
    }

    /// 🧮 How many values are sitting in the pool. Always 0 for unbounded generators.
    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// 🎲 Produce the next value, inventing fresh strings from `rng` when needed.
    pub fn sample<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        self.sample_with(|len| random_lowercase(rng, len))
    }

    /// 🔧 Produce the next value, calling `fresh(string_length)` whenever a brand new
    /// string is needed. `sample` is this with the random alphabet plugged in; tests plug
    /// in a script instead.
    pub fn sample_with<F>(&mut self, mut fresh: F) -> String
    where
        F: FnMut(usize) -> String,
    {
        match self.spec.pool_limit {
            // 🦄 unbounded: invent, hand over, forget
            None => fresh(self.spec.string_length),
            // 🌱 bounded and still filling up
            Some(limit) if self.pool.len() < limit => {
                let value = fresh(self.spec.string_length);
                self.pool.push(value.clone());
                value
            }
            // 🔁 bounded and full: cycle. `limit == 0` lands here with an empty pool and
            // degenerates to the empty string, which is the only value a zero-sized pool holds.
            Some(_) => {
                let pool_size = self.pool.len();
                if pool_size == 0 {
                    return String::new();
                }
                let index = (pool_size - self.cursor) % pool_size;
                self.cursor = (self.cursor + 1) % pool_size;
                self.pool[index].clone()
            }
        }
    }
}
