// ai
//! 📦 **Common Sink Config** — the knobs every backend shares.
//!
//! Right now that's one knob: how many bytes of serialized documents pile up before the
//! batcher flushes. 15 MiB, because bulk requests above ~10-20MB start making clusters
//! sweat, and below that we're paying HTTP overhead for nothing.
//!
//! ⚠️ Lives in `backends` (not `app_config`) to avoid a circular import:
//!   `app_config` → `backends` → `app_config`. The module system has opinions. 🦆

use serde::Deserialize;

/// 🚰 Shared configuration embedded (flattened) by every sink backend config.
///
/// 🧠 Knowledge graph:
/// - Read by `BulkBatcher::new` to set its flush threshold
/// - The counter it's compared against is the sum of serialized document lengths,
///   NOT the full NDJSON payload (action lines are free, for accounting purposes)
#[derive(Debug, Deserialize, Clone)]
pub struct CommonSinkConfig {
    /// 🚰 flush once the buffered documents EXCEED this many bytes
    #[serde(default = "default_flush_threshold_bytes")]
    pub flush_threshold_bytes: usize,
}

// 🚰 15 * 1024 * 1024 = 15728640. Yes the comment is doing the math. You're welcome.
fn default_flush_threshold_bytes() -> usize {
    15_728_640
}

impl Default for CommonSinkConfig {
    fn default() -> Self {
        Self {
            flush_threshold_bytes: default_flush_threshold_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_fifteen_mebibytes_is_the_default() {
        assert_eq!(CommonSinkConfig::default().flush_threshold_bytes, 15 * 1024 * 1024);
    }
}
