// ai
//! 📦 Common data structures — the building blocks of spx
//!
//! ---
//!
//! 🎬 COLD OPEN — INT. DATA CENTER — 3:47 AM
//!
//! A `Sample` is born. It knows which dataset it belongs to (sort of), which working
//! copy (always 1, it's a simple life), which column, and what value it carries.
//! It will be serialized exactly once, shipped in a bulk request, and forgotten.
//! Like a paper airplane. A very structured paper airplane. 🦆
//!
//! ---
//!
//! 🧠 Knowledge graph:
//! - `Sample`: produced by `SampleFactory::sample`, consumed by `BulkBatcher::add`
//! - `SampleDocument`: the serialized shape that lands in the index
//! - `BulkOperation`: one `index` action keyed by the composite id, plus its source JSON
//! - `SampleBatch`: a chunk of samples riding the channel between workers

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 🧬 One cell of one column of one dataset. Immutable once made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    dataset_composite_id: String,
    working_copy: u64,
    column_id: String,
    value: String,
}

impl Sample {
    pub fn new(
        dataset_composite_id: impl Into<String>,
        working_copy: u64,
        column_id: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            dataset_composite_id: dataset_composite_id.into(),
            working_copy,
            column_id: column_id.into(),
            value: value.into(),
        }
    }

    pub fn dataset_composite_id(&self) -> &str {
        &self.dataset_composite_id
    }

    pub fn working_copy(&self) -> u64 {
        self.working_copy
    }

    pub fn column_id(&self) -> &str {
        &self.column_id
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// 🔑 `dataset|copy|column` — the natural key, and the document `_id` everywhere.
    pub fn composite_id(&self) -> String {
        format!(
            "{}|{}|{}",
            self.dataset_composite_id, self.working_copy, self.column_id
        )
    }

    /// 📄 The document form that gets indexed.
    pub fn document(&self) -> SampleDocument {
        SampleDocument {
            dataset_id: self.dataset_composite_id.clone(),
            copy_id: self.working_copy,
            column_id: self.column_id.clone(),
            composite_id: self.composite_id(),
            value: self.value.clone(),
        }
    }
}

/// 📄 What Elasticsearch actually sees. Field names are part of the index mapping,
/// so renaming one of these is a schema change. Don't. Or do, and recreate the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDocument {
    pub dataset_id: String,
    pub copy_id: u64,
    pub column_id: String,
    pub composite_id: String,
    pub value: String,
}

/// 📡 One `index` action for the bulk API: the `_id` and the serialized source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOperation {
    pub id: String,
    pub source: String,
}

impl BulkOperation {
    /// 🔄 Serialize a sample into its bulk operation. The source JSON's byte length is
    /// what the batcher counts toward the flush threshold.
    pub fn from_sample(sample: &Sample) -> Result<Self> {
        let document = sample.document();
        let source = serde_json::to_string(&document).context(
            "💀 A sample refused to become JSON. It had five fields. Five. \
             Strings and one integer. Somehow this still went sideways.",
        )?;
        Ok(Self {
            id: document.composite_id,
            source,
        })
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }
}

/// 📦 A chunk of samples traveling together through the channel. Carpooling, but for data.
#[derive(Debug, Clone, Default)]
pub struct SampleBatch {
    pub samples: Vec<Sample>,
}

impl SampleBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn the_usual_suspect() -> Sample {
        Sample::new("qzabcd-1234", 1, "wxyz-abcd", "hello")
    }

    #[test]
    fn the_one_where_the_composite_id_is_pipes_all_the_way_down() {
        assert_eq!(the_usual_suspect().composite_id(), "qzabcd-1234|1|wxyz-abcd");
    }

    #[test]
    fn the_one_where_the_document_survives_a_json_round_trip() -> Result<()> {
        let sample = the_usual_suspect();
        let the_json = serde_json::to_string(&sample.document())?;
        let the_return: SampleDocument = serde_json::from_str(&the_json)?;

        assert_eq!(the_return, sample.document());
        assert_eq!(the_return.dataset_id, "qzabcd-1234");
        assert_eq!(the_return.copy_id, 1);
        assert_eq!(the_return.column_id, "wxyz-abcd");
        assert_eq!(the_return.composite_id, "qzabcd-1234|1|wxyz-abcd");
        assert_eq!(the_return.value, "hello");
        Ok(())
    }

    #[test]
    fn the_one_where_the_bulk_operation_is_keyed_by_the_composite_id() -> Result<()> {
        let sample = the_usual_suspect();
        let operation = BulkOperation::from_sample(&sample)?;
        assert_eq!(operation.id, sample.composite_id());

        let the_source: serde_json::Value = serde_json::from_str(&operation.source)?;
        assert_eq!(the_source["composite_id"], "qzabcd-1234|1|wxyz-abcd");
        assert_eq!(the_source["copy_id"], 1);
        assert_eq!(operation.source_len(), operation.source.len());
        Ok(())
    }
}
