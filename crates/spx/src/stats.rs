//! 📊 Flush stats — the receipts.
//!
//! Every bulk flush leaves one line in an append-only CSV:
//! `document_count,elapsed_ms,had_errors`. It's not observability. It's a diary.
//! But it's a diary you can load into a spreadsheet at 3am, and that counts for something.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// 🧾 One flush, summarized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushStats {
    pub document_count: usize,
    pub elapsed_ms: u64,
    pub had_errors: bool,
}

impl fmt::Display for FlushStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{}",
            self.document_count, self.elapsed_ms, self.had_errors
        )
    }
}

/// 📓 The append-only log file. Opened once; every line is flushed as it's written.
#[derive(Debug)]
pub struct StatsLog {
    path: PathBuf,
    file: File,
}

impl StatsLog {
    /// 🚪 Open (or create) the log for appending. Failure here is fatal by design of the run:
    /// if we can't keep receipts, we don't go shopping.
    pub async fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .context(format!(
                "💀 The stats log '{}' could not be opened for appending. \
                 Check the directory exists and that we're allowed to write there.",
                path.display()
            ))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&mut self, stats: &FlushStats) -> Result<()> {
        let line = format!("{}\n", stats);
        self.file
            .write_all(line.as_bytes())
            .await
            .context(format!("💀 Could not append to '{}'", self.path.display()))?;
        self.file
            .flush()
            .await
            .context(format!("💀 Could not flush '{}'", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_stats_render_as_a_csv_line() {
        let stats = FlushStats {
            document_count: 8,
            elapsed_ms: 120,
            had_errors: false,
        };
        assert_eq!(stats.to_string(), "8,120,false");
    }

    #[tokio::test]
    async fn the_one_where_the_log_only_ever_grows() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("writeoutput.csv");

        let mut log = StatsLog::open(&path).await?;
        log.append(&FlushStats { document_count: 3, elapsed_ms: 5, had_errors: false })
            .await?;
        drop(log);

        let mut reopened = StatsLog::open(&path).await?;
        reopened
            .append(&FlushStats { document_count: 4, elapsed_ms: 6, had_errors: true })
            .await?;

        let contents = tokio::fs::read_to_string(&path).await?;
        assert_eq!(contents, "3,5,false\n4,6,true\n");
        Ok(())
    }
}
