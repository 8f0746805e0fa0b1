// ai
//! 📂 Descriptors — the guest list. One CSV line per dataset we're about to fake.
//!
//! `domain,dataset_uid,column_count`. That's the whole format. No header, no quotes
//! required (but the `csv` crate will happily eat them if someone adds some).
//!
//! The file is streamed line by line through a tokio `BufReader`. Each line gets its
//! own tiny csv parse, so a 40GB guest list costs one line of memory, not 40GB. 🦆
//!
//! 💀 Can't open the file → fatal, the run aborts. Can't parse a line → logged, skipped.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::{trace, warn};

/// 🪪 One dataset to fake: where its count lives, who it is, how wide it is.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetDescriptor {
    pub domain: String,
    pub dataset_uid: String,
    pub column_count: u64,
}

/// 🔍 Parse one CSV line. Blank lines are `Ok(None)`. Everything else either parses or errors.
///
/// The csv reader only honors a quote at the very start of a field, so ` "a.com" ` comes
/// back as `"a.com"` after trimming. Any quote pair that survives the trim is peeled here.
pub fn parse_line(line: &str) -> Result<Option<DatasetDescriptor>> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    let Some(record) = reader.records().next() else {
        return Ok(None);
    };
    let record = record.context(format!("💀 '{}' is not even CSV", line))?;
    let unquoted: csv::StringRecord = record.iter().map(strip_quotes).collect();
    let descriptor = unquoted.deserialize::<DatasetDescriptor>(None).context(format!(
        "💀 '{}' is not `domain,dataset_uid,column_count`",
        line
    ))?;
    Ok(Some(descriptor))
}

fn strip_quotes(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .map(str::trim)
        .unwrap_or(field)
}

/// 📖 Streams descriptors out of a CSV file, one line at a time.
#[derive(Debug)]
pub struct DescriptorReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: u64,
}

impl DescriptorReader {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).await.context(format!(
            "💀 The descriptor file '{}' could not be opened. No guest list, no party.",
            path.display()
        ))?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_number: 0,
        })
    }

    /// 📦 The next well-formed descriptor, or `None` at end of file.
    pub async fn next_descriptor(&mut self) -> Result<Option<DatasetDescriptor>> {
        loop {
            let line = self.lines.next_line().await.context(format!(
                "💀 Reading '{}' failed around line {}",
                self.path.display(),
                self.line_number + 1
            ))?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_number += 1;

            match parse_line(&line) {
                Ok(Some(descriptor)) => {
                    trace!("📄 line {}: {:?}", self.line_number, descriptor);
                    return Ok(Some(descriptor));
                }
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        "⚠️ skipping line {} of '{}': {:#}",
                        self.line_number,
                        self.path.display(),
                        err
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn the_one_where_a_plain_line_becomes_a_descriptor() -> Result<()> {
        let descriptor = parse_line("data.example.com,abcd-1234,12")?;
        assert_eq!(
            descriptor,
            Some(DatasetDescriptor {
                domain: "data.example.com".to_string(),
                dataset_uid: "abcd-1234".to_string(),
                column_count: 12,
            })
        );
        Ok(())
    }

    #[test]
    fn the_one_where_quotes_and_spaces_are_forgiven() -> Result<()> {
        let descriptor = parse_line(r#" "data.example.com" , abcd-1234 , 3 "#)?
            .expect("💀 should have parsed");
        assert_eq!(descriptor.domain, "data.example.com");
        assert_eq!(descriptor.column_count, 3);

        let tidy = parse_line(r#""data.example.com","abcd-1234","3""#)?
            .expect("💀 properly quoted fields should parse too");
        assert_eq!(tidy, descriptor);
        Ok(())
    }

    #[test]
    fn the_one_where_garbage_lines_are_errors_and_blank_lines_are_nothing() -> Result<()> {
        assert!(parse_line("data.example.com,abcd-1234,many").is_err());
        assert!(parse_line("just-one-field").is_err());
        assert_eq!(parse_line("   ")?, None);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_reader_skips_the_bad_apples() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "a.example.com,aaaa-1111,1")?;
        writeln!(file, "this line is a lie")?;
        writeln!(file)?;
        writeln!(file, "b.example.com,bbbb-2222,2")?;
        file.flush()?;

        let mut reader = DescriptorReader::open(file.path()).await?;
        let first = reader.next_descriptor().await?.expect("💀 first descriptor");
        let second = reader.next_descriptor().await?.expect("💀 second descriptor");
        assert_eq!(first.dataset_uid, "aaaa-1111");
        assert_eq!(second.dataset_uid, "bbbb-2222");
        assert_eq!(second.column_count, 2);
        assert!(reader.next_descriptor().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_missing_file_is_fatal() {
        let result = DescriptorReader::open(Path::new("/definitely/not/here.csv")).await;
        assert!(result.is_err());
    }
}
