// AI
//! 📊 progress.rs — "Are we there yet?" — asked 23 billion times, answered once per chunk.
//!
//! 🚀 Tracks samples written against the target, bytes shipped, flushes, and the
//! flushes that went sideways. A progress bar and a comfy-table, because a stream of
//! log lines is not a dashboard no matter how many emojis it has.
//!
//! ⚠️ Watching this bar will not make the cluster ingest faster. We checked.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

use crate::batcher::BatcherTotals;

// -- 📏 one mebibyte. not a megabyte. we've had this argument before.
const MIB: u64 = 1024 * 1024;

/// 🔢 "1000000" → "1,000,000". Eyes rejoice.
pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS when the run has become a lifestyle.
pub(crate) fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📡 Throughput over the sliding window.
struct Rates {
    docs_per_sec: f64,
    mib_per_sec: f64,
}

/// 📊 Progress against the write target, rendered onto an indicatif bar.
///
/// Rates use a 5-second sliding window so one slow bulk doesn't look like the apocalypse.
pub(crate) struct ProgressMetrics {
    /// 🏷️ where the documents are going
    sink_name: String,
    /// 🎯 samples we intend to write
    target: u64,
    totals: BatcherTotals,
    progress_bar: ProgressBar,
    /// 🔄 (timestamp, bytes, docs)
    rate_samples: VecDeque<(Instant, u64, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and won't derive Debug
        f.debug_struct("ProgressMetrics")
            .field("sink_name", &self.sink_name)
            .field("target", &self.target)
            .field("totals", &self.totals)
            .finish()
    }
}

impl ProgressMetrics {
    /// 🚀 `visible = false` gives a hidden bar: same bookkeeping, no terminal art.
    pub(crate) fn new(sink_name: String, target: u64, visible: bool) -> Self {
        let progress_bar = if visible {
            ProgressBar::new(target)
        } else {
            ProgressBar::hidden()
        };
        // -- 🎨 a bad template only costs us the bar style, never the run
        if let Ok(style) = ProgressStyle::default_bar().template("{msg}\n| [{bar:40.cyan/blue}]")
        {
            progress_bar.set_style(style.progress_chars("=>-"));
        }

        let start_time = Instant::now();
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64, 0u64));

        Self {
            sink_name,
            target,
            totals: BatcherTotals::default(),
            progress_bar,
            rate_samples,
            start_time,
        }
    }

    /// 🔄 Feed the latest batcher totals in, re-render, move the bar.
    pub(crate) fn update(&mut self, totals: BatcherTotals) {
        self.totals = totals;
        let rates = self.calculate_rates();
        self.render(rates);
        self.progress_bar.set_position(self.written());
    }

    /// ✅ Ring the bell.
    pub(crate) fn finish(&self) {
        self.progress_bar.finish();
    }

    /// 📄 samples handed to the sink, bulk or single
    fn written(&self) -> u64 {
        self.totals.documents_added + self.totals.single_writes
    }

    fn calculate_rates(&mut self) -> Rates {
        let now = Instant::now();
        let window = Duration::from_secs(5);
        while let Some(&(timestamp, _, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > window {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }

        let written = self.written();
        self.rate_samples
            .push_back((now, self.totals.bytes_flushed, written));

        if let Some(&(oldest_time, oldest_bytes, oldest_docs)) = self.rate_samples.front() {
            let elapsed = now.duration_since(oldest_time).as_secs_f64();
            if elapsed > 0.0 {
                let bytes_delta = self.totals.bytes_flushed.saturating_sub(oldest_bytes);
                let docs_delta = written.saturating_sub(oldest_docs);
                return Rates {
                    docs_per_sec: docs_delta as f64 / elapsed,
                    mib_per_sec: (bytes_delta as f64 / elapsed) / MIB as f64,
                };
            }
        }

        // -- 💤 not enough history yet
        Rates {
            docs_per_sec: 0.0,
            mib_per_sec: 0.0,
        }
    }

    /// 🎨 Layout:
    /// ```text
    /// sink: <name>
    ///   <docs/s>        <written> / <target>
    ///   <MiB/s>         <flushes> flushes
    ///   <failed>        <percent>
    ///   <elapsed>       <remaining>
    /// | [=====>----------]
    /// ```
    fn render(&self, rates: Rates) {
        let written = self.written();
        let percent = if self.target > 0 {
            (written as f64 / self.target as f64) * 100.0
        } else {
            0.0
        };

        let elapsed = self.start_time.elapsed();
        let remaining = if percent > 0.0 {
            // 🔮 linear extrapolation. the future resembles the past until the cluster GCs.
            let total_estimated = elapsed.as_secs_f64() / (percent / 100.0);
            let remaining_secs = total_estimated - elapsed.as_secs_f64();
            if remaining_secs > 0.0 {
                format_duration(Duration::from_secs_f64(remaining_secs))
            } else {
                "--:--".to_string()
            }
        } else {
            "--:--".to_string()
        };

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);

        table.add_row(vec![
            Cell::new(format!("{} Docs/s", format_number(rates.docs_per_sec as u64)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!(
                "{} / {} Docs",
                format_number(written),
                format_number(self.target)
            ))
            .set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{:.2} MiB/s", rates.mib_per_sec))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} flushes", format_number(self.totals.flushes)))
                .set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} failed", format_number(self.totals.failed_flushes)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.4}%", percent)).set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} elapsed", format_duration(elapsed)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} remaining", remaining)).set_alignment(CellAlignment::Right),
        ]);

        self.progress_bar
            .set_message(format!("sink: {}\n{}", self.sink_name, table));
    }
}
