//! 🧵 Workers: the ones who actually do the work while the Supervisor takes all the
//! credit in the sprint retro.
//!
//! Three kinds, one pipeline:
//!
//! ```text
//! DescriptorWorker ──descriptors──▶ GeneratorWorker × N ──SampleBatch──▶ SinkWorker
//!   (reads the CSV, pass after pass)   (factories + budget)              (BulkBatcher)
//! ```
//!
//! Every channel is a bounded `async_channel`. When a downstream worker quits, the
//! upstream `send` fails and the upstream worker winds down quietly. When an upstream
//! worker finishes, it drops its sender and the downstream `recv` drains then stops. 🦆

use anyhow::Result;
use tokio::task::JoinHandle;

mod descriptor_worker;
mod generator_worker;
mod sink_worker;

pub(crate) use descriptor_worker::DescriptorWorker;
pub(crate) use generator_worker::GeneratorWorker;
pub(crate) use sink_worker::SinkWorker;

/// 🏗️ A background worker, that does work. duh.
///
/// "What's the DEAL with lifetime annotations? You borrow something,
///  you give it back. It's not that hard, Jerry!" — Seinfeld, on Rust
pub(crate) trait Worker {
    /// 📊 what the worker reports back when it clocks out
    type Output: Send + 'static;

    /// 🚀 Start the worker. Returns a JoinHandle because we trust but verify.
    fn start(self) -> JoinHandle<Result<Self::Output>>;
}
