//! 📖 DescriptorWorker — reads the guest list, then reads it again, then again.
//!
//! One pass = one trip through the descriptor CSV. Passes repeat until the write budget
//! is spent, `max_passes` is reached, or everybody downstream has gone home.
//!
//! Two kinds of pass end the run with an error, because looping over them forever is
//! how you heat a data center for nothing:
//! - a pass that yields zero descriptors (empty file, or every line is garbage)
//! - a pass whose descriptors all yield zero samples (row count 0, zero columns)
//!
//! The second one needs the generators' help. If nothing was reserved from the budget
//! while a pass was being sent, the reader waits until the generators report every
//! descriptor so far as handled, then looks at the budget again.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_channel::Sender;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::Worker;
use crate::budget::WriteBudget;
use crate::descriptors::{DatasetDescriptor, DescriptorReader};

/// 📊 What the reader got through before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DescriptorTally {
    pub(crate) passes: u32,
    pub(crate) descriptors: u64,
}

#[derive(Debug)]
pub(crate) struct DescriptorWorker {
    input_file: PathBuf,
    max_passes: Option<u32>,
    budget: Arc<WriteBudget>,
    tx: Sender<DatasetDescriptor>,
    /// 🧾 how many descriptors the generators have finished with
    processed: watch::Receiver<u64>,
}

impl DescriptorWorker {
    pub(crate) fn new(
        input_file: PathBuf,
        max_passes: Option<u32>,
        budget: Arc<WriteBudget>,
        tx: Sender<DatasetDescriptor>,
        processed: watch::Receiver<u64>,
    ) -> Self {
        Self {
            input_file,
            max_passes,
            budget,
            tx,
            processed,
        }
    }

    fn passes_exhausted(&self, passes: u32) -> bool {
        self.max_passes.is_some_and(|max| passes >= max)
    }

    /// ⏳ Wait until the generators have handled `sent` descriptors.
    /// `false` means every generator has already left.
    async fn generators_caught_up(&mut self, sent: u64) -> bool {
        self.processed.wait_for(|done| *done >= sent).await.is_ok()
    }
}

impl Worker for DescriptorWorker {
    type Output = DescriptorTally;

    fn start(mut self) -> JoinHandle<Result<DescriptorTally>> {
        tokio::spawn(async move {
            let mut tally = DescriptorTally::default();
            loop {
                if self.budget.is_exhausted() || self.passes_exhausted(tally.passes) {
                    break;
                }

                let mut reader = DescriptorReader::open(&self.input_file)
                    .await
                    .context("💀 DescriptorWorker could not start a pass")?;
                tally.passes += 1;
                info!("📖 pass {} over '{}'", tally.passes, self.input_file.display());
                let reserved_at_start = self.budget.reserved();

                let mut this_pass = 0u64;
                while let Some(descriptor) = reader.next_descriptor().await? {
                    if self.budget.is_exhausted() {
                        debug!("🎯 budget spent mid-pass, DescriptorWorker clocking out");
                        return Ok(tally);
                    }
                    if self.tx.send(descriptor).await.is_err() {
                        debug!("🏁 nobody is listening for descriptors anymore");
                        return Ok(tally);
                    }
                    this_pass += 1;
                    tally.descriptors += 1;
                }

                if this_pass == 0 {
                    anyhow::bail!(
                        "💀 '{}' produced zero usable descriptors on pass {}. \
                         Nothing to generate, and we refuse to spin on an empty file.",
                        self.input_file.display(),
                        tally.passes
                    );
                }

                if self.budget.reserved() == reserved_at_start {
                    // -- 🤔 nothing reserved yet: slow generators, or nothing to generate?
                    if !self.generators_caught_up(tally.descriptors).await {
                        debug!("🏁 every generator has left, DescriptorWorker follows");
                        return Ok(tally);
                    }
                    if self.budget.reserved() == reserved_at_start && !self.budget.is_exhausted() {
                        anyhow::bail!(
                            "💀 pass {} over '{}' sent {} descriptors and not one of them produced \
                             a sample. Row counts of 0, or zero columns under exclusive bounds? \
                             Another pass would produce nothing again.",
                            tally.passes,
                            self.input_file.display(),
                            this_pass
                        );
                    }
                }
            }
            debug!("🏁 DescriptorWorker done: {:?}", tally);
            Ok(tally)
        })
    }
}
