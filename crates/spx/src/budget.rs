//! 🎯 The write budget: a single shared counter between the generators and the finish line.
//!
//! Generators reserve samples before producing them. Reservations never overshoot the
//! target, so the total written is exactly `min(target, everything the input could produce)`
//! no matter how many generator workers are racing for the last few slots.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct WriteBudget {
    target: u64,
    reserved: AtomicU64,
}

impl WriteBudget {
    pub fn new(target: u64) -> Self {
        Self {
            target,
            reserved: AtomicU64::new(0),
        }
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    /// 🎟️ Ask for up to `wanted` samples. Returns how many were granted (0 once spent).
    pub fn reserve(&self, wanted: u64) -> u64 {
        let target = self.target;
        match self
            .reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |reserved| {
                if reserved >= target || wanted == 0 {
                    None
                } else {
                    Some(reserved.saturating_add(wanted).min(target))
                }
            }) {
            Ok(previous) => previous.saturating_add(wanted).min(target) - previous,
            Err(_) => 0,
        }
    }

    pub fn reserved(&self) -> u64 {
        self.reserved.load(Ordering::Acquire)
    }

    pub fn is_exhausted(&self) -> bool {
        self.reserved() >= self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn the_one_where_the_last_slice_is_a_small_one() {
        let budget = WriteBudget::new(10);
        assert_eq!(budget.reserve(4), 4);
        assert_eq!(budget.reserve(4), 4);
        assert_eq!(budget.reserve(4), 2);
        assert_eq!(budget.reserve(4), 0);
        assert!(budget.is_exhausted());
        assert_eq!(budget.reserved(), 10);
    }

    #[test]
    fn the_one_where_a_zero_target_is_spent_on_arrival() {
        let budget = WriteBudget::new(0);
        assert!(budget.is_exhausted());
        assert_eq!(budget.reserve(1), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn the_one_where_eight_workers_fight_over_a_thousand_slots() {
        let budget = Arc::new(WriteBudget::new(1_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let budget = Arc::clone(&budget);
                tokio::spawn(async move {
                    let mut granted = 0;
                    loop {
                        let slice = budget.reserve(7);
                        if slice == 0 {
                            return granted;
                        }
                        granted += slice;
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        let mut total = 0;
        for handle in handles {
            total += handle.await.expect("💀 a budget worker panicked");
        }
        assert_eq!(total, 1_000);
    }
}
