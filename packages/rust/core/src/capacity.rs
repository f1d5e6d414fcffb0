//! Processing budget shared by every pipeline of a manager.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically decreasing processing budget.
///
/// Slots are taken with [`try_acquire`](Self::try_acquire), a decrement that
/// floors at zero, so the remaining count can never go negative even when
/// several threads draw from the same budget.
#[derive(Debug)]
pub struct Capacity {
    initial: u64,
    remaining: AtomicU64,
}

impl Capacity {
    pub fn new(initial: u64) -> Self {
        Self {
            initial,
            remaining: AtomicU64::new(initial),
        }
    }

    /// Budget the manager started with.
    pub fn initial(&self) -> u64 {
        self.initial
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }

    /// Slots consumed so far.
    pub fn consumed(&self) -> u64 {
        self.initial - self.remaining()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Take one slot. Returns `false` and leaves the count at zero when the
    /// budget is exhausted.
    pub fn try_acquire(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn acquire_until_exhausted() {
        let capacity = Capacity::new(2);
        assert!(capacity.try_acquire());
        assert!(capacity.try_acquire());
        assert!(!capacity.try_acquire());
        assert_eq!(capacity.remaining(), 0);
        assert_eq!(capacity.consumed(), 2);
        assert!(capacity.is_exhausted());
    }

    #[test]
    fn zero_capacity_starts_exhausted() {
        let capacity = Capacity::new(0);
        assert!(capacity.is_exhausted());
        assert!(!capacity.try_acquire());
        assert_eq!(capacity.initial(), 0);
    }

    #[test]
    fn concurrent_acquires_never_overdraw() {
        let capacity = Arc::new(Capacity::new(100));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let capacity = Arc::clone(&capacity);
                std::thread::spawn(move || (0..50).filter(|_| capacity.try_acquire()).count())
            })
            .collect();

        let acquired: usize = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .sum();
        assert_eq!(acquired, 100);
        assert_eq!(capacity.remaining(), 0);
    }
}
