//! Busy-Wait Delay
//!
//! The delay is deliberately synchronous: a nested loop of trivial work that
//! keeps the calling thread busy for its whole duration. It never sleeps and
//! never yields to the runtime, so whichever worker runs it is occupied until
//! it finishes.

use std::hint::black_box;

/// Something that occupies the calling thread for a while.
pub trait Delay: Send + Sync {
    fn run(&self);
}

/// A deterministic CPU-bound loop.
///
/// Each of the `outer * inner` iterations increments an integer, formats it
/// into a string and trims the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyWait {
    outer: u32,
    inner: u32,
}

impl BusyWait {
    /// Default outer loop bound
    pub const DEFAULT_OUTER: u32 = 100;

    /// Default inner loop bound
    pub const DEFAULT_INNER: u32 = 10_000_000;

    pub fn new(outer: u32, inner: u32) -> Self {
        Self { outer, inner }
    }

    /// Total number of inner iterations performed by one run.
    pub fn iterations(&self) -> u64 {
        self.outer as u64 * self.inner as u64
    }
}

impl Default for BusyWait {
    fn default() -> Self {
        Self::new(Self::DEFAULT_OUTER, Self::DEFAULT_INNER)
    }
}

impl Delay for BusyWait {
    fn run(&self) {
        for _ in 0..self.outer {
            for _ in 0..self.inner {
                let mut j = black_box(0u32);
                j += 1;
                let s = format!("{} ", j);
                black_box(s.trim());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_default_bounds() {
        let delay = BusyWait::default();
        assert_eq!(delay, BusyWait::new(100, 10_000_000));
        assert_eq!(delay.iterations(), 1_000_000_000);
    }

    #[test]
    fn test_zero_bounds_return_immediately() {
        BusyWait::new(0, 10_000_000).run();
        BusyWait::new(100, 0).run();
    }

    #[test]
    fn test_longer_loop_takes_longer() {
        let short = BusyWait::new(1, 1_000);
        let long = BusyWait::new(100, 10_000);

        let started = Instant::now();
        short.run();
        let short_elapsed = started.elapsed();

        let started = Instant::now();
        long.run();
        let long_elapsed = started.elapsed();

        assert!(long_elapsed > short_elapsed);
    }
}
