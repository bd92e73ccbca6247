//! Command classification and handlers.

pub mod attendance;
pub mod confirm;
pub mod dice;
pub mod dispatch;
pub mod explore;
pub mod oracle;

pub use dispatch::{Command, Dispatcher};

use rand::Rng;

/// Randomness seam so handler outcomes are testable.
pub trait Roller: Send + Sync {
    /// Uniform die roll in `[1, sides]`.
    fn die(&self, sides: u32) -> u32;

    /// Fair coin.
    fn flip(&self) -> bool;

    /// Uniform integer in `[lo, hi]`.
    fn range(&self, lo: i64, hi: i64) -> i64;

    /// Uniform index in `[0, n)`.
    fn choose(&self, n: usize) -> usize;
}

/// Production roller over the thread-local RNG.
pub struct ThreadRngRoller;

impl Roller for ThreadRngRoller {
    fn die(&self, sides: u32) -> u32 {
        rand::thread_rng().gen_range(1..=sides.max(1))
    }

    fn flip(&self) -> bool {
        rand::thread_rng().gen_range(0..2) == 1
    }

    fn range(&self, lo: i64, hi: i64) -> i64 {
        rand::thread_rng().gen_range(lo..=hi.max(lo))
    }

    fn choose(&self, n: usize) -> usize {
        rand::thread_rng().gen_range(0..n.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_rng_roller_stays_in_bounds() {
        let roller = ThreadRngRoller;
        for _ in 0..100 {
            let d = roller.die(6);
            assert!((1..=6).contains(&d));
            let r = roller.range(3, 7);
            assert!((3..=7).contains(&r));
            assert!(roller.choose(4) < 4);
        }
    }
}
