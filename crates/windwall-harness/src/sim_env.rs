//! Virtual clock and seeded randomness.
//!
//! Clones share one clock, so the runtime, the bus and the test body all see
//! the same time. Time only moves when someone waits or calls
//! [`SimEnv::advance`].

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use windwall_core::env::Environment;

/// Simulated environment.
#[derive(Debug, Clone)]
pub struct SimEnv {
    base: Instant,
    nanos: Arc<AtomicU64>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Environment with seed 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment with a fixed RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            base: Instant::now(),
            nanos: Arc::new(AtomicU64::new(0)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Time since the environment was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::AcqRel);
    }

    /// True with probability `p`.
    pub fn chance(&self, p: f64) -> bool {
        p > 0.0 && self.rng.lock().unwrap_or_else(PoisonError::into_inner).gen_bool(p.min(1.0))
    }

    /// Uniform random byte.
    pub fn random_byte(&self) -> u8 {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).r#gen()
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn wait_until(&self, deadline: Instant) {
        let now = self.now();
        if deadline > now {
            self.advance(deadline - now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::new();
        let other = env.clone();
        let start = env.now();

        other.advance(Duration::from_millis(3));
        assert_eq!(env.now() - start, Duration::from_millis(3));
    }

    #[test]
    fn wait_until_jumps_forward_only() {
        let env = SimEnv::new();
        let start = env.now();

        env.wait_until(start + Duration::from_micros(2500));
        assert_eq!(env.elapsed(), Duration::from_micros(2500));

        env.wait_until(start);
        assert_eq!(env.elapsed(), Duration::from_micros(2500));
    }

    #[test]
    fn same_seed_same_noise() {
        let a = SimEnv::with_seed(42);
        let b = SimEnv::with_seed(42);
        let xs: Vec<u8> = (0..16).map(|_| a.random_byte()).collect();
        let ys: Vec<u8> = (0..16).map(|_| b.random_byte()).collect();
        assert_eq!(xs, ys);
    }
}
