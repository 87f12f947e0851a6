//! Clock abstraction.
//!
//! The coordinator loop needs exactly two things from the outside world's
//! notion of time: "what time is it" and "block until then". Production uses
//! [`SystemEnv`]; the harness provides a virtual clock that advances only
//! when asked to.

use std::time::{Duration, Instant};

/// Time source for the coordinator runtime.
pub trait Environment {
    /// Current time.
    fn now(&self) -> Instant;

    /// Block until `deadline`. Returns immediately if it already passed.
    fn wait_until(&self, deadline: Instant);

    /// Block for `duration`.
    fn wait(&self, duration: Duration) {
        self.wait_until(self.now() + duration);
    }
}

/// Wall-clock environment.
///
/// Sleeps through the bulk of a wait and spins for the final stretch, since
/// OS sleep granularity is far coarser than the microsecond-level sync pulse
/// and period discipline require.
#[derive(Debug, Clone)]
pub struct SystemEnv {
    spin_threshold: Duration,
}

impl SystemEnv {
    /// Create an environment that spins for the last `spin_threshold` of
    /// every wait.
    pub fn new(spin_threshold: Duration) -> Self {
        Self { spin_threshold }
    }
}

impl Default for SystemEnv {
    fn default() -> Self {
        Self::new(Duration::from_micros(500))
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wait_until(&self, deadline: Instant) {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return;
            }

            let remaining = deadline - now;
            if remaining > self.spin_threshold {
                std::thread::sleep(remaining - self.spin_threshold);
            } else {
                std::hint::spin_loop();
            }
        }
    }
}
