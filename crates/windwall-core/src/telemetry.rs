//! Read-only telemetry of the coordinator's last shaped outputs.
//!
//! A sequence lock over atomics: the control loop publishes without ever
//! waiting, readers retry if they raced a publish. An odd sequence number
//! means a publish is in progress.

use std::sync::{
    Arc,
    atomic::{AtomicU16, AtomicU64, Ordering, fence},
};

const READ_ATTEMPTS: usize = 64;

#[derive(Debug)]
struct Shared {
    seq: AtomicU64,
    tick: AtomicU64,
    pulses: Box<[AtomicU16]>,
}

/// Consistent copy of one published tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// Tick the outputs were transmitted on
    pub tick: u64,
    /// Output per motor (microseconds)
    pub pulses: Vec<u16>,
}

impl TelemetrySnapshot {
    /// Mean output across all motors.
    pub fn mean(&self) -> f64 {
        if self.pulses.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.pulses.iter().map(|&p| u64::from(p)).sum();
        sum as f64 / self.pulses.len() as f64
    }
}

/// Writer side, owned by the control loop.
#[derive(Debug)]
pub struct TelemetryBuffer {
    shared: Arc<Shared>,
}

impl TelemetryBuffer {
    /// Create a buffer for `n_motors` outputs. Nothing is published yet.
    pub fn new(n_motors: usize) -> Self {
        let pulses = (0..n_motors).map(|_| AtomicU16::new(0)).collect();
        Self {
            shared: Arc::new(Shared { seq: AtomicU64::new(0), tick: AtomicU64::new(0), pulses }),
        }
    }

    /// Publish the outputs transmitted on `tick`. Never blocks.
    ///
    /// Extra values are ignored, missing ones keep their previous value.
    pub fn publish(&mut self, tick: u64, pulses: &[u16]) {
        let shared = &self.shared;
        let seq = shared.seq.load(Ordering::Relaxed);

        shared.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        shared.tick.store(tick, Ordering::Relaxed);
        for (slot, &pulse) in shared.pulses.iter().zip(pulses) {
            slot.store(pulse, Ordering::Relaxed);
        }

        shared.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// A reader handle. Any number may exist.
    pub fn reader(&self) -> TelemetryReader {
        TelemetryReader { shared: Arc::clone(&self.shared) }
    }
}

/// Reader side, cheap to clone and safe to use from any thread.
#[derive(Debug, Clone)]
pub struct TelemetryReader {
    shared: Arc<Shared>,
}

impl TelemetryReader {
    /// Number of motors.
    pub fn len(&self) -> usize {
        self.shared.pulses.len()
    }

    /// True if there are no motors.
    pub fn is_empty(&self) -> bool {
        self.shared.pulses.is_empty()
    }

    /// Latest consistent snapshot.
    ///
    /// `None` if nothing has been published yet, or if every attempt raced a
    /// publish (the writer is far faster than any sensible reader, so this
    /// only happens under extreme contention).
    pub fn snapshot(&self) -> Option<TelemetrySnapshot> {
        let shared = &self.shared;
        let mut pulses = vec![0; shared.pulses.len()];

        for _ in 0..READ_ATTEMPTS {
            let before = shared.seq.load(Ordering::Acquire);
            if before == 0 {
                return None;
            }
            if before % 2 == 1 {
                std::hint::spin_loop();
                continue;
            }

            let tick = shared.tick.load(Ordering::Relaxed);
            for (out, slot) in pulses.iter_mut().zip(shared.pulses.iter()) {
                *out = slot.load(Ordering::Relaxed);
            }

            fence(Ordering::Acquire);
            if shared.seq.load(Ordering::Relaxed) == before {
                return Some(TelemetrySnapshot { tick, pulses });
            }
        }

        None
    }
}
