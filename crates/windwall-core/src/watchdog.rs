//! Node watchdog.
//!
//! Bounds how long a node may keep driving outputs without hearing a sync
//! edge.
//!
//! # State Machine
//!
//! ```text
//!            sync edge
//! ┌──────────┐ ──────────> ┌───────┐
//! │ FailSafe │             │ Armed │
//! └──────────┘ <────────── └───────┘
//!            silence > timeout
//! ```
//!
//! A node boots in `FailSafe`: it has never seen a sync edge, so it has no
//! authority to drive anything but idle.

use std::time::{Duration, Instant};

/// Output authority of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMode {
    /// Mirrors latched frames.
    Armed,
    /// Forces every owned output to idle.
    FailSafe,
}

/// Two-state sync watchdog.
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    last_sync: Instant,
    mode: NodeMode,
}

impl Watchdog {
    /// Create a watchdog in [`NodeMode::FailSafe`].
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self { timeout, last_sync: now, mode: NodeMode::FailSafe }
    }

    /// Current mode.
    pub fn mode(&self) -> NodeMode {
        self.mode
    }

    /// Expiry threshold.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time since the last sync edge (or since boot).
    pub fn silent_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_sync)
    }

    /// Record a sync edge.
    ///
    /// Returns `true` if this edge re-armed the node.
    pub fn feed(&mut self, now: Instant) -> bool {
        self.last_sync = now;
        let rearmed = self.mode == NodeMode::FailSafe;
        self.mode = NodeMode::Armed;
        rearmed
    }

    /// Check for expiry without changing state.
    ///
    /// Returns the silence duration if an armed node has exceeded the
    /// timeout.
    pub fn check_timeout(&self, now: Instant) -> Option<Duration> {
        if self.mode != NodeMode::Armed {
            return None;
        }

        let silent = self.silent_for(now);
        if silent > self.timeout { Some(silent) } else { None }
    }

    /// Check for expiry and drop to [`NodeMode::FailSafe`] if it happened.
    ///
    /// Returns the silence duration on the transition only.
    pub fn check(&mut self, now: Instant) -> Option<Duration> {
        let silent = self.check_timeout(now)?;
        self.mode = NodeMode::FailSafe;
        Some(silent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[test]
    fn boots_fail_safe() {
        let t0 = Instant::now();
        let mut watchdog = Watchdog::new(TIMEOUT, t0);
        assert_eq!(watchdog.mode(), NodeMode::FailSafe);

        // Nothing to expire from.
        assert_eq!(watchdog.check(t0 + Duration::from_secs(5)), None);
        assert_eq!(watchdog.mode(), NodeMode::FailSafe);
    }

    #[test]
    fn first_edge_arms() {
        let t0 = Instant::now();
        let mut watchdog = Watchdog::new(TIMEOUT, t0);

        assert!(watchdog.feed(t0));
        assert_eq!(watchdog.mode(), NodeMode::Armed);
        assert!(!watchdog.feed(t0 + Duration::from_millis(3)));
    }

    #[test]
    fn expires_strictly_after_timeout() {
        let t0 = Instant::now();
        let mut watchdog = Watchdog::new(TIMEOUT, t0);
        watchdog.feed(t0);

        assert_eq!(watchdog.check(t0 + TIMEOUT), None);
        assert_eq!(watchdog.mode(), NodeMode::Armed);

        let late = t0 + TIMEOUT + Duration::from_millis(1);
        assert_eq!(watchdog.check(late), Some(TIMEOUT + Duration::from_millis(1)));
        assert_eq!(watchdog.mode(), NodeMode::FailSafe);

        // Reported once.
        assert_eq!(watchdog.check(late + Duration::from_millis(50)), None);
    }

    #[test]
    fn edge_after_expiry_rearms() {
        let t0 = Instant::now();
        let mut watchdog = Watchdog::new(TIMEOUT, t0);
        watchdog.feed(t0);
        watchdog.check(t0 + Duration::from_millis(500));

        let t1 = t0 + Duration::from_millis(600);
        assert!(watchdog.feed(t1));
        assert_eq!(watchdog.mode(), NodeMode::Armed);
        assert_eq!(watchdog.check(t1 + Duration::from_millis(100)), None);
    }
}
