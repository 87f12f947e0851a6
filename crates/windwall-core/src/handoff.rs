//! Sync edge handoff between interrupt and main-loop contexts.
//!
//! The edge detector runs in interrupt context and must never touch the
//! frame buffers. It only flips a flag from `Consumed` to `Fresh`; the main
//! loop flips it back and does the buffer copy itself. One writer per
//! direction, no lock.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

const CONSUMED: u8 = 0;
const FRESH: u8 = 1;

/// Single-flag edge mailbox.
#[derive(Debug, Default)]
pub struct SyncEdge {
    state: AtomicU8,
    edges: AtomicU64,
    coalesced: AtomicU64,
}

impl SyncEdge {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an edge. Safe to call from interrupt context.
    ///
    /// Edges arriving before the main loop took the previous one collapse
    /// into a single pending edge.
    pub fn signal(&self) {
        self.edges.fetch_add(1, Ordering::Relaxed);
        if self.state.swap(FRESH, Ordering::Release) == FRESH {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Consume a pending edge, if any.
    ///
    /// Everything written before the matching [`SyncEdge::signal`] is
    /// visible after this returns `true`.
    pub fn take(&self) -> bool {
        self.state.swap(CONSUMED, Ordering::Acquire) == FRESH
    }

    /// True if an edge is waiting.
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == FRESH
    }

    /// Edges signalled since creation.
    pub fn edges(&self) -> u64 {
        self.edges.load(Ordering::Relaxed)
    }

    /// Edges that landed on an already pending edge.
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn take_consumes_once() {
        let edge = SyncEdge::new();
        assert!(!edge.take());

        edge.signal();
        assert!(edge.is_pending());
        assert!(edge.take());
        assert!(!edge.take());
    }

    #[test]
    fn double_signal_coalesces() {
        let edge = SyncEdge::new();
        edge.signal();
        edge.signal();

        assert!(edge.take());
        assert!(!edge.take());
        assert_eq!(edge.edges(), 2);
        assert_eq!(edge.coalesced(), 1);
    }

    #[test]
    fn edges_from_another_thread_are_seen() {
        let edge = Arc::new(SyncEdge::new());
        let isr = Arc::clone(&edge);

        let handle = thread::spawn(move || {
            for _ in 0..1000 {
                isr.signal();
            }
        });
        handle.join().unwrap();

        assert!(edge.take());
        assert_eq!(edge.edges(), 1000);
        assert_eq!(edge.coalesced(), 999);
    }
}
