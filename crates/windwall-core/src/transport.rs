//! Bus abstraction.
//!
//! The bus is two independent signals broadcast to every node: a clocked
//! byte stream and a single synchronization line. Production uses SPI plus a
//! GPIO pin; tests use a simulated bus feeding in-process nodes.

use std::time::Duration;

use windwall_proto::Frame;

/// Coordinator side of the actuation bus.
///
/// Both operations must complete in bounded time: the control loop calls
/// them from inside its fixed period and never retries.
pub trait Bus {
    /// Transport specific error.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Clock every byte of `frame` onto the bus.
    ///
    /// Must not return until the last byte has left the coordinator, because
    /// the sync pulse that follows is only safe once the frame is complete.
    fn write_frame(&mut self, frame: &Frame) -> Result<(), Self::Error>;

    /// Assert the synchronization line for `width`, then release it.
    fn pulse_sync(&mut self, width: Duration) -> Result<(), Self::Error>;
}
