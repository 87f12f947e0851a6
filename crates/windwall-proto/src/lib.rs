//! Wire format for the windwall actuation bus.
//!
//! One coordinator broadcasts a continuous byte stream to every actuation
//! node. The stream is logically cut into frames of exactly `n_motors` bytes,
//! one byte per motor, and the motor a byte belongs to is implied by its
//! position in the frame. There is no header, no addressing and no checksum:
//! a separate synchronization line tells every node when a frame is complete.
//!
//! We chose positional addressing over tagged (address + value) framing
//! because it halves the bytes on the wire and leaves the parser with a
//! single counter of state. Which positions a node listens to is described by
//! the [`NodeTable`], so a different addressing scheme only has to provide
//! another [`Addressing`] implementation.
//!
//! # Byte values
//!
//! Byte `0` is the idle sentinel ("stop / disarmed"). Bytes `1..=255` map
//! linearly onto the active pulse range. See [`PulseMap`].
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod assignment;
pub mod errors;
pub mod frame;
pub mod pulse;
pub mod wire_order;

pub use assignment::{Addressing, NodeAssignment, NodeId, NodeTable};
pub use errors::{ProtocolError, Result};
pub use frame::{Frame, FrameEncoder};
pub use pulse::PulseMap;
pub use wire_order::WireOrder;
