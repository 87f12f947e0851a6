//! Protocol error types.

use thiserror::Error;

/// Result alias for wire format operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while building or validating wire format structures.
///
/// None of these can occur on the wire itself: the stream has no framing to
/// violate. They are raised when configuration or caller input does not fit
/// the fixed frame geometry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A frame or output vector does not have one entry per motor.
    #[error("frame length {actual} does not match motor count {expected}")]
    FrameLength {
        /// Motor count the frame must carry
        expected: usize,
        /// Length actually supplied
        actual: usize,
    },

    /// Pulse map constants are not ordered `idle <= active_min < active_max`.
    #[error("invalid pulse map: idle {idle}us, active {active_min}..={active_max}us")]
    InvalidPulseMap {
        /// Idle (sentinel) pulse width
        idle: u16,
        /// Lowest active pulse width
        active_min: u16,
        /// Highest active pulse width
        active_max: u16,
    },

    /// A motor index is not owned by any node.
    #[error("motor index {index} is not assigned to any node")]
    AssignmentGap {
        /// First unassigned motor index
        index: usize,
    },

    /// A motor index is owned by more than one node.
    #[error("motor index {index} is assigned to more than one node")]
    AssignmentOverlap {
        /// First doubly assigned motor index
        index: usize,
    },

    /// A node range reaches past the last motor.
    #[error("node {node} range {start}..{end} exceeds motor count {n_motors}")]
    AssignmentOutOfRange {
        /// Offending node
        node: u8,
        /// Range start
        start: usize,
        /// Range end (exclusive)
        end: usize,
        /// Total motor count
        n_motors: usize,
    },

    /// A node owns no motors.
    #[error("node {node} has an empty motor range")]
    EmptyAssignment {
        /// Offending node
        node: u8,
    },

    /// The same node identity appears twice in a table.
    #[error("node {node} is listed more than once")]
    DuplicateNode {
        /// Offending node
        node: u8,
    },

    /// A wire order is not a permutation of `0..len`.
    #[error("wire order is not a permutation of 0..{len}: {reason}")]
    InvalidWireOrder {
        /// Expected permutation length
        len: usize,
        /// What is wrong with it
        reason: String,
    },
}
