//! Logical motor order vs. order on the wire.
//!
//! Motors are numbered by their place in the grid, but the wiring to the
//! nodes does not have to follow grid order: a node driving one quadrant owns
//! motors that are not adjacent in grid numbering. The wire order is a
//! permutation where wire position `i` carries logical motor `order[i]`.
//! Nodes only ever see wire positions.

use crate::errors::{ProtocolError, Result};

/// Permutation from wire position to logical motor index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireOrder {
    order: Vec<usize>,
}

impl WireOrder {
    /// Wire position `i` carries motor `i`.
    pub fn identity(n_motors: usize) -> Self {
        Self { order: (0..n_motors).collect() }
    }

    /// Validate a permutation.
    ///
    /// # Errors
    ///
    /// `InvalidWireOrder` if an index is out of range or repeated.
    pub fn new(order: Vec<usize>) -> Result<Self> {
        let len = order.len();
        let mut seen = vec![false; len];

        for &motor in &order {
            let Some(flag) = seen.get_mut(motor) else {
                return Err(ProtocolError::InvalidWireOrder {
                    len,
                    reason: format!("motor {motor} out of range"),
                });
            };
            if *flag {
                return Err(ProtocolError::InvalidWireOrder {
                    len,
                    reason: format!("motor {motor} appears twice"),
                });
            }
            *flag = true;
        }

        Ok(Self { order })
    }

    /// Frame length.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True for an empty permutation.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Logical motor carried at a wire position.
    pub fn motor_at(&self, position: usize) -> Option<usize> {
        self.order.get(position).copied()
    }

    /// Wire position of a logical motor.
    pub fn position_of(&self, motor: usize) -> Option<usize> {
        self.order.iter().position(|&m| m == motor)
    }

    /// Iterate logical motor indices in wire order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().copied()
    }
}
