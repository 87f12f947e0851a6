//! Frames and the coordinator-side encoder.

use bytes::Bytes;

use crate::{
    errors::{ProtocolError, Result},
    pulse::PulseMap,
    wire_order::WireOrder,
};

/// One tick's commanded state: exactly one byte per motor, in wire order.
///
/// Backed by [`Bytes`] so a broadcast to several nodes shares one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Wrap raw bytes, checking the length against the motor count.
    ///
    /// # Errors
    ///
    /// `FrameLength` if `bytes` is not exactly `n_motors` long.
    pub fn new(bytes: impl Into<Bytes>, n_motors: usize) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() != n_motors {
            return Err(ProtocolError::FrameLength { expected: n_motors, actual: bytes.len() });
        }
        Ok(Self { bytes })
    }

    /// A frame with every motor set to the same byte.
    pub fn filled(n_motors: usize, byte: u8) -> Self {
        Self { bytes: Bytes::from(vec![byte; n_motors]) }
    }

    /// Raw bytes in wire order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of motors in the frame.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for a zero-motor frame.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Iterate bytes in wire order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.bytes.iter().copied()
    }
}

/// Serializes a vector of pulse widths (logical motor order) into a frame.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    pulse_map: PulseMap,
    wire_order: WireOrder,
}

impl FrameEncoder {
    /// Create an encoder. The frame length is the wire order's length.
    pub fn new(pulse_map: PulseMap, wire_order: WireOrder) -> Self {
        Self { pulse_map, wire_order }
    }

    /// Motor count of produced frames.
    pub fn n_motors(&self) -> usize {
        self.wire_order.len()
    }

    /// Quantize and reorder one tick's pulse widths.
    ///
    /// # Errors
    ///
    /// `FrameLength` if `pulses` does not have one entry per motor.
    pub fn encode(&self, pulses: &[u16]) -> Result<Frame> {
        if pulses.len() != self.wire_order.len() {
            return Err(ProtocolError::FrameLength {
                expected: self.wire_order.len(),
                actual: pulses.len(),
            });
        }

        let bytes: Vec<u8> =
            self.wire_order.iter().map(|motor| self.pulse_map.encode(pulses[motor])).collect();

        Ok(Frame { bytes: Bytes::from(bytes) })
    }
}
