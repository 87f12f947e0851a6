//! Recording PWM output stage.

use windwall_core::node::Actuator;

/// Holds the pulse currently driven on every channel of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimActuator {
    pulses: Vec<u16>,
    writes: u64,
}

impl SimActuator {
    /// `channels` outputs, all starting at `initial`.
    pub fn new(channels: usize, initial: u16) -> Self {
        Self { pulses: vec![initial; channels], writes: 0 }
    }

    /// Driven pulse widths.
    pub fn pulses(&self) -> &[u16] {
        &self.pulses
    }

    /// Total `set_pulse` calls.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl Actuator for SimActuator {
    fn set_pulse(&mut self, channel: usize, pulse_us: u16) {
        if let Some(slot) = self.pulses.get_mut(channel) {
            *slot = pulse_us;
        }
        self.writes += 1;
    }
}
