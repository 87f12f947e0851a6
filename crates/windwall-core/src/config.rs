//! System configuration.
//!
//! Defaults describe the reference deployment: a 6x6 grid of 36 motors
//! driven by 4 nodes of 9 motors each, at 400 decisions per second.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use windwall_proto::{FrameEncoder, NodeAssignment, NodeTable, PulseMap, WireOrder};

use crate::{error::ConfigError, node::NodeConfig, shaper::MotorChannel};

/// Coordinator-side output range shared by every motor channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Lowest valid output (microseconds).
    /// Default: 1000
    pub min_us: u16,
    /// Highest valid output (microseconds).
    /// Default: 2000
    pub max_us: u16,
    /// Output before the first tick and the slew limiter's seed.
    /// Default: 1000
    pub idle_us: u16,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { min_us: 1000, max_us: 2000, idle_us: 1000 }
    }
}

/// Synchronization line timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Time the line is held asserted.
    /// Default: 10 us
    pub pulse_width_us: u64,
    /// Delay between the end of the frame and the rising edge, so every node
    /// has stored the last byte before it sees the edge.
    /// Default: 5 us
    pub settle_us: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { pulse_width_us: 10, settle_us: 5 }
    }
}

/// Node-side pulse mapping and timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Output for the `0` sentinel and for fail-safe.
    /// Default: 1000 us
    pub idle_us: u16,
    /// Output for byte `1`.
    /// Default: 1200 us
    pub active_min_us: u16,
    /// Output for byte `255`.
    /// Default: 2000 us
    pub active_max_us: u16,
    /// Silence on the sync line before a node forces idle.
    /// Default: 200 ms
    pub watchdog_ms: u64,
    /// Mid-frame byte silence before a node drops the partial frame.
    /// Must be shorter than one period.
    /// Default: 2000 us
    pub stall_us: u64,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            idle_us: 1000,
            active_min_us: 1200,
            active_max_us: 2000,
            watchdog_ms: 200,
            stall_us: 2000,
        }
    }
}

/// Complete system configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Motors on the bus (frame length).
    /// Default: 36
    pub n_motors: usize,
    /// Control decisions per second.
    /// Default: 400
    pub rate_hz: u32,
    /// Maximum output change per tick (microseconds).
    /// Default: 50
    pub slew_limit_us: u16,
    /// Coordinator output range.
    pub channel: ChannelConfig,
    /// Sync line timing.
    pub sync: SyncConfig,
    /// Node pulse mapping and timeouts.
    pub node: NodeSettings,
    /// Node table. Empty means 4 nodes splitting the motors evenly.
    pub nodes: Vec<NodeAssignment>,
    /// Wire position -> logical motor. `None` means identity.
    pub wire_order: Option<Vec<usize>>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            n_motors: 36,
            rate_hz: 400,
            slew_limit_us: 50,
            channel: ChannelConfig::default(),
            sync: SyncConfig::default(),
            node: NodeSettings::default(),
            nodes: Vec::new(),
            wire_order: None,
        }
    }
}

impl SystemConfig {
    /// Nodes used when no table is configured.
    pub const DEFAULT_NODE_COUNT: u8 = 4;

    /// Tick period.
    pub fn period(&self) -> Duration {
        Duration::from_secs(1) / self.rate_hz.max(1)
    }

    /// Sync pulse width.
    pub fn sync_pulse(&self) -> Duration {
        Duration::from_micros(self.sync.pulse_width_us)
    }

    /// Settling margin before the sync edge.
    pub fn sync_settle(&self) -> Duration {
        Duration::from_micros(self.sync.settle_us)
    }

    /// Node watchdog threshold.
    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.node.watchdog_ms)
    }

    /// Node stall timeout.
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_micros(self.node.stall_us)
    }

    /// Check every invariant the protocol relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_motors == 0 {
            return Err(ConfigError::invalid("n_motors", "must be at least 1"));
        }
        if self.rate_hz == 0 {
            return Err(ConfigError::invalid("rate_hz", "must be at least 1"));
        }
        if self.slew_limit_us == 0 {
            return Err(ConfigError::invalid("slew_limit_us", "must be at least 1"));
        }

        let ChannelConfig { min_us, max_us, idle_us } = self.channel;
        if min_us >= max_us {
            return Err(ConfigError::invalid(
                "channel",
                format!("min {min_us} must be below max {max_us}"),
            ));
        }
        if !(min_us..=max_us).contains(&idle_us) {
            return Err(ConfigError::invalid(
                "channel.idle_us",
                format!("{idle_us} outside {min_us}..={max_us}"),
            ));
        }

        let period = self.period();
        if self.sync_pulse() + self.sync_settle() >= period {
            return Err(ConfigError::invalid("sync", "pulse and settle must fit in one period"));
        }
        if self.stall_timeout().is_zero() || self.stall_timeout() >= period {
            return Err(ConfigError::invalid(
                "node.stall_us",
                format!("must be non-zero and shorter than the {period:?} period"),
            ));
        }
        if self.watchdog_timeout() <= period {
            return Err(ConfigError::invalid(
                "node.watchdog_ms",
                format!("must be longer than the {period:?} period"),
            ));
        }

        self.pulse_map()?;
        self.node_table()?;
        self.encoder()?;

        Ok(())
    }

    /// Coordinator channels, one per motor.
    pub fn channels(&self) -> Vec<MotorChannel> {
        let ChannelConfig { min_us, max_us, idle_us } = self.channel;
        (0..self.n_motors).map(|i| MotorChannel::new(i, min_us, max_us, idle_us)).collect()
    }

    /// Byte <-> pulse mapping shared by coordinator and nodes.
    pub fn pulse_map(&self) -> Result<PulseMap, ConfigError> {
        let NodeSettings { idle_us, active_min_us, active_max_us, .. } = self.node;
        Ok(PulseMap::new(idle_us, active_min_us, active_max_us)?)
    }

    /// Node table; the even default split if none is configured.
    pub fn node_table(&self) -> Result<NodeTable, ConfigError> {
        if self.nodes.is_empty() {
            let nodes = Self::DEFAULT_NODE_COUNT;
            if self.n_motors % usize::from(nodes) != 0 {
                return Err(ConfigError::invalid(
                    "nodes",
                    format!("{} motors do not split evenly over {nodes} nodes", self.n_motors),
                ));
            }
            return Ok(NodeTable::uniform(nodes, self.n_motors / usize::from(nodes)));
        }

        Ok(NodeTable::new(self.n_motors, self.nodes.clone())?)
    }

    /// Wire order permutation.
    pub fn wire_order(&self) -> Result<WireOrder, ConfigError> {
        let Some(order) = &self.wire_order else {
            return Ok(WireOrder::identity(self.n_motors));
        };

        let order = WireOrder::new(order.clone())?;
        if order.len() != self.n_motors {
            return Err(ConfigError::invalid(
                "wire_order",
                format!("has {} entries for {} motors", order.len(), self.n_motors),
            ));
        }
        Ok(order)
    }

    /// Frame encoder for the coordinator.
    pub fn encoder(&self) -> Result<FrameEncoder, ConfigError> {
        Ok(FrameEncoder::new(self.pulse_map()?, self.wire_order()?))
    }

    /// Per-node parser and watchdog configuration.
    pub fn node_config(&self) -> Result<NodeConfig, ConfigError> {
        Ok(NodeConfig {
            frame_len: self.n_motors,
            pulse_map: self.pulse_map()?,
            watchdog_timeout: self.watchdog_timeout(),
            stall_timeout: self.stall_timeout(),
        })
    }
}

#[cfg(test)]
mod tests {
    use windwall_proto::NodeId;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SystemConfig::default();
        config.validate().unwrap();

        assert_eq!(config.period(), Duration::from_micros(2500));
        assert_eq!(config.node_table().unwrap(), NodeTable::uniform(4, 9));
        assert_eq!(config.channels().len(), 36);
    }

    #[test]
    fn rejects_idle_outside_channel_range() {
        let config = SystemConfig {
            channel: ChannelConfig { min_us: 1100, max_us: 2000, idle_us: 1000 },
            ..SystemConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "channel.idle_us", .. })
        ));
    }

    #[test]
    fn rejects_stall_timeout_longer_than_period() {
        let config = SystemConfig {
            node: NodeSettings { stall_us: 3000, ..NodeSettings::default() },
            ..SystemConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "node.stall_us", .. })));
    }

    #[test]
    fn rejects_watchdog_shorter_than_period() {
        let config = SystemConfig {
            rate_hz: 2,
            node: NodeSettings { watchdog_ms: 100, stall_us: 1000, ..NodeSettings::default() },
            ..SystemConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "node.watchdog_ms", .. })
        ));
    }

    #[test]
    fn rejects_table_with_gap() {
        let config = SystemConfig {
            n_motors: 6,
            nodes: vec![
                NodeAssignment::new(NodeId(0), 0..2),
                NodeAssignment::new(NodeId(1), 3..6),
            ],
            ..SystemConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Protocol(_))));
    }

    #[test]
    fn rejects_wire_order_of_wrong_length() {
        let config = SystemConfig { wire_order: Some(vec![1, 0]), ..SystemConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "wire_order", .. })));
    }

    #[test]
    fn uneven_default_split_is_rejected() {
        let config = SystemConfig { n_motors: 10, ..SystemConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "nodes", .. })));
    }
}
