//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::{bus::BusKind, settings::SignalPreset};

/// Windwall coordinator: drives every motor on the bus at a fixed rate.
#[derive(Debug, Clone, Parser)]
#[command(name = "windwall-coordinator", version, about)]
pub struct Cli {
    /// TOML configuration file. Built-in defaults apply when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Control decisions per second.
    #[arg(long)]
    pub rate_hz: Option<u32>,

    /// Maximum output change per tick, in microseconds.
    #[arg(long)]
    pub slew_limit: Option<u16>,

    /// Stop after this many seconds. Runs until Ctrl+C when omitted.
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Bus driver.
    #[arg(long, value_enum, default_value_t = BusKind::Mock)]
    pub bus: BusKind,

    /// Signal preset, overriding the config file.
    #[arg(long, value_enum)]
    pub signal: Option<SignalPreset>,

    /// Log filter (e.g. `debug`, `windwall_core=trace`). Overrides `RUST_LOG`.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Interval between telemetry log lines, in milliseconds. 0 disables.
    #[arg(long, default_value_t = 100)]
    pub telemetry_interval_ms: u64,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["windwall-coordinator"]).unwrap();
        assert_eq!(cli.bus, BusKind::Mock);
        assert_eq!(cli.telemetry_interval_ms, 100);
        assert!(cli.config.is_none());
        assert!(cli.duration.is_none());
    }

    #[test]
    fn overrides_parse() {
        let cli = Cli::try_parse_from([
            "windwall-coordinator",
            "--config",
            "wall.toml",
            "--rate-hz",
            "200",
            "--slew-limit",
            "25",
            "--duration",
            "12.5",
            "--bus",
            "rpi",
            "--signal",
            "square-pulse",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("wall.toml")));
        assert_eq!(cli.rate_hz, Some(200));
        assert_eq!(cli.slew_limit, Some(25));
        assert_eq!(cli.duration, Some(12.5));
        assert_eq!(cli.bus, BusKind::Rpi);
        assert_eq!(cli.signal, Some(SignalPreset::SquarePulse));
    }
}
