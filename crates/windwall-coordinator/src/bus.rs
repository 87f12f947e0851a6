//! Bus drivers for the coordinator process.
//!
//! [`MockBus`] accepts everything and is the default when no hardware is
//! attached. `RpiBus` (feature `rpi`, Linux only) clocks frames out of SPI0
//! at 1 MHz and drives the sync line from a GPIO pin.

use std::time::Duration;

use clap::ValueEnum;
use thiserror::Error;
use tracing::debug;
use windwall_core::transport::Bus;
use windwall_proto::Frame;

/// Frames between mock bus log lines.
pub const MOCK_LOG_INTERVAL: u64 = 400;

/// Bus driver failures.
#[derive(Debug, Error)]
pub enum BusError {
    /// The requested driver was not compiled in.
    #[error("{0} bus support is not available in this build")]
    Unavailable(&'static str),

    /// The SPI driver accepted fewer bytes than requested.
    #[error("short SPI write: {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes accepted
        written: usize,
        /// Bytes requested
        expected: usize,
    },

    /// SPI failure.
    #[cfg(all(feature = "rpi", target_os = "linux"))]
    #[error("SPI: {0}")]
    Spi(#[from] rppal::spi::Error),

    /// GPIO failure.
    #[cfg(all(feature = "rpi", target_os = "linux"))]
    #[error("GPIO: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

/// Driver selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BusKind {
    /// In-process stand-in, no hardware
    #[default]
    Mock,
    /// Raspberry Pi SPI0 + GPIO sync line
    Rpi,
}

/// Bus that accepts every frame.
#[derive(Debug, Default)]
pub struct MockBus {
    frames: u64,
    syncs: u64,
    last: Option<Frame>,
}

impl MockBus {
    /// Create an empty mock bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames written.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Sync pulses issued.
    pub fn syncs(&self) -> u64 {
        self.syncs
    }

    /// Most recent frame.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last.as_ref()
    }
}

impl Bus for MockBus {
    type Error = BusError;

    fn write_frame(&mut self, frame: &Frame) -> Result<(), BusError> {
        self.frames += 1;
        self.last = Some(frame.clone());
        Ok(())
    }

    fn pulse_sync(&mut self, _width: Duration) -> Result<(), BusError> {
        self.syncs += 1;
        if self.syncs % MOCK_LOG_INTERVAL == 0 {
            debug!(frames = self.frames, syncs = self.syncs, "mock bus: frame broadcast, sync sent");
        }
        Ok(())
    }
}

#[cfg(all(feature = "rpi", target_os = "linux"))]
pub use rpi::RpiBus;

#[cfg(all(feature = "rpi", target_os = "linux"))]
mod rpi {
    use std::time::Duration;

    use rppal::{
        gpio::{Gpio, OutputPin},
        spi::{self, Mode, SlaveSelect, Spi},
    };
    use tracing::info;
    use windwall_core::{
        env::{Environment, SystemEnv},
        transport::Bus,
    };
    use windwall_proto::Frame;

    use super::BusError;

    /// SPI0 byte stream plus a GPIO sync line.
    #[derive(Debug)]
    pub struct RpiBus {
        spi: Spi,
        sync: OutputPin,
        clock: SystemEnv,
    }

    impl RpiBus {
        /// BCM pin driving the sync line.
        pub const SYNC_PIN: u8 = 22;
        /// SPI clock.
        pub const CLOCK_HZ: u32 = 1_000_000;

        /// Open SPI0/CE0 and claim the sync pin, driven low.
        pub fn open() -> Result<Self, BusError> {
            let spi = Spi::new(spi::Bus::Spi0, SlaveSelect::Ss0, Self::CLOCK_HZ, Mode::Mode0)?;
            let sync = Gpio::new()?.get(Self::SYNC_PIN)?.into_output_low();
            info!(clock_hz = Self::CLOCK_HZ, sync_pin = Self::SYNC_PIN, "SPI bus ready");
            Ok(Self { spi, sync, clock: SystemEnv::default() })
        }
    }

    impl Bus for RpiBus {
        type Error = BusError;

        fn write_frame(&mut self, frame: &Frame) -> Result<(), BusError> {
            // One transfer per byte: nodes clock in a byte per chip-select
            // cycle.
            for byte in frame.iter() {
                let written = self.spi.write(&[byte])?;
                if written != 1 {
                    return Err(BusError::ShortWrite { written, expected: 1 });
                }
            }
            Ok(())
        }

        fn pulse_sync(&mut self, width: Duration) -> Result<(), BusError> {
            self.sync.set_high();
            self.clock.wait(width);
            self.sync.set_low();
            Ok(())
        }
    }
}

/// The bus selected at startup.
#[derive(Debug)]
pub enum CoordinatorBus {
    /// No hardware
    Mock(MockBus),
    /// Raspberry Pi
    #[cfg(all(feature = "rpi", target_os = "linux"))]
    Rpi(RpiBus),
}

impl CoordinatorBus {
    /// Open the driver for `kind`.
    pub fn open(kind: BusKind) -> Result<Self, BusError> {
        match kind {
            BusKind::Mock => Ok(Self::Mock(MockBus::new())),
            #[cfg(all(feature = "rpi", target_os = "linux"))]
            BusKind::Rpi => Ok(Self::Rpi(RpiBus::open()?)),
            #[cfg(not(all(feature = "rpi", target_os = "linux")))]
            BusKind::Rpi => Err(BusError::Unavailable("rpi")),
        }
    }
}

impl Bus for CoordinatorBus {
    type Error = BusError;

    fn write_frame(&mut self, frame: &Frame) -> Result<(), BusError> {
        match self {
            Self::Mock(bus) => bus.write_frame(frame),
            #[cfg(all(feature = "rpi", target_os = "linux"))]
            Self::Rpi(bus) => bus.write_frame(frame),
        }
    }

    fn pulse_sync(&mut self, width: Duration) -> Result<(), BusError> {
        match self {
            Self::Mock(bus) => bus.pulse_sync(width),
            #[cfg(all(feature = "rpi", target_os = "linux"))]
            Self::Rpi(bus) => bus.pulse_sync(width),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_bus_records_frames_and_syncs() {
        let mut bus = MockBus::new();
        let frame = Frame::filled(36, 7);

        for _ in 0..3 {
            bus.write_frame(&frame).unwrap();
            bus.pulse_sync(Duration::from_micros(10)).unwrap();
        }

        assert_eq!(bus.frames(), 3);
        assert_eq!(bus.syncs(), 3);
        assert_eq!(bus.last_frame(), Some(&frame));
    }

    #[test]
    fn mock_is_always_available() {
        let bus = CoordinatorBus::open(BusKind::Mock).unwrap();
        assert!(matches!(bus, CoordinatorBus::Mock(_)));
    }

    #[cfg(not(all(feature = "rpi", target_os = "linux")))]
    #[test]
    fn rpi_without_support_is_reported() {
        let error = CoordinatorBus::open(BusKind::Rpi).unwrap_err();
        assert!(matches!(error, BusError::Unavailable("rpi")));
    }
}
