//! Windwall protocol core logic
//!
//! State machines for the synchronized multi-node actuation protocol,
//! decoupled from I/O so that the same code runs on hardware, in
//! deterministic unit tests and in the simulation harness.
//!
//! # Architecture
//!
//! Time is always passed in by the caller. Node logic returns declarative
//! [`node::NodeAction`]s that a driver executes against real PWM outputs or a
//! simulated actuator. The coordinator is split into a pure planner
//! ([`coordinator::Coordinator`]) and a thin period-holding loop
//! ([`runtime::Runtime`]) that talks to the bus through the
//! [`transport::Bus`] trait and to the clock through [`env::Environment`].
//!
//! # Components
//!
//! - [`shaper`]: Intensity -> pulse mapping with slew and range limits
//! - [`coordinator`]: Per-tick planning (signal, shaping, encoding)
//! - [`runtime`]: Fixed-period loop, bus writes, sync pulses
//! - [`node`]: Node frame parser, atomic latch, stall reset
//! - [`handoff`]: Interrupt to main-loop sync edge handoff
//! - [`watchdog`]: Armed / fail-safe state machine
//! - [`telemetry`]: Non-blocking read path for the last shaped outputs
//! - [`config`]: System configuration and validation
//! - [`mod@env`]: Clock abstraction
//! - [`transport`]: Bus abstraction
//! - [`signal`]: Signal source abstraction
//! - [`error`]: Error types

pub mod config;
pub mod coordinator;
pub mod env;
pub mod error;
pub mod handoff;
pub mod node;
pub mod runtime;
pub mod shaper;
pub mod signal;
pub mod telemetry;
pub mod transport;
pub mod watchdog;

pub use windwall_proto as proto;
