//! Scenario testing with mandatory oracles.
//!
//! A scenario wires a real coordinator runtime to simulated nodes over a
//! [`SimBus`](crate::SimBus), plays a list of steps (ticks, silence, raw
//! frames, injected faults) on the virtual clock, and hands the resulting
//! [`World`] to an oracle. A scenario without an oracle cannot be run.
//!
//! ```ignore
//! Scenario::new("fail-safe after silence")
//!     .signal(ConstantSignal(0.6))
//!     .ticks(20)
//!     .silence(Duration::from_millis(250))
//!     .oracle(oracle::all_idle())
//!     .run()?;
//! ```

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario, ScenarioSignal, Step};
pub use world::World;

/// Verifies the final state of a scenario.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
