//! One dimensional transient hydrogen transport with trapping.
//!
//! Diffusion of mobile species and their exchange with trap sites are
//! discretized with linear finite elements on an interval mesh and implicit
//! Euler in time. Each step is solved by a damped Newton iteration whose
//! Jacobian comes from forward-mode dual numbers.

pub mod config;
pub mod discretization;
pub mod error;
pub mod numerics;
pub mod physics;
pub mod problem;
pub mod processing;

pub use config::{ScenarioConfig, Settings};
pub use error::{ConfigError, SimulationError};
pub use numerics::stepsize::Stepsize;
pub use problem::{HydrogenTransportProblem, Phase, RunOutput, Simulation};
