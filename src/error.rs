use crate::numerics::solver::SolverError;
use thiserror::Error;

/// Raised when a derived concentration is read before the fields it
/// depends on have been allocated.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot compute concentration of {implicit} because {missing} has no solution")]
pub struct MissingSolutionError {
    pub implicit: String,
    pub missing: String,
}

/// Setup errors. All of them are detected by `initialise()`, before the
/// first time step.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("volume subdomain borders do not tile [0, {size}]: {reason}")]
    SubdomainBorder { size: f64, reason: String },
    #[error("subdomain id {0} is declared more than once")]
    DuplicateSubdomainId(usize),
    #[error("at least one volume subdomain is required")]
    NoVolumeSubdomain,
    #[error("surface subdomain {id} at x = {x} does not match a boundary vertex")]
    SurfaceNotFound { id: usize, x: f64 },
    #[error("surface subdomains {first} and {second} both sit on the boundary vertex x = {x}")]
    SurfaceOverlap { first: usize, second: usize, x: f64 },
    #[error("volume subdomain {0} is not declared")]
    UnknownVolume(usize),
    #[error("surface subdomain {0} is not declared")]
    UnknownSurface(usize),
    #[error("species {0} not found in list of species")]
    SpeciesNotFound(String),
    #[error("species {0} is declared more than once")]
    DuplicateSpecies(String),
    #[error("the problem declares no species")]
    NoSpecies,
    #[error("unsupported configuration: {0}")]
    Unsupported(&'static str),
    #[error("temperature must be set before initialisation")]
    TemperatureNotSet,
    #[error("trap {0} has already created its species and reaction")]
    TrapAlreadyActivated(String),
    #[error(transparent)]
    MissingSolution(#[from] MissingSolutionError),
    #[error(
        "refinement to {target} cells left of x = {x} is unreachable from {initial} initial cells"
    )]
    RefinementUnreachable { x: f64, target: usize, initial: usize },
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while time stepping. A failed step aborts the run.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("step to t = {t:.6e} failed after {iterations} Newton iterations: {source}")]
    ConvergenceFailure {
        t: f64,
        iterations: u32,
        #[source]
        source: SolverError,
    },
    #[error("export failed at t = {t:.6e}: {source}")]
    Export {
        t: f64,
        #[source]
        source: std::io::Error,
    },
    #[error("simulation already reached final time {0}")]
    AlreadyFinished(f64),
    #[error("simulation is in a failed state and cannot continue")]
    Failed,
}
