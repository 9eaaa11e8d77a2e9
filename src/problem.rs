use std::collections::HashSet;
use std::fmt;

use nalgebra::DVector;

use crate::config::Settings;
use crate::discretization::mesh::Mesh1D;
use crate::discretization::subdomain::{MeshTags, Subdomain, define_markers, split_subdomains};
use crate::error::{ConfigError, SimulationError};
use crate::numerics::solver::NewtonSolver;
use crate::numerics::transient::{SimulationState, StepReport, advance};
use crate::physics::bc::BoundaryCondition;
use crate::physics::formulation::{Formulation, FormulationInputs};
use crate::physics::function_space::{FunctionSpace, SpeciesState};
use crate::physics::initial::InitialCondition;
use crate::physics::source::Source;
use crate::physics::species::{Reaction, Species, Trap, find_species_from_name};
use crate::physics::temperature::Temperature;
use crate::processing::export::{Export, FieldSnapshot};
use crate::processing::flux::{DerivedQuantity, ResolvedQuantity};

/// Lifecycle of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initialized,
    Stepping,
    /// Last step converged; the payload is the number of converged steps.
    Converged(usize),
    Finished,
    Failed,
}

/// Time series of one derived quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedSeries {
    pub label: String,
    pub values: Vec<f64>,
}

/// Recorded post-processing of a run, one entry per converged step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutput {
    pub times: Vec<f64>,
    pub derived: Vec<DerivedSeries>,
}

impl RunOutput {
    pub fn series(&self, label: &str) -> Option<&[f64]> {
        self.derived
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.values.as_slice())
    }

    pub fn columns(&self) -> Vec<(String, Vec<f64>)> {
        self.derived
            .iter()
            .map(|s| (s.label.clone(), s.values.clone()))
            .collect()
    }
}

/// Aggregate root of a hydrogen transport model. Filled in by the caller,
/// then consumed by [`HydrogenTransportProblem::initialise`].
pub struct HydrogenTransportProblem {
    pub mesh: Mesh1D,
    pub subdomains: Vec<Subdomain>,
    pub species: Vec<Species>,
    pub traps: Vec<Trap>,
    pub reactions: Vec<Reaction>,
    pub boundary_conditions: Vec<BoundaryCondition>,
    pub sources: Vec<Source>,
    pub initial_conditions: Vec<InitialCondition>,
    pub temperature: Option<Temperature>,
    pub settings: Settings,
    pub derived_quantities: Vec<DerivedQuantity>,
    pub exports: Vec<Box<dyn Export>>,
}

impl fmt::Debug for HydrogenTransportProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HydrogenTransportProblem")
            .field("cells", &self.mesh.cells.len())
            .field("subdomains", &self.subdomains.len())
            .field("species", &self.species)
            .field("traps", &self.traps.len())
            .field("reactions", &self.reactions.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl HydrogenTransportProblem {
    pub fn new(mesh: Mesh1D, settings: Settings) -> Self {
        Self {
            mesh,
            subdomains: Vec::new(),
            species: Vec::new(),
            traps: Vec::new(),
            reactions: Vec::new(),
            boundary_conditions: Vec::new(),
            sources: Vec::new(),
            initial_conditions: Vec::new(),
            temperature: None,
            settings,
            derived_quantities: Vec::new(),
            exports: Vec::new(),
        }
    }

    /// Always [`Phase::Uninitialized`]: [`initialise`](Self::initialise)
    /// consumes the problem and the later phases are reported by the
    /// returned [`Simulation`].
    pub fn phase(&self) -> Phase {
        Phase::Uninitialized
    }

    /// Link the model once: activate traps, tag the mesh, allocate the
    /// fields, resolve every reference and build the residual. The species
    /// list is frozen from here on.
    pub fn initialise(mut self) -> Result<Simulation, ConfigError> {
        let temperature = self
            .temperature
            .take()
            .ok_or(ConfigError::TemperatureNotSet)?;
        self.settings.validate()?;

        for trap in &mut self.traps {
            trap.create_species_and_reaction(&mut self.species, &mut self.reactions)?;
        }
        if self.species.is_empty() {
            return Err(ConfigError::NoSpecies);
        }
        let mut names = HashSet::new();
        if let Some(dup) = self.species.iter().find(|s| !names.insert(s.name.as_str())) {
            return Err(ConfigError::DuplicateSpecies(dup.name.clone()));
        }
        if self.sources.len() > 1 {
            return Err(ConfigError::Unsupported(
                "at most one volumetric source is supported",
            ));
        }

        let (volumes, surfaces) = split_subdomains(&self.subdomains)?;
        let tags = define_markers(&self.mesh, &volumes, &surfaces)?;

        let space = FunctionSpace::new(self.mesh.num_vertices(), self.species.len());
        let mut species = space.allocate(&self.species);

        let mut formulation = Formulation::new(FormulationInputs {
            mesh: &self.mesh,
            tags: &tags,
            volumes: &volumes,
            species: &species,
            reactions: &self.reactions,
            boundary_conditions: &self.boundary_conditions,
            source: self.sources.first(),
            temperature: &temperature,
        })?;

        let mut u0 = DVector::zeros(space.num_dofs());
        for ic in &self.initial_conditions {
            let state = find_species_from_name(ic.species.name(), &species)?;
            ic.apply(&self.mesh, state.solution, &mut u0);
        }
        for state in &mut species {
            state.refresh_post_processing(&u0);
        }

        let dt = self.settings.stepsize.initial_value;
        formulation.prepare_time_step(0.0, dt, &u0);

        let quantities = self
            .derived_quantities
            .iter()
            .map(|q| ResolvedQuantity::resolve(q, &formulation, &tags, &species))
            .collect::<Result<Vec<_>, _>>()?;

        let species_names: Vec<String> = self.species.iter().map(|s| s.name.clone()).collect();
        for export in &mut self.exports {
            export.define_writer(&species_names)?;
        }

        log::info!(
            "initialised: {} cells, {} species, {} reactions, {} dofs{}",
            self.mesh.cells.len(),
            species.len(),
            self.reactions.len(),
            space.num_dofs(),
            if space.is_mixed() { " (mixed)" } else { "" }
        );

        let output = RunOutput {
            times: Vec::new(),
            derived: quantities
                .iter()
                .map(|q| DerivedSeries {
                    label: q.label.clone(),
                    values: Vec::new(),
                })
                .collect(),
        };

        Ok(Simulation {
            solver: NewtonSolver::new(
                self.settings.atol,
                self.settings.rtol,
                self.settings.max_iterations,
            ),
            state: SimulationState::new(u0, dt),
            settings: self.settings,
            formulation,
            species,
            tags,
            quantities,
            exports: self.exports,
            phase: Phase::Initialized,
            output,
            newton_iterations: 0,
        })
    }
}

/// An initialised, fully linked simulation.
pub struct Simulation {
    formulation: Formulation,
    species: Vec<SpeciesState>,
    tags: MeshTags,
    solver: NewtonSolver,
    settings: Settings,
    state: SimulationState,
    quantities: Vec<ResolvedQuantity>,
    exports: Vec<Box<dyn Export>>,
    phase: Phase,
    output: RunOutput,
    newton_iterations: u64,
}

impl Simulation {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn time(&self) -> f64 {
        self.state.t
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn formulation(&self) -> &Formulation {
        &self.formulation
    }

    pub fn tags(&self) -> &MeshTags {
        &self.tags
    }

    pub fn species(&self) -> &[SpeciesState] {
        &self.species
    }

    pub fn output(&self) -> &RunOutput {
        &self.output
    }

    /// Total Newton iterations over all converged steps.
    pub fn newton_iterations(&self) -> u64 {
        self.newton_iterations
    }

    /// Post-processing copy of a species' concentration at the last
    /// converged step.
    pub fn concentration(&self, name: &str) -> Option<&DVector<f64>> {
        find_species_from_name(name, &self.species)
            .ok()
            .map(|s| &s.post_processing_solution)
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished(self.settings.final_time)
    }

    /// Take one time step, then post-process and export.
    pub fn step(&mut self) -> Result<StepReport, SimulationError> {
        match self.phase {
            Phase::Failed => return Err(SimulationError::Failed),
            Phase::Finished => return Err(SimulationError::AlreadyFinished(self.settings.final_time)),
            _ => {}
        }

        self.phase = Phase::Stepping;
        let report = match advance(
            &mut self.state,
            &mut self.formulation,
            &self.solver,
            &self.settings.stepsize,
            self.settings.final_time,
        ) {
            Ok(report) => report,
            Err(err) => {
                self.phase = Phase::Failed;
                return Err(err);
            }
        };
        self.newton_iterations += u64::from(report.iterations);

        if let Err(err) = self.post_process(report.t) {
            self.phase = Phase::Failed;
            return Err(err);
        }

        log::info!(
            "Step {:>4} | t = {:.4e} | dt = {:.3e} | iters = {}",
            self.state.steps,
            report.t,
            report.dt,
            report.iterations
        );

        self.phase = if self.is_finished() {
            Phase::Finished
        } else {
            Phase::Converged(self.state.steps)
        };
        Ok(report)
    }

    fn post_process(&mut self, t: f64) -> Result<(), SimulationError> {
        for state in &mut self.species {
            state.refresh_post_processing(&self.state.u);
        }

        self.output.times.push(t);
        for (quantity, series) in self.quantities.iter().zip(&mut self.output.derived) {
            series
                .values
                .push(quantity.evaluate(&self.formulation, &self.state.u));
        }

        if self.exports.is_empty() {
            return Ok(());
        }
        let fields: Vec<(String, DVector<f64>)> = self
            .species
            .iter()
            .map(|s| (s.name().to_string(), s.post_processing_solution.clone()))
            .collect();
        let snapshot = FieldSnapshot {
            t,
            step: self.state.steps,
            x: &self.formulation.mesh().vertices,
            fields: &fields,
        };
        for export in &mut self.exports {
            export
                .write(&snapshot)
                .map_err(|source| SimulationError::Export { t, source })?;
        }
        Ok(())
    }

    /// Step until `final_time` and return the recorded time series.
    pub fn run(&mut self) -> Result<RunOutput, SimulationError> {
        log::info!(
            "Starting transient simulation: t = {:.3e} -> {:.3e}",
            self.state.t,
            self.settings.final_time
        );
        while !self.is_finished() {
            self.step()?;
        }
        self.phase = Phase::Finished;
        Ok(self.output.clone())
    }
}
