use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use approx::{assert_abs_diff_eq, assert_relative_eq};

use htm_rs::discretization::generator::MeshSource;
use htm_rs::discretization::subdomain::{SurfaceSubdomain1D, VolumeSubdomain1D};
use htm_rs::error::SimulationError;
use htm_rs::numerics::solver::SolverError;
use htm_rs::physics::bc::BoundaryCondition;
use htm_rs::physics::initial::InitialCondition;
use htm_rs::physics::material::Material;
use htm_rs::physics::species::{Species, Trap};
use htm_rs::physics::temperature::Temperature;
use htm_rs::processing::export::{Export, FieldSnapshot};
use htm_rs::processing::flux::DerivedQuantity;
use htm_rs::{HydrogenTransportProblem, Phase, Settings, Stepsize};

/// Closed slab: no boundary condition, H = 1 + x initially and an empty trap
/// of density 2 everywhere.
fn closed_trapped_slab(settings: Settings) -> HydrogenTransportProblem {
    let mesh = MeshSource::Regular { cells: 20, size: 1.0 }.build().unwrap();
    let mut problem = HydrogenTransportProblem::new(mesh, settings);
    problem.subdomains = vec![
        VolumeSubdomain1D::new(1, [0.0, 1.0], Material::new(1.0, 0.0)).into(),
        SurfaceSubdomain1D::new(1, 0.0).into(),
        SurfaceSubdomain1D::new(2, 1.0).into(),
    ];
    problem.species = vec![Species::mobile("H")];
    problem.traps = vec![Trap::new("trap", "H", (1.0, 0.0), (0.5, 0.0), 2.0, 1)];
    problem.initial_conditions = vec![InitialCondition::new(|x| 1.0 + x, "H")];
    problem.temperature = Some(Temperature::Constant(500.0));
    problem.derived_quantities = vec![
        DerivedQuantity::total_volume("H", Some(1)),
        DerivedQuantity::total_volume("trap", Some(1)),
    ];
    problem
}

#[test]
fn closed_system_conserves_mobile_plus_trapped() {
    let settings = Settings::new(2.0, 0.1).with_tolerances(1e-11, 1e-14);
    let mut sim = closed_trapped_slab(settings).initialise().unwrap();
    let output = sim.run().unwrap();

    let mobile = output.series("total_H_volume_1").unwrap();
    let trapped = output.series("total_trap_volume_1").unwrap();
    assert_eq!(mobile.len(), 20);

    // integral of 1 + x over [0, 1]
    let inventory = 1.5;
    for (m, t) in mobile.iter().zip(trapped) {
        assert_relative_eq!(m + t, inventory, max_relative = 1e-8);
    }

    assert!(trapped[0] > 0.0);
    assert!(trapped[trapped.len() - 1] > trapped[0]);

    let trap = sim.concentration("trap").unwrap();
    assert!(trap.iter().all(|&c| (0.0..=2.0).contains(&c)));
}

#[test]
fn trapped_species_reaches_local_equilibrium() {
    let settings = Settings::new(50.0, 1.0).with_tolerances(1e-11, 1e-14);
    let mut sim = closed_trapped_slab(settings).initialise().unwrap();
    sim.run().unwrap();

    // k H (n - c_t) = p c_t at every vertex
    let h = sim.concentration("H").unwrap();
    let trap = sim.concentration("trap").unwrap();
    for (hi, ti) in h.iter().zip(trap.iter()) {
        assert_abs_diff_eq!(hi * (2.0 - ti), 0.5 * ti, epsilon = 1e-8);
    }
    // diffusion has flattened the mobile profile
    assert_abs_diff_eq!(h[0], h[20], epsilon = 1e-8);
}

#[test]
fn phases_follow_the_lifecycle() {
    let problem = closed_trapped_slab(Settings::new(0.3, 0.1));
    assert_eq!(problem.phase(), Phase::Uninitialized);

    let mut sim = problem.initialise().unwrap();
    assert_eq!(sim.phase(), Phase::Initialized);

    sim.step().unwrap();
    assert_eq!(sim.phase(), Phase::Converged(1));
    sim.step().unwrap();
    assert_eq!(sim.phase(), Phase::Converged(2));

    sim.run().unwrap();
    assert_eq!(sim.phase(), Phase::Finished);
    assert_eq!(sim.state().steps, 3);

    assert!(matches!(sim.step(), Err(SimulationError::AlreadyFinished(_))));
    assert_eq!(sim.state().steps, 3);
}

#[test]
fn failed_step_leaves_the_last_converged_state() {
    let mut settings = Settings::new(1.0, 0.1).with_tolerances(1e-14, 1e-14);
    settings.max_iterations = 1;
    let mut sim = closed_trapped_slab(settings).initialise().unwrap();
    let before = sim.state().u.clone();

    let err = sim.step().unwrap_err();
    match err {
        SimulationError::ConvergenceFailure { t, iterations, source } => {
            assert_abs_diff_eq!(t, 0.1, epsilon = 1e-15);
            assert_eq!(iterations, 1);
            assert!(matches!(source, SolverError::NonConvergence { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sim.phase(), Phase::Failed);
    assert_eq!(sim.time(), 0.0);
    assert_eq!(sim.state().u, before);
    assert!(matches!(sim.step(), Err(SimulationError::Failed)));
}

#[test]
fn adaptive_stepping_gives_up_below_the_minimum_step() {
    let stepsize = Stepsize::new(0.1)
        .adaptive(1.1, 0.5, 4)
        .with_bounds(Some(1e-3), None);
    let mut settings = Settings::new(1.0, stepsize).with_tolerances(1e-14, 1e-14);
    settings.max_iterations = 1;
    let mut sim = closed_trapped_slab(settings).initialise().unwrap();

    let err = sim.step().unwrap_err();
    match err {
        // last attempt used 0.1 / 2^6
        SimulationError::ConvergenceFailure { t, .. } => {
            assert_abs_diff_eq!(t, 0.1 / 64.0, epsilon = 1e-15)
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sim.phase(), Phase::Failed);
}

#[test]
fn cut_back_starts_from_the_clamped_final_step() {
    // dt = 0.1 is clamped to 0.03; halving from 0.03 gives up after 0.03 / 16
    let stepsize = Stepsize::new(0.1)
        .adaptive(1.1, 0.5, 4)
        .with_bounds(Some(1e-3), None);
    let mut settings = Settings::new(0.03, stepsize).with_tolerances(1e-14, 1e-14);
    settings.max_iterations = 1;
    let mut sim = closed_trapped_slab(settings).initialise().unwrap();

    match sim.step().unwrap_err() {
        SimulationError::ConvergenceFailure { t, .. } => {
            assert_abs_diff_eq!(t, 0.03 / 16.0, epsilon = 1e-15)
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn adaptive_stepping_grows_and_lands_on_final_time() {
    let mesh = MeshSource::Regular { cells: 20, size: 1.0 }.build().unwrap();
    let stepsize = Stepsize::new(0.01)
        .adaptive(2.0, 0.5, 4)
        .with_bounds(None, Some(1.0));
    let mut problem = HydrogenTransportProblem::new(mesh, Settings::new(5.0, stepsize));
    problem.subdomains = vec![
        VolumeSubdomain1D::new(1, [0.0, 1.0], Material::new(1.0, 0.0)).into(),
        SurfaceSubdomain1D::new(1, 0.0).into(),
    ];
    problem.species = vec![Species::mobile("H")];
    problem.boundary_conditions = vec![BoundaryCondition::dirichlet(1, 1.0, "H")];
    problem.temperature = Some(Temperature::Constant(300.0));

    let mut sim = problem.initialise().unwrap();
    let output = sim.run().unwrap();

    assert!(output.times.len() < 20);
    assert_eq!(*output.times.last().unwrap(), 5.0);
    let mut previous = 0.0;
    for &t in &output.times {
        assert!(t > previous);
        assert!(t - previous <= 1.0 + 1e-12);
        previous = t;
    }
    assert!(output.times[1] - output.times[0] > 0.01);
}

#[derive(Default)]
struct Recorder {
    species: Rc<RefCell<Vec<String>>>,
    times: Rc<RefCell<Vec<f64>>>,
}

impl Export for Recorder {
    fn define_writer(&mut self, species: &[String]) -> io::Result<()> {
        self.species.borrow_mut().extend_from_slice(species);
        Ok(())
    }

    fn write(&mut self, snapshot: &FieldSnapshot<'_>) -> io::Result<()> {
        assert_eq!(snapshot.fields.len(), 2);
        assert_eq!(snapshot.x.len(), 21);
        self.times.borrow_mut().push(snapshot.t);
        Ok(())
    }
}

#[test]
fn export_sinks_see_every_converged_step() {
    let recorder = Recorder::default();
    let species = Rc::clone(&recorder.species);
    let times = Rc::clone(&recorder.times);

    let mut problem = closed_trapped_slab(Settings::new(1.0, 0.3));
    problem.exports.push(Box::new(recorder));

    let mut sim = problem.initialise().unwrap();
    assert_eq!(*species.borrow(), vec!["H".to_string(), "trap".to_string()]);
    assert!(times.borrow().is_empty());

    let output = sim.run().unwrap();
    assert_eq!(times.borrow().len(), 4);
    assert_eq!(*times.borrow(), output.times);
}

struct FailingSink;

impl Export for FailingSink {
    fn define_writer(&mut self, _species: &[String]) -> io::Result<()> {
        Ok(())
    }

    fn write(&mut self, _snapshot: &FieldSnapshot<'_>) -> io::Result<()> {
        Err(io::Error::other("disk full"))
    }
}

#[test]
fn export_failure_is_reported_with_its_time() {
    let mut problem = closed_trapped_slab(Settings::new(1.0, 0.5));
    problem.exports.push(Box::new(FailingSink));
    let mut sim = problem.initialise().unwrap();

    match sim.step() {
        Err(SimulationError::Export { t, .. }) => assert_eq!(t, 0.5),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(sim.phase(), Phase::Failed);
}
