use approx::assert_abs_diff_eq;

use htm_rs::discretization::generator::MeshSource;
use htm_rs::discretization::subdomain::{SurfaceSubdomain1D, VolumeSubdomain1D};
use htm_rs::physics::bc::BoundaryCondition;
use htm_rs::physics::material::Material;
use htm_rs::physics::species::Species;
use htm_rs::physics::temperature::Temperature;
use htm_rs::processing::flux::DerivedQuantity;
use htm_rs::{HydrogenTransportProblem, Settings};

// The PDE
// du/dt = d2u/dx2 on [0, 1], u(0) = 1, u(1) = 0
fn fick_problem(cells: usize, final_time: f64, dt: f64) -> HydrogenTransportProblem {
    let mesh = MeshSource::Regular { cells, size: 1.0 }.build().unwrap();
    let mut problem = HydrogenTransportProblem::new(mesh, Settings::new(final_time, dt));
    problem.subdomains = vec![
        VolumeSubdomain1D::new(1, [0.0, 1.0], Material::new(1.0, 0.0)).into(),
        SurfaceSubdomain1D::new(1, 0.0).into(),
        SurfaceSubdomain1D::new(2, 1.0).into(),
    ];
    problem.species = vec![Species::mobile("H")];
    problem.boundary_conditions = vec![
        BoundaryCondition::dirichlet(1, 1.0, "H"),
        BoundaryCondition::dirichlet(2, 0.0, "H"),
    ];
    problem.temperature = Some(Temperature::Constant(300.0));
    problem.derived_quantities = vec![
        DerivedQuantity::surface_flux("H", 1),
        DerivedQuantity::surface_flux("H", 2),
    ];
    problem
}

#[test]
fn fick_flux_approaches_steady_state_monotonically() {
    let mut sim = fick_problem(50, 5.0, 0.1).initialise().unwrap();
    let output = sim.run().unwrap();

    assert_eq!(output.times.len(), 50);
    assert_eq!(*output.times.last().unwrap(), 5.0);

    let flux = output.series("flux_H_surface_1").unwrap();
    assert_eq!(flux.len(), 50);
    for pair in flux.windows(2) {
        assert!(
            (pair[1] - 1.0).abs() <= (pair[0] - 1.0).abs() + 1e-12,
            "flux moved away from steady state: {} -> {}",
            pair[0],
            pair[1]
        );
    }
    assert!(flux[0] > 1.0);
    assert_abs_diff_eq!(*flux.last().unwrap(), 1.0, epsilon = 1e-6);

    // outgoing flux at the right end balances the incoming one
    let right = output.series("flux_H_surface_2").unwrap();
    assert_abs_diff_eq!(*right.last().unwrap(), -1.0, epsilon = 1e-6);
}

#[test]
fn fick_steady_profile_is_linear() {
    let mut sim = fick_problem(20, 5.0, 0.1).initialise().unwrap();
    sim.run().unwrap();

    let x = sim.formulation().mesh().vertices.clone();
    let h = sim.concentration("H").unwrap();
    for (xi, hi) in x.iter().zip(h.iter()) {
        assert_abs_diff_eq!(*hi, 1.0 - xi, epsilon = 1e-6);
    }
}

#[test]
fn step_count_is_ceil_of_final_time_over_dt() {
    for (final_time, dt, expected) in [(1.0, 0.3, 4), (1.0, 0.25, 4), (0.5, 1.0, 1), (2.0, 0.1, 20)] {
        let mut sim = fick_problem(5, final_time, dt).initialise().unwrap();
        let output = sim.run().unwrap();
        assert_eq!(sim.state().steps, expected, "final {final_time}, dt {dt}");
        assert_eq!(output.times.len(), expected);
        assert_eq!(sim.time(), final_time);
    }
}

#[test]
fn last_step_is_clamped_onto_final_time() {
    let mut sim = fick_problem(5, 1.0, 0.3).initialise().unwrap();
    let output = sim.run().unwrap();
    let last_dt = output.times[3] - output.times[2];
    assert_abs_diff_eq!(last_dt, 0.1, epsilon = 1e-12);
}

#[test]
fn layered_materials_give_piecewise_linear_profile() {
    // D = 1 on [0, 0.5], D = 3 on [0.5, 1]
    let mesh = MeshSource::Regular { cells: 20, size: 1.0 }.build().unwrap();
    let mut problem = HydrogenTransportProblem::new(mesh, Settings::new(20.0, 1.0));
    problem.subdomains = vec![
        VolumeSubdomain1D::new(1, [0.0, 0.5], Material::new(1.0, 0.0)).into(),
        VolumeSubdomain1D::new(2, [0.5, 1.0], Material::new(3.0, 0.0)).into(),
        SurfaceSubdomain1D::new(1, 0.0).into(),
        SurfaceSubdomain1D::new(2, 1.0).into(),
    ];
    problem.species = vec![Species::mobile("H")];
    problem.boundary_conditions = vec![
        BoundaryCondition::dirichlet(1, 1.0, "H"),
        BoundaryCondition::dirichlet(2, 0.0, "H"),
    ];
    problem.temperature = Some(Temperature::Constant(300.0));
    problem.derived_quantities = vec![DerivedQuantity::surface_flux("H", 1)];

    let mut sim = problem.initialise().unwrap();
    let output = sim.run().unwrap();

    // J = 1 / (0.5/1 + 0.5/3) = 1.5, so u(0.5) = 1 - 0.5 J
    let h = sim.concentration("H").unwrap();
    assert_abs_diff_eq!(h[10], 0.25, epsilon = 1e-6);
    let flux = output.series("flux_H_surface_1").unwrap();
    assert_abs_diff_eq!(*flux.last().unwrap(), 1.5, epsilon = 1e-6);
}
