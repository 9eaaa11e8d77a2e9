use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use htm_rs::discretization::generator::{MeshSource, Refinement};
use htm_rs::discretization::subdomain::{SurfaceSubdomain1D, VolumeSubdomain1D};
use htm_rs::numerics::solver::NewtonSolver;
use htm_rs::physics::NonlinearProblem;
use htm_rs::physics::bc::BoundaryCondition;
use htm_rs::physics::material::Material;
use htm_rs::physics::species::{Species, Trap};
use htm_rs::physics::temperature::Temperature;
use htm_rs::{HydrogenTransportProblem, Settings, Simulation};

fn problem_sizes() -> Vec<usize> {
    vec![100, 400, 2000]
}

fn solver_sizes() -> Vec<usize> {
    vec![50, 200, 2000, 8000]
}

/// Trapped slab loaded from the left, two traps.
fn trapped_slab(cells: usize, final_time: f64) -> HydrogenTransportProblem {
    let mesh = MeshSource::Regular { cells, size: 1e-3 }.build().unwrap();
    let mut problem = HydrogenTransportProblem::new(
        mesh,
        Settings::new(final_time, 1.0).with_tolerances(1e10, 1e-10),
    );
    problem.subdomains = vec![
        VolumeSubdomain1D::new(1, [0.0, 1e-3], Material::new(4.1e-7, 0.39)).into(),
        SurfaceSubdomain1D::new(1, 0.0).into(),
        SurfaceSubdomain1D::new(2, 1e-3).into(),
    ];
    problem.species = vec![Species::mobile("H")];
    problem.traps = vec![
        Trap::new("trap1", "H", (8.96e-17, 0.39), (1e13, 0.87), 1e25, 1),
        Trap::new("trap2", "H", (8.96e-17, 0.39), (1e13, 1.0), 5e24, 1),
    ];
    problem.boundary_conditions = vec![
        BoundaryCondition::dirichlet(1, 1e20, "H"),
        BoundaryCondition::dirichlet(2, 0.0, "H"),
    ];
    problem.temperature = Some(Temperature::Constant(600.0));
    problem
}

fn initialised(cells: usize) -> Simulation {
    trapped_slab(cells, 10.0).initialise().unwrap()
}

fn bench_jacobian(c: &mut Criterion) {
    let mut group = c.benchmark_group("residual_and_jacobian");
    for &size in &problem_sizes() {
        let sim = initialised(size);
        let u = sim.state().u.clone();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| {
                let (_res, jac) = sim.formulation().residual_and_jacobian(&u);
                std::hint::black_box(jac);
            });
        });
    }
    group.finish();
}

fn bench_residual(c: &mut Criterion) {
    let mut group = c.benchmark_group("residual");
    for &size in &problem_sizes() {
        let sim = initialised(size);
        let u = sim.state().u.clone();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| std::hint::black_box(sim.formulation().residual(&u)));
        });
    }
    group.finish();
}

fn bench_refined_mesh(c: &mut Criterion) {
    let mut group = c.benchmark_group("refined_mesh");
    for &size in &problem_sizes() {
        let source = MeshSource::Refined {
            initial_number_of_cells: size,
            size: 1e-3,
            refinements: vec![
                Refinement { x: 1e-4, cells: size / 2 },
                Refinement { x: 1e-5, cells: size / 4 },
            ],
        };
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| std::hint::black_box(source.build().unwrap()));
        });
    }
    group.finish();
}

fn bench_newton_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("newton_step");
    group.sample_size(20);
    for &size in &solver_sizes() {
        let sim = initialised(size);
        let settings = sim.settings();
        let solver = NewtonSolver::new(settings.atol, settings.rtol, settings.max_iterations);
        let init = sim.state().u_n.clone();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter_batched(
                || init.clone(),
                |u| {
                    let _ = solver.solve(sim.formulation(), u);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_short_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("short_run");
    group.sample_size(10);
    for &size in &solver_sizes() {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || trapped_slab(size, 5.0).initialise().unwrap(),
                |mut sim| std::hint::black_box(sim.run().unwrap()),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_jacobian,
    bench_residual,
    bench_refined_mesh,
    bench_newton_step,
    bench_short_run
);
criterion_main!(benches);
