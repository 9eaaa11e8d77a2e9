use htm_rs::discretization::generator::{MeshSource, Refinement};
use htm_rs::discretization::subdomain::{SurfaceSubdomain1D, VolumeSubdomain1D};
use htm_rs::physics::bc::BoundaryCondition;
use htm_rs::physics::material::Material;
use htm_rs::physics::species::{Species, Trap};
use htm_rs::physics::temperature::Temperature;
use htm_rs::processing::csv_writer;
use htm_rs::processing::export::CsvExport;
use htm_rs::processing::flux::DerivedQuantity;
use htm_rs::processing::summary::SimulationSummary;
use htm_rs::{HydrogenTransportProblem, ScenarioConfig, Settings, Stepsize};
use log::LevelFilter;
use simplelog::{Config, SimpleLogger};
use std::error::Error;
use std::fs;

const OUTPUT_DIR: &str = "output/main";

fn main() -> Result<(), Box<dyn Error>> {
    SimpleLogger::init(LevelFilter::Info, Config::default())?;
    fs::create_dir_all(OUTPUT_DIR)?;

    let problem = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading scenario from {path}");
            ScenarioConfig::from_file(&path)?.into_problem()?
        }
        None => default_problem()?,
    };

    let mut simulation = problem.initialise()?;
    let output = simulation.run()?;

    csv_writer::write_time_series(
        format!("{OUTPUT_DIR}/derived_quantities.csv"),
        &output.times,
        &output.columns(),
    )?;

    let summary = SimulationSummary::from_simulation(&simulation);
    summary.write_to_file(format!("{OUTPUT_DIR}/simulation_summary.txt"))?;
    summary.print_to_console();

    println!("Summary saved to {OUTPUT_DIR}/simulation_summary.txt");
    Ok(())
}

/// Permeation through a 1 mm trapped slab, loaded from the left.
fn default_problem() -> Result<HydrogenTransportProblem, Box<dyn Error>> {
    let mesh = MeshSource::Refined {
        initial_number_of_cells: 200,
        size: 1e-3,
        refinements: vec![Refinement { x: 2e-5, cells: 100 }],
    }
    .build()?;

    let settings = Settings::new(
        1000.0,
        Stepsize::new(1.0)
            .adaptive(1.1, 0.5, 4)
            .with_bounds(Some(1e-4), Some(50.0)),
    )
    .with_tolerances(1e10, 1e-10);
    let mut problem = HydrogenTransportProblem::new(mesh, settings);

    let tungsten = Material::new(4.1e-7, 0.39).named("tungsten");
    problem.subdomains = vec![
        VolumeSubdomain1D::new(1, [0.0, 1e-3], tungsten).into(),
        SurfaceSubdomain1D::new(1, 0.0).into(),
        SurfaceSubdomain1D::new(2, 1e-3).into(),
    ];
    problem.species = vec![Species::mobile("H")];
    problem.traps = vec![Trap::new(
        "trap",
        "H",
        (4.1e-7 / (1.1e-10_f64.powi(2) * 6.0 * 6.3e28), 0.39),
        (1e13, 0.87),
        1.3e-3 * 6.3e28,
        1,
    )];
    problem.boundary_conditions = vec![
        BoundaryCondition::dirichlet(1, 1e20, "H"),
        BoundaryCondition::dirichlet(2, 0.0, "H"),
    ];
    problem.temperature = Some(Temperature::Constant(600.0));
    problem.derived_quantities = vec![
        DerivedQuantity::surface_flux("H", 2),
        DerivedQuantity::total_volume("H", Some(1)),
        DerivedQuantity::total_volume("trap", Some(1)),
    ];
    problem
        .exports
        .push(Box::new(CsvExport::new(format!("{OUTPUT_DIR}/profiles"))));
    Ok(problem)
}
