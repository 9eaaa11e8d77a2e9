use crate::problem::Simulation;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

pub struct SimulationSummary {
    // Mesh info
    pub num_cells: usize,
    pub num_vertices: usize,
    pub domain_extent: (f64, f64),
    pub min_cell_spacing: f64,
    pub max_cell_spacing: f64,

    // Model info
    pub species: Vec<(String, bool)>,
    pub num_dofs: usize,

    // Run info
    pub steps: usize,
    pub final_time: f64,
    pub newton_iterations: u64,
    pub atol: f64,
    pub rtol: f64,

    /// Last recorded value of every derived quantity.
    pub final_values: Vec<(String, f64)>,
}

impl SimulationSummary {
    pub fn from_simulation(sim: &Simulation) -> Self {
        let mesh = sim.formulation().mesh();
        let (min_spacing, max_spacing) = mesh.spacing_range();
        let settings = sim.settings();

        Self {
            num_cells: mesh.cells.len(),
            num_vertices: mesh.num_vertices(),
            domain_extent: mesh.extent(),
            min_cell_spacing: min_spacing,
            max_cell_spacing: max_spacing,
            species: sim
                .species()
                .iter()
                .map(|s| (s.name().to_string(), s.species.mobile))
                .collect(),
            num_dofs: sim.formulation().space().num_dofs(),
            steps: sim.state().steps,
            final_time: sim.time(),
            newton_iterations: sim.newton_iterations(),
            atol: settings.atol,
            rtol: settings.rtol,
            final_values: sim
                .output()
                .derived
                .iter()
                .filter_map(|s| s.values.last().map(|v| (s.label.clone(), *v)))
                .collect(),
        }
    }

    pub fn average_iterations(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.newton_iterations as f64 / self.steps as f64
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", "=".repeat(60))?;
        writeln!(out, "HYDROGEN TRANSPORT SIMULATION SUMMARY")?;
        writeln!(out, "{}", "=".repeat(60))?;
        writeln!(out)?;

        writeln!(out, "MESH STATISTICS")?;
        writeln!(out, "{}", "-".repeat(60))?;
        writeln!(out, "Number of cells:     {}", self.num_cells)?;
        writeln!(out, "Number of vertices:  {}", self.num_vertices)?;
        writeln!(
            out,
            "Domain extent:       {:.6e} to {:.6e} m",
            self.domain_extent.0, self.domain_extent.1
        )?;
        writeln!(out, "Min cell spacing:    {:.6e} m", self.min_cell_spacing)?;
        writeln!(out, "Max cell spacing:    {:.6e} m", self.max_cell_spacing)?;
        writeln!(out)?;

        writeln!(out, "SPECIES")?;
        writeln!(out, "{}", "-".repeat(60))?;
        for (name, mobile) in &self.species {
            let kind = if *mobile { "mobile" } else { "immobile" };
            writeln!(out, "  {name:<18} {kind}")?;
        }
        writeln!(out, "Unknowns:            {}", self.num_dofs)?;
        writeln!(out)?;

        writeln!(out, "SOLVER PERFORMANCE")?;
        writeln!(out, "{}", "-".repeat(60))?;
        writeln!(out, "Converged steps:     {}", self.steps)?;
        writeln!(out, "Final time:          {:.6e} s", self.final_time)?;
        writeln!(out, "Newton iterations:   {}", self.newton_iterations)?;
        writeln!(out, "  per step:          {:.2}", self.average_iterations())?;
        writeln!(out, "Tolerances:          atol {:.1e}, rtol {:.1e}", self.atol, self.rtol)?;
        writeln!(out)?;

        if !self.final_values.is_empty() {
            writeln!(out, "DERIVED QUANTITIES (final step)")?;
            writeln!(out, "{}", "-".repeat(60))?;
            for (label, value) in &self.final_values {
                writeln!(out, "  {label:<30} {value:.6e}")?;
            }
            writeln!(out)?;
        }

        writeln!(out, "{}", "=".repeat(60))?;
        Ok(())
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        self.write_to(&mut file)
    }

    pub fn print_to_console(&self) {
        println!("\n{}", "=".repeat(60));
        println!("SIMULATION SUMMARY");
        println!("{}", "=".repeat(60));
        println!(
            "Mesh:          {} cells, {} vertices",
            self.num_cells, self.num_vertices
        );
        println!("Species:       {}", self.species.len());
        println!(
            "Steps:         {} (t = {:.4e}), {} Newton iterations",
            self.steps, self.final_time, self.newton_iterations
        );
        for (label, value) in &self.final_values {
            println!("{label:<14} {value:.6e}");
        }
        println!("{}\n", "=".repeat(60));
    }
}
