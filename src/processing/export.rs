use std::fs;
use std::io;
use std::path::PathBuf;

use nalgebra::DVector;

use crate::processing::csv_writer::{write_columns, write_time_series};

/// Fields of one converged step, as handed to export sinks.
#[derive(Debug, Clone, Copy)]
pub struct FieldSnapshot<'a> {
    pub t: f64,
    pub step: usize,
    pub x: &'a [f64],
    /// `(species name, vertex values)` for every species.
    pub fields: &'a [(String, DVector<f64>)],
}

/// Consumer of time-indexed field snapshots. `write` may be called zero or
/// many times after `define_writer`.
pub trait Export {
    /// Called once, at initialisation, with the frozen species names.
    fn define_writer(&mut self, species: &[String]) -> io::Result<()>;

    fn write(&mut self, snapshot: &FieldSnapshot<'_>) -> io::Result<()>;
}

/// Writes one `x, species...` profile per converged step into `directory`,
/// plus a `times.csv` index.
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub directory: PathBuf,
    pub prefix: String,
    /// Species to export. Empty means all.
    pub species: Vec<String>,
    times: Vec<f64>,
    steps: Vec<f64>,
}

impl CsvExport {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: "profile".into(),
            species: Vec::new(),
            times: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn with_species(mut self, species: &[&str]) -> Self {
        self.species = species.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }
}

impl Export for CsvExport {
    fn define_writer(&mut self, species: &[String]) -> io::Result<()> {
        if let Some(missing) = self.species.iter().find(|s| !species.contains(s)) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot export unknown species {missing}"),
            ));
        }
        fs::create_dir_all(&self.directory)?;
        self.times.clear();
        self.steps.clear();
        Ok(())
    }

    fn write(&mut self, snapshot: &FieldSnapshot<'_>) -> io::Result<()> {
        let selected: Vec<&(String, DVector<f64>)> = snapshot
            .fields
            .iter()
            .filter(|(name, _)| self.species.is_empty() || self.species.contains(name))
            .collect();

        let mut headers = vec!["x"];
        headers.extend(selected.iter().map(|(name, _)| name.as_str()));
        let mut columns = vec![snapshot.x];
        columns.extend(selected.iter().map(|(_, values)| values.as_slice()));

        let path = self
            .directory
            .join(format!("{}_{:05}.csv", self.prefix, snapshot.step));
        write_columns(path, &headers, &columns)?;

        self.times.push(snapshot.t);
        self.steps.push(snapshot.step as f64);
        write_time_series(
            self.directory.join("times.csv"),
            &self.times,
            &[("step".to_string(), self.steps.clone())],
        )
    }
}
