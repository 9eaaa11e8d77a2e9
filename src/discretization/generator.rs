use super::mesh::Mesh1D;
use crate::error::ConfigError;
use log::info;
use serde::{Deserialize, Serialize};

/// Local refinement target: at least `cells` additional cells in `[0, x]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Refinement {
    pub x: f64,
    pub cells: usize,
}

/// The ways a 1D mesh can be produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeshSource {
    /// Explicit vertex coordinates.
    Vertices { vertices: Vec<f64> },
    /// `cells` equal intervals on `[0, size]`.
    Regular { cells: usize, size: f64 },
    /// Regular mesh refined iteratively on the left hand side.
    Refined {
        initial_number_of_cells: usize,
        size: f64,
        #[serde(default)]
        refinements: Vec<Refinement>,
    },
}

impl MeshSource {
    pub fn build(&self) -> Result<Mesh1D, ConfigError> {
        match self {
            MeshSource::Vertices { vertices } => Mesh1D::from_vertices(vertices.clone()),
            MeshSource::Regular { cells, size } => {
                Mesh1D::from_vertices(regular_vertices(*cells, *size)?)
            }
            MeshSource::Refined {
                initial_number_of_cells,
                size,
                refinements,
            } => Mesh1D::from_vertices(refine_left(
                *initial_number_of_cells,
                *size,
                refinements,
            )?),
        }
    }
}

/// Equally spaced vertices on `[0, size]`.
pub fn regular_vertices(cells: usize, size: f64) -> Result<Vec<f64>, ConfigError> {
    if cells == 0 || !(size > 0.0) {
        return Err(ConfigError::InvalidMesh(format!(
            "regular mesh needs cells > 0 and size > 0 (got {cells}, {size})"
        )));
    }
    let h = size / cells as f64;
    let mut vertices: Vec<f64> = (0..cells).map(|i| i as f64 * h).collect();
    vertices.push(size);
    Ok(vertices)
}

/// Bisect every cell whose midpoint lies left of `refinement.x` until the
/// mesh holds at least `refinement.cells` more cells than before that
/// refinement. Refinements are applied in order.
pub fn refine_left(
    initial_number_of_cells: usize,
    size: f64,
    refinements: &[Refinement],
) -> Result<Vec<f64>, ConfigError> {
    let mut vertices = regular_vertices(initial_number_of_cells, size)?;
    let mut base = initial_number_of_cells;

    for refinement in refinements {
        info!("Mesh size before local refinement is {}", vertices.len() - 1);
        while vertices.len() - 1 < base + refinement.cells {
            let mut refined = Vec::with_capacity(2 * vertices.len());
            let mut marked = 0;
            for w in vertices.windows(2) {
                refined.push(w[0]);
                let mid = 0.5 * (w[0] + w[1]);
                if mid < refinement.x {
                    refined.push(mid);
                    marked += 1;
                }
            }
            if marked == 0 {
                return Err(ConfigError::RefinementUnreachable {
                    x: refinement.x,
                    target: refinement.cells,
                    initial: base,
                });
            }
            refined.push(size);
            vertices = refined;
        }
        base = vertices.len() - 1;
        info!("Mesh size after local refinement is {base}");
    }

    Ok(vertices)
}
