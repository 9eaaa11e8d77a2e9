use crate::error::ConfigError;

/// The complete 1D computational grid.
#[derive(Debug, Clone)]
pub struct Mesh1D {
    pub vertices: Vec<f64>,
    pub cells: Vec<Cell>,
    pub facets: Vec<Facet>,
}

/// An interval element between two consecutive vertices.
#[derive(Debug, Clone)]
pub struct Cell {
    pub id: usize,
    pub vertex_ids: [usize; 2],
    pub midpoint: f64,
    pub length: f64,
}

/// In 1D a facet is a vertex.
#[derive(Debug, Clone)]
pub struct Facet {
    pub id: usize,
    pub x: f64,
    /// Outward unit normal: -1 on the left end, +1 on the right end, 0 inside.
    pub normal: f64,
    /// The cell owning a boundary facet.
    pub cell_id: Option<usize>,
}

impl Facet {
    pub fn on_boundary(&self) -> bool {
        self.normal != 0.0
    }
}

impl Mesh1D {
    /// Build the mesh from vertex coordinates. Coordinates are sorted and
    /// exact duplicates removed.
    pub fn from_vertices(mut vertices: Vec<f64>) -> Result<Self, ConfigError> {
        if vertices.iter().any(|x| !x.is_finite()) {
            return Err(ConfigError::InvalidMesh(
                "vertex coordinates must be finite".into(),
            ));
        }
        vertices.sort_by(f64::total_cmp);
        vertices.dedup();
        if vertices.len() < 2 {
            return Err(ConfigError::InvalidMesh(format!(
                "at least 2 distinct vertices are required, got {}",
                vertices.len()
            )));
        }

        let cells = vertices
            .windows(2)
            .enumerate()
            .map(|(id, w)| Cell {
                id,
                vertex_ids: [id, id + 1],
                midpoint: 0.5 * (w[0] + w[1]),
                length: w[1] - w[0],
            })
            .collect::<Vec<_>>();

        let last = vertices.len() - 1;
        let facets = vertices
            .iter()
            .enumerate()
            .map(|(id, &x)| {
                let (normal, cell_id) = if id == 0 {
                    (-1.0, Some(0))
                } else if id == last {
                    (1.0, Some(last - 1))
                } else {
                    (0.0, None)
                };
                Facet {
                    id,
                    x,
                    normal,
                    cell_id,
                }
            })
            .collect();

        Ok(Self {
            vertices,
            cells,
            facets,
        })
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Right end of the domain.
    pub fn size(&self) -> f64 {
        self.vertices[self.vertices.len() - 1]
    }

    pub fn extent(&self) -> (f64, f64) {
        (self.vertices[0], self.size())
    }

    /// Lumped (row-sum) mass of every vertex.
    pub fn lumped_mass(&self) -> Vec<f64> {
        let mut mass = vec![0.0; self.num_vertices()];
        for cell in &self.cells {
            for &v in &cell.vertex_ids {
                mass[v] += 0.5 * cell.length;
            }
        }
        mass
    }

    pub fn spacing_range(&self) -> (f64, f64) {
        self.cells
            .iter()
            .fold((f64::INFINITY, 0.0_f64), |(lo, hi), c| {
                (lo.min(c.length), hi.max(c.length))
            })
    }
}
