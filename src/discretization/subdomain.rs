use super::mesh::Mesh1D;
use crate::error::ConfigError;
use crate::physics::material::DiffusivityModel;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// A volume region `[borders[0], borders[1]]` made of one material.
#[derive(Debug, Clone)]
pub struct VolumeSubdomain1D {
    pub id: usize,
    pub borders: [f64; 2],
    pub material: Arc<dyn DiffusivityModel>,
}

impl VolumeSubdomain1D {
    pub fn new(id: usize, borders: [f64; 2], material: impl DiffusivityModel + 'static) -> Self {
        Self {
            id,
            borders,
            material: Arc::new(material),
        }
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.borders[0] && x <= self.borders[1]
    }
}

/// A surface region: the single boundary vertex at `x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSubdomain1D {
    pub id: usize,
    pub x: f64,
}

impl SurfaceSubdomain1D {
    pub fn new(id: usize, x: f64) -> Self {
        Self { id, x }
    }

    /// Index of the boundary facet sitting exactly at `x`.
    pub fn locate_facet(&self, mesh: &Mesh1D) -> Result<usize, ConfigError> {
        let tol = coordinate_tolerance(mesh.size());
        mesh.facets
            .iter()
            .find(|f| f.on_boundary() && (f.x - self.x).abs() <= tol)
            .map(|f| f.id)
            .ok_or(ConfigError::SurfaceNotFound {
                id: self.id,
                x: self.x,
            })
    }
}

#[derive(Debug, Clone)]
pub enum Subdomain {
    Volume(VolumeSubdomain1D),
    Surface(SurfaceSubdomain1D),
}

impl From<VolumeSubdomain1D> for Subdomain {
    fn from(v: VolumeSubdomain1D) -> Self {
        Subdomain::Volume(v)
    }
}

impl From<SurfaceSubdomain1D> for Subdomain {
    fn from(s: SurfaceSubdomain1D) -> Self {
        Subdomain::Surface(s)
    }
}

/// Cell and facet tags. A tag of 0 means "no subdomain".
#[derive(Debug, Clone)]
pub struct MeshTags {
    pub cells: Vec<usize>,
    pub facets: Vec<usize>,
}

impl MeshTags {
    pub fn cells_in(&self, volume_id: usize) -> impl Iterator<Item = usize> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(move |&(_, &tag)| tag == volume_id)
            .map(|(i, _)| i)
    }

    pub fn facet_of(&self, surface_id: usize) -> Option<usize> {
        self.facets.iter().position(|&tag| tag == surface_id)
    }
}

#[inline]
fn coordinate_tolerance(size: f64) -> f64 {
    1e-12 * size.abs().max(1.0)
}

/// Split the registry into its volumes and surfaces, checking that ids are
/// unique positive integers within each class.
pub fn split_subdomains(
    subdomains: &[Subdomain],
) -> Result<(Vec<VolumeSubdomain1D>, Vec<SurfaceSubdomain1D>), ConfigError> {
    let mut volumes = Vec::new();
    let mut surfaces = Vec::new();
    let mut volume_ids = HashSet::new();
    let mut surface_ids = HashSet::new();

    for sub in subdomains {
        match sub {
            Subdomain::Volume(v) => {
                if v.id == 0 || !volume_ids.insert(v.id) {
                    return Err(ConfigError::DuplicateSubdomainId(v.id));
                }
                volumes.push(v.clone());
            }
            Subdomain::Surface(s) => {
                if s.id == 0 || !surface_ids.insert(s.id) {
                    return Err(ConfigError::DuplicateSubdomainId(s.id));
                }
                surfaces.push(*s);
            }
        }
    }

    if volumes.is_empty() {
        return Err(ConfigError::NoVolumeSubdomain);
    }
    Ok((volumes, surfaces))
}

/// Check that the volume intervals tile `[0, size]` with no gap or overlap.
pub fn check_borders(volumes: &[VolumeSubdomain1D], size: f64) -> Result<(), ConfigError> {
    let tol = coordinate_tolerance(size);
    let border_error = |reason: String| ConfigError::SubdomainBorder { size, reason };

    let mut sorted: Vec<&VolumeSubdomain1D> = volumes.iter().collect();
    sorted.sort_by(|a, b| a.borders[0].total_cmp(&b.borders[0]));

    let Some(first) = sorted.first() else {
        return Err(ConfigError::NoVolumeSubdomain);
    };
    if first.borders[0].abs() > tol {
        return Err(border_error(format!(
            "first volume starts at {} instead of 0",
            first.borders[0]
        )));
    }
    for pair in sorted.windows(2) {
        let (left, right) = (pair[0], pair[1]);
        if (left.borders[1] - right.borders[0]).abs() > tol {
            return Err(border_error(format!(
                "volume {} ends at {} but volume {} starts at {}",
                left.id, left.borders[1], right.id, right.borders[0]
            )));
        }
    }
    let last = sorted[sorted.len() - 1];
    if (last.borders[1] - size).abs() > tol {
        return Err(border_error(format!(
            "last volume ends at {} instead of {size}",
            last.borders[1]
        )));
    }
    Ok(())
}

/// Tag every cell with the id of the volume containing its midpoint. With a
/// single volume every cell belongs to it.
pub fn tag_cells(mesh: &Mesh1D, volumes: &[VolumeSubdomain1D]) -> Vec<usize> {
    if let [only] = volumes {
        return vec![only.id; mesh.cells.len()];
    }
    mesh.cells
        .iter()
        .map(|cell| {
            volumes
                .iter()
                .rev()
                .find(|v| v.contains(cell.midpoint))
                .map_or(0, |v| v.id)
        })
        .collect()
}

/// Tag the boundary facet of every surface. A facet carries at most one
/// surface.
pub fn tag_facets(
    mesh: &Mesh1D,
    surfaces: &[SurfaceSubdomain1D],
) -> Result<Vec<usize>, ConfigError> {
    let mut owners: Vec<Option<usize>> = vec![None; mesh.facets.len()];
    for surface in surfaces {
        let facet = surface.locate_facet(mesh)?;
        if let Some(first) = owners[facet] {
            return Err(ConfigError::SurfaceOverlap {
                first,
                second: surface.id,
                x: mesh.facets[facet].x,
            });
        }
        owners[facet] = Some(surface.id);
    }
    Ok(owners.into_iter().map(|id| id.unwrap_or(0)).collect())
}

/// Full tagging pass: border check (only needed with several volumes), then
/// cell and facet tags.
pub fn define_markers(
    mesh: &Mesh1D,
    volumes: &[VolumeSubdomain1D],
    surfaces: &[SurfaceSubdomain1D],
) -> Result<MeshTags, ConfigError> {
    if volumes.len() > 1 {
        check_borders(volumes, mesh.size())?;
    }
    Ok(MeshTags {
        cells: tag_cells(mesh, volumes),
        facets: tag_facets(mesh, surfaces)?,
    })
}
