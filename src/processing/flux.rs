use nalgebra::DVector;

use crate::discretization::subdomain::MeshTags;
use crate::error::ConfigError;
use crate::physics::formulation::Formulation;
use crate::physics::function_space::{SpeciesState, component_of};
use crate::physics::species::SpeciesRef;

/// Scalar quantity recorded after every converged step.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedQuantity {
    /// Diffusive flux `D grad(c) . n` of a species through a surface.
    SurfaceFlux { species: SpeciesRef, surface: usize },
    /// Integral of a species over one volume, or the whole domain.
    TotalVolume {
        species: SpeciesRef,
        volume: Option<usize>,
    },
}

impl DerivedQuantity {
    pub fn surface_flux(species: impl Into<SpeciesRef>, surface: usize) -> Self {
        DerivedQuantity::SurfaceFlux {
            species: species.into(),
            surface,
        }
    }

    pub fn total_volume(species: impl Into<SpeciesRef>, volume: Option<usize>) -> Self {
        DerivedQuantity::TotalVolume {
            species: species.into(),
            volume,
        }
    }

    pub fn label(&self) -> String {
        match self {
            DerivedQuantity::SurfaceFlux { species, surface } => {
                format!("flux_{}_surface_{surface}", species.name())
            }
            DerivedQuantity::TotalVolume {
                species,
                volume: Some(v),
            } => format!("total_{}_volume_{v}", species.name()),
            DerivedQuantity::TotalVolume {
                species,
                volume: None,
            } => format!("total_{}", species.name()),
        }
    }
}

#[derive(Debug, Clone)]
enum Kind {
    Flux { facet: usize },
    Total { weights: Vec<f64> },
}

/// A derived quantity bound to a field component and to the mesh.
#[derive(Debug, Clone)]
pub struct ResolvedQuantity {
    pub label: String,
    component: usize,
    kind: Kind,
}

impl ResolvedQuantity {
    pub fn resolve(
        quantity: &DerivedQuantity,
        formulation: &Formulation,
        tags: &MeshTags,
        states: &[SpeciesState],
    ) -> Result<Self, ConfigError> {
        let mesh = formulation.mesh();

        let (component, kind) = match quantity {
            DerivedQuantity::SurfaceFlux { species, surface } => {
                let facet = tags
                    .facet_of(*surface)
                    .ok_or(ConfigError::UnknownSurface(*surface))?;
                (component_of(species.name(), states)?, Kind::Flux { facet })
            }
            DerivedQuantity::TotalVolume { species, volume } => {
                let mut weights = vec![0.0; mesh.num_vertices()];
                let mut found = false;
                for (cell, &tag) in mesh.cells.iter().zip(&tags.cells) {
                    if volume.is_some_and(|v| v != tag) {
                        continue;
                    }
                    found = true;
                    for &v in &cell.vertex_ids {
                        weights[v] += 0.5 * cell.length;
                    }
                }
                if let (Some(v), false) = (volume, found) {
                    return Err(ConfigError::UnknownVolume(*v));
                }
                (component_of(species.name(), states)?, Kind::Total { weights })
            }
        };

        Ok(Self {
            label: quantity.label(),
            component,
            kind,
        })
    }

    /// Evaluate on the stacked unknown `u`, with coefficients taken at the
    /// formulation's current time.
    pub fn evaluate(&self, formulation: &Formulation, u: &DVector<f64>) -> f64 {
        let space = formulation.space();
        match &self.kind {
            Kind::Flux { facet } => surface_flux(formulation, u, self.component, *facet),
            Kind::Total { weights } => weights
                .iter()
                .enumerate()
                .map(|(i, w)| w * u[space.dof(i, self.component)])
                .sum(),
        }
    }
}

/// `D grad(c) . n` at a boundary facet, using the gradient of the adjacent
/// cell. Interior facets carry no flux.
pub fn surface_flux(formulation: &Formulation, u: &DVector<f64>, component: usize, facet: usize) -> f64 {
    let mesh = formulation.mesh();
    let space = formulation.space();
    let facet = &mesh.facets[facet];
    let Some(cell_id) = facet.cell_id else {
        return 0.0;
    };
    let cell = &mesh.cells[cell_id];
    let [a, b] = cell.vertex_ids;
    let gradient = (u[space.dof(b, component)] - u[space.dof(a, component)]) / cell.length;
    formulation.diffusivity(cell_id, component) * gradient * facet.normal
}
