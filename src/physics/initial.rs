use std::fmt;
use std::sync::Arc;

use nalgebra::DVector;

use crate::discretization::mesh::Mesh1D;
use crate::physics::function_space::SubField;
use crate::physics::species::SpeciesRef;

/// Initial concentration profile `c(x)` of one species. Species without one
/// start from zero.
#[derive(Clone)]
pub struct InitialCondition {
    pub species: SpeciesRef,
    pub value: Arc<dyn Fn(f64) -> f64 + Send + Sync>,
}

impl InitialCondition {
    pub fn new(
        value: impl Fn(f64) -> f64 + Send + Sync + 'static,
        species: impl Into<SpeciesRef>,
    ) -> Self {
        Self {
            species: species.into(),
            value: Arc::new(value),
        }
    }

    pub fn constant(value: f64, species: impl Into<SpeciesRef>) -> Self {
        Self::new(move |_| value, species)
    }

    /// Interpolate the profile onto the vertices of `field`.
    pub fn apply(&self, mesh: &Mesh1D, field: SubField, u: &mut DVector<f64>) {
        for (i, &x) in mesh.vertices.iter().enumerate() {
            u[field.dof(i)] = (self.value)(x);
        }
    }
}

impl fmt::Debug for InitialCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitialCondition")
            .field("species", &self.species.name())
            .finish()
    }
}
