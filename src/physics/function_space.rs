use crate::error::ConfigError;
use crate::physics::species::{Species, find_species_from_name};
use nalgebra::DVector;

/// Discrete P1 space on the mesh vertices. With more than one species the
/// space is mixed: components are interleaved per vertex, so the dof of
/// component `c` at vertex `i` is `i * num_components + c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSpace {
    pub num_vertices: usize,
    pub num_components: usize,
}

/// View of one component inside a (possibly mixed) field buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubField {
    pub component: usize,
    pub num_components: usize,
}

/// Test function of one component. In the assembled residual it selects
/// the row block the species' equation is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestFunction {
    pub component: usize,
}

/// A species once its fields have been allocated.
#[derive(Debug, Clone)]
pub struct SpeciesState {
    pub species: Species,
    pub solution: SubField,
    pub prev_solution: SubField,
    pub test_function: TestFunction,
    /// Detached copy of the solution, refreshed after every converged step.
    pub post_processing_solution: DVector<f64>,
}

impl SubField {
    #[inline]
    pub fn dof(&self, vertex: usize) -> usize {
        vertex * self.num_components + self.component
    }

    #[inline]
    pub fn num_vertices(&self, u: &DVector<f64>) -> usize {
        u.len() / self.num_components
    }

    /// Copy the component out of the stacked buffer.
    pub fn collapse(&self, u: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.num_vertices(u),
            u.iter()
                .skip(self.component)
                .step_by(self.num_components)
                .copied(),
        )
    }
}

impl AsRef<Species> for SpeciesState {
    fn as_ref(&self) -> &Species {
        &self.species
    }
}

/// Field component allocated to the species called `name`.
pub fn component_of(name: &str, states: &[SpeciesState]) -> Result<usize, ConfigError> {
    find_species_from_name(name, states).map(|s| s.solution.component)
}

impl SpeciesState {
    pub fn name(&self) -> &str {
        &self.species.name
    }

    /// Concentration = current solution.
    pub fn concentration(&self, u: &DVector<f64>) -> DVector<f64> {
        self.solution.collapse(u)
    }

    pub fn refresh_post_processing(&mut self, u: &DVector<f64>) {
        self.post_processing_solution = self.solution.collapse(u);
    }
}

impl FunctionSpace {
    pub fn new(num_vertices: usize, num_components: usize) -> Self {
        Self {
            num_vertices,
            num_components,
        }
    }

    pub fn is_mixed(&self) -> bool {
        self.num_components > 1
    }

    pub fn num_dofs(&self) -> usize {
        self.num_vertices * self.num_components
    }

    #[inline]
    pub fn dof(&self, vertex: usize, component: usize) -> usize {
        vertex * self.num_components + component
    }

    pub fn sub(&self, component: usize) -> SubField {
        SubField {
            component,
            num_components: self.num_components,
        }
    }

    /// Bind solution, previous solution and test function of every species,
    /// in list order.
    pub fn allocate(&self, species: &[Species]) -> Vec<SpeciesState> {
        species
            .iter()
            .enumerate()
            .map(|(idx, spe)| SpeciesState {
                species: spe.clone(),
                solution: self.sub(idx),
                prev_solution: self.sub(idx),
                test_function: TestFunction { component: idx },
                post_processing_solution: DVector::zeros(self.num_vertices),
            })
            .collect()
    }
}
