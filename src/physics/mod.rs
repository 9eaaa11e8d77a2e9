pub mod bc;
pub mod formulation;
pub mod function_space;
pub mod initial;
pub mod material;
pub mod source;
pub mod species;
pub mod temperature;

use nalgebra::DVector;

use crate::numerics::sparse::SparseJacobian;

/// Defines the contract between a discretized model and the nonlinear
/// solver.
pub trait NonlinearProblem {
    /// Length of the stacked unknown vector.
    fn num_unknowns(&self) -> usize;

    /// Overwrite constrained dofs of `u` with their prescribed values.
    fn apply_constraints(&self, u: &mut DVector<f64>);

    /// Residual `F(u)`.
    fn residual(&self, u: &DVector<f64>) -> DVector<f64>;

    /// Residual and its Jacobian `dF/du`, computed together.
    fn residual_and_jacobian(&self, u: &DVector<f64>) -> (DVector<f64>, SparseJacobian);
}
