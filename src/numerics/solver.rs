use crate::physics::NonlinearProblem;
use nalgebra::DVector;
use thiserror::Error;

/// Damped Newton iteration on a [`NonlinearProblem`], with sparse LU solves.
///
/// Converged when `||F|| < atol` or `||F|| / ||F_0|| < rtol`. Each update
/// is damped by a backtracking line search on `||F||`; when no damped step
/// gives sufficient decrease the full step is taken.
#[derive(Debug, Clone)]
pub struct NewtonSolver {
    pub atol: f64,
    pub rtol: f64,
    pub max_iterations: u32,
    /// Parameter for sufficient decrease (usually 1e-4)
    pub armijo_param: f64,
    /// Smallest damping factor tried by the line search.
    pub min_step_size: f64,
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self {
            atol: 1e-10,
            rtol: 1e-10,
            max_iterations: 30,
            armijo_param: 1e-4,
            min_step_size: 1.0 / 64.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("linear solve failed at Newton iteration {iteration}")]
    LinearSolveFailed { iteration: u32 },
    #[error("Newton's method failed to converge in {iterations} iterations (residual {residual:.3e})")]
    NonConvergence { iterations: u32, residual: f64 },
    #[error("residual is not finite at Newton iteration {iteration}")]
    Divergence { iteration: u32 },
}

impl SolverError {
    /// Newton iterations spent before the failure.
    pub fn iterations(&self) -> u32 {
        match self {
            SolverError::LinearSolveFailed { iteration } => *iteration,
            SolverError::NonConvergence { iterations, .. } => *iterations,
            SolverError::Divergence { iteration } => *iteration,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolverResult {
    pub solution: DVector<f64>,
    pub iterations: u32,
    pub final_residual: f64,
}

impl NewtonSolver {
    pub fn new(atol: f64, rtol: f64, max_iterations: u32) -> Self {
        Self {
            atol,
            rtol,
            max_iterations,
            ..Self::default()
        }
    }

    fn converged(&self, norm: f64, initial_norm: f64) -> bool {
        norm < self.atol || (initial_norm > 0.0 && norm / initial_norm < self.rtol)
    }

    /// Solve `F(u) = 0` starting from `initial_guess`. Constrained dofs are
    /// lifted onto their prescribed values before the first iteration.
    pub fn solve<P: NonlinearProblem>(
        &self,
        problem: &P,
        initial_guess: DVector<f64>,
    ) -> Result<SolverResult, SolverError> {
        let mut u = initial_guess;
        problem.apply_constraints(&mut u);

        let mut initial_residual = None;

        for i in 0..=self.max_iterations {
            let (residual, jacobian) = problem.residual_and_jacobian(&u);
            let res_norm = residual.norm();
            if !res_norm.is_finite() {
                return Err(SolverError::Divergence { iteration: i });
            }
            let init = *initial_residual.get_or_insert(res_norm);
            log_iteration(i, self.max_iterations, res_norm, init);

            if self.converged(res_norm, init) {
                return Ok(SolverResult {
                    solution: u,
                    iterations: i,
                    final_residual: res_norm,
                });
            }
            if i == self.max_iterations {
                return Err(SolverError::NonConvergence {
                    iterations: i,
                    residual: res_norm,
                });
            }

            let delta_u = jacobian
                .solve(&-residual)
                .ok_or(SolverError::LinearSolveFailed { iteration: i })?;

            u = self.line_search(problem, &u, &delta_u, res_norm);
        }

        // the loop returns on its last iteration
        Err(SolverError::NonConvergence {
            iterations: self.max_iterations,
            residual: f64::NAN,
        })
    }

    /// Backtracking on the residual norm: `||F(u + a du)|| < (1 - a c) ||F(u)||`.
    fn line_search<P: NonlinearProblem>(
        &self,
        problem: &P,
        u: &DVector<f64>,
        delta_u: &DVector<f64>,
        current_norm: f64,
    ) -> DVector<f64> {
        let mut alpha = 1.0;
        while alpha >= self.min_step_size {
            let candidate = u + delta_u * alpha;
            let next_norm = problem.residual(&candidate).norm();
            if next_norm < (1.0 - alpha * self.armijo_param) * current_norm {
                if alpha < 1.0 {
                    log::debug!("    damped Newton step, alpha = {alpha}");
                }
                return candidate;
            }
            alpha *= 0.5;
        }
        u + delta_u
    }
}

pub(crate) fn log_iteration(i: u32, max_iter: u32, res_norm: f64, init: f64) {
    let fraction = if init > 0.0 { res_norm / init } else { 0.0 };
    log::debug!("    Newton {i:>3}/{max_iter} | residual {res_norm:>9.3e} | fraction {fraction:>9.3e}");
}
