use crate::error::SimulationError;
use crate::numerics::solver::NewtonSolver;
use crate::numerics::stepsize::Stepsize;
use crate::physics::formulation::Formulation;
use nalgebra::DVector;

/// Everything that changes from one time step to the next.
#[derive(Debug, Clone)]
pub struct SimulationState {
    pub t: f64,
    pub dt: f64,
    /// Current unknown.
    pub u: DVector<f64>,
    /// Unknown of the last converged step.
    pub u_n: DVector<f64>,
    /// Number of converged steps.
    pub steps: usize,
}

/// Outcome of one converged step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub t: f64,
    pub dt: f64,
    pub iterations: u32,
}

impl SimulationState {
    pub fn new(u0: DVector<f64>, dt: f64) -> Self {
        Self {
            t: 0.0,
            dt,
            u: u0.clone(),
            u_n: u0,
            steps: 0,
        }
    }

    /// True once `t` has reached `final_time`, within round-off.
    pub fn is_finished(&self, final_time: f64) -> bool {
        self.t >= final_time - time_tolerance(final_time)
    }
}

#[inline]
fn time_tolerance(final_time: f64) -> f64 {
    1e-9 * final_time.abs()
}

/// Size of the next step and the time it lands on. A remainder within
/// round-off of `dt` is taken in one step that lands exactly on
/// `final_time`.
pub fn next_step(t: f64, dt: f64, final_time: f64) -> (f64, f64) {
    let remaining = final_time - t;
    if remaining <= dt + time_tolerance(final_time) {
        (remaining, final_time)
    } else {
        (dt, t + dt)
    }
}

/// Advance `state` by one implicit Euler step.
///
/// Boundary values and coefficients are re-evaluated at the new time before
/// the Newton solve. With an adaptive `stepsize` a failed solve is retried
/// with a smaller step; otherwise the failure is returned and `state` is
/// left at the last converged step.
pub fn advance(
    state: &mut SimulationState,
    formulation: &mut Formulation,
    solver: &NewtonSolver,
    stepsize: &Stepsize,
    final_time: f64,
) -> Result<StepReport, SimulationError> {
    loop {
        let (dt_step, t_new) = next_step(state.t, state.dt, final_time);
        formulation.prepare_time_step(t_new, dt_step, &state.u_n);

        match solver.solve(&*formulation, state.u_n.clone()) {
            Ok(result) => {
                state.t = t_new;
                state.u = result.solution;
                state.u_n.copy_from(&state.u);
                state.steps += 1;
                state.dt = stepsize.grow(state.dt, result.iterations);
                return Ok(StepReport {
                    t: t_new,
                    dt: dt_step,
                    iterations: result.iterations,
                });
            }
            // cut back the step actually attempted, which may have been clamped
            Err(source) => match stepsize.cut_back(dt_step) {
                Some(dt) => {
                    log::warn!(
                        "step to t = {t_new:.4e} failed ({source}), cutting dt {dt_step:.3e} -> {dt:.3e}"
                    );
                    state.dt = dt;
                }
                None => {
                    return Err(SimulationError::ConvergenceFailure {
                        t: t_new,
                        iterations: source.iterations(),
                        source,
                    });
                }
            },
        }
    }
}
