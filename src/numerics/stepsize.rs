use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Time step policy. Without `growth_factor`/`cutback_factor` the step size
/// is fixed (apart from the clamp onto the final time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stepsize {
    pub initial_value: f64,
    #[serde(default)]
    pub growth_factor: Option<f64>,
    #[serde(default)]
    pub cutback_factor: Option<f64>,
    #[serde(default)]
    pub target_nb_iterations: Option<u32>,
    #[serde(default)]
    pub max_stepsize: Option<f64>,
    #[serde(default)]
    pub min_stepsize: Option<f64>,
}

impl Stepsize {
    pub fn new(initial_value: f64) -> Self {
        Self {
            initial_value,
            growth_factor: None,
            cutback_factor: None,
            target_nb_iterations: None,
            max_stepsize: None,
            min_stepsize: None,
        }
    }

    /// Enable adaptivity: grow by `growth_factor` after easy steps, cut back
    /// by `cutback_factor` after failed ones.
    pub fn adaptive(mut self, growth_factor: f64, cutback_factor: f64, target_nb_iterations: u32) -> Self {
        self.growth_factor = Some(growth_factor);
        self.cutback_factor = Some(cutback_factor);
        self.target_nb_iterations = Some(target_nb_iterations);
        self
    }

    pub fn with_bounds(mut self, min_stepsize: Option<f64>, max_stepsize: Option<f64>) -> Self {
        self.min_stepsize = min_stepsize;
        self.max_stepsize = max_stepsize;
        self
    }

    pub fn is_adaptive(&self) -> bool {
        self.growth_factor.is_some() || self.cutback_factor.is_some()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::InvalidSettings(msg));
        if !(self.initial_value > 0.0 && self.initial_value.is_finite()) {
            return invalid(format!(
                "initial stepsize must be positive, got {}",
                self.initial_value
            ));
        }
        if let Some(g) = self.growth_factor {
            if !(g >= 1.0) {
                return invalid(format!("growth_factor must be >= 1, got {g}"));
            }
        }
        if let Some(c) = self.cutback_factor {
            if !(c > 0.0 && c < 1.0) {
                return invalid(format!("cutback_factor must lie in (0, 1), got {c}"));
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_stepsize, self.max_stepsize) {
            if lo > hi {
                return invalid(format!("min_stepsize {lo} exceeds max_stepsize {hi}"));
            }
        }
        Ok(())
    }

    /// Step size for the next step after a converged one.
    pub fn grow(&self, dt: f64, iterations: u32) -> f64 {
        let (Some(growth), Some(target)) = (self.growth_factor, self.target_nb_iterations) else {
            return dt;
        };
        let next = if iterations < target { dt * growth } else { dt };
        self.max_stepsize.map_or(next, |max| next.min(max))
    }

    /// Reduced step size after a failed step, or `None` when the step
    /// cannot be retried.
    pub fn cut_back(&self, dt: f64) -> Option<f64> {
        let next = dt * self.cutback_factor?;
        match self.min_stepsize {
            Some(min) if next < min => None,
            _ if next <= 0.0 => None,
            _ => Some(next),
        }
    }
}

impl From<f64> for Stepsize {
    fn from(initial_value: f64) -> Self {
        Stepsize::new(initial_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_stepsize_never_changes() {
        let s = Stepsize::new(0.1);
        assert!(!s.is_adaptive());
        assert_eq!(s.grow(0.1, 1), 0.1);
        assert_eq!(s.cut_back(0.1), None);
    }

    #[test]
    fn adaptive_stepsize_grows_and_cuts_back_within_bounds() {
        let s = Stepsize::new(1.0)
            .adaptive(1.5, 0.5, 4)
            .with_bounds(Some(0.2), Some(2.0));
        assert_eq!(s.grow(1.0, 2), 1.5);
        assert_eq!(s.grow(1.0, 4), 1.0);
        assert_eq!(s.grow(1.5, 1), 2.0);
        assert_eq!(s.cut_back(1.0), Some(0.5));
        assert_eq!(s.cut_back(0.3), None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Stepsize::new(0.0).validate().is_err());
        assert!(Stepsize::new(1.0).adaptive(1.1, 1.5, 3).validate().is_err());
        assert!(Stepsize::new(1.0).adaptive(1.1, 0.5, 3).validate().is_ok());
    }
}
