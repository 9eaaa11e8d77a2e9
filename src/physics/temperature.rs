use std::fmt;
use std::sync::Arc;

/// Temperature field in K, either uniform or a function of `(x, t)`.
#[derive(Clone)]
pub enum Temperature {
    Constant(f64),
    Function(Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>),
}

impl Temperature {
    pub fn function(f: impl Fn(f64, f64) -> f64 + Send + Sync + 'static) -> Self {
        Temperature::Function(Arc::new(f))
    }

    #[inline]
    pub fn value(&self, x: f64, t: f64) -> f64 {
        match self {
            Temperature::Constant(value) => *value,
            Temperature::Function(f) => f(x, t),
        }
    }

    pub fn is_time_dependent(&self) -> bool {
        matches!(self, Temperature::Function(_))
    }
}

impl From<f64> for Temperature {
    fn from(value: f64) -> Self {
        Temperature::Constant(value)
    }
}

impl fmt::Debug for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Temperature::Constant(value) => write!(f, "Constant({value} K)"),
            Temperature::Function(_) => f.write_str("Function(x, t)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_temperature_depends_on_position_and_time() {
        let temp = Temperature::function(|x, t| 300.0 + 10.0 * x + t);
        assert!(temp.is_time_dependent());
        assert_eq!(temp.value(2.0, 5.0), 325.0);

        let uniform = Temperature::from(600.0);
        assert!(!uniform.is_time_dependent());
        assert_eq!(uniform.value(1.0, 1e3), 600.0);
    }
}
