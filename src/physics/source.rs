use std::fmt;

use crate::physics::bc::{IntoValueFn, ValueFn};
use crate::physics::species::SpeciesRef;

/// Volumetric particle source `S(x, t, T)` acting on one species inside one
/// volume subdomain.
#[derive(Clone)]
pub struct Source {
    pub species: SpeciesRef,
    pub volume: usize,
    pub value: ValueFn,
}

impl Source {
    pub fn new(value: impl IntoValueFn, volume: usize, species: impl Into<SpeciesRef>) -> Self {
        Self {
            species: species.into(),
            volume,
            value: value.into_value_fn(),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("species", &self.species.name())
            .field("volume", &self.volume)
            .finish()
    }
}
