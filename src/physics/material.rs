use crate::physics::species::Species;
use std::collections::HashMap;
use std::fmt::Debug;

/// Boltzmann constant in eV/K.
pub const K_B: f64 = 8.617333262e-5;

/// Arrhenius law `pre_exp * exp(-activation / (k_B * T))`.
#[inline]
pub fn arrhenius(pre_exp: f64, activation_energy: f64, temperature: f64) -> f64 {
    pre_exp * (-activation_energy / (K_B * temperature)).exp()
}

/// Supplies the diffusion coefficient of a species inside one volume.
///
/// `all_species` is the frozen species list of the problem, so models may
/// depend on other species (e.g. a trap density).
pub trait DiffusivityModel: Debug + Send + Sync {
    fn diffusion_coefficient(&self, temperature: f64, species: &Species, all_species: &[Species])
    -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrheniusParams {
    pub d_0: f64,
    pub e_d: f64,
}

/// A material with an Arrhenius diffusivity, optionally overridden per
/// species name.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub default: ArrheniusParams,
    pub per_species: HashMap<String, ArrheniusParams>,
}

impl Material {
    pub fn new(d_0: f64, e_d: f64) -> Self {
        Self {
            name: None,
            default: ArrheniusParams { d_0, e_d },
            per_species: HashMap::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_species(mut self, species: impl Into<String>, d_0: f64, e_d: f64) -> Self {
        self.per_species
            .insert(species.into(), ArrheniusParams { d_0, e_d });
        self
    }
}

impl DiffusivityModel for Material {
    fn diffusion_coefficient(
        &self,
        temperature: f64,
        species: &Species,
        _all_species: &[Species],
    ) -> f64 {
        let params = self.per_species.get(&species.name).unwrap_or(&self.default);
        arrhenius(params.d_0, params.e_d, temperature)
    }
}
