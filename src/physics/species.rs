use crate::error::{ConfigError, MissingSolutionError};
use crate::physics::function_space::{SpeciesState, component_of};
use crate::physics::material::arrhenius;
use nalgebra::DVector;
use std::fmt;
use std::sync::Arc;

/// A hydrogen species. Pure data: solution fields are bound later by the
/// field allocator into a [`SpeciesState`].
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub name: String,
    pub mobile: bool,
}

impl Species {
    pub fn new(name: impl Into<String>, mobile: bool) -> Self {
        Self {
            name: name.into(),
            mobile,
        }
    }

    pub fn mobile(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    pub fn immobile(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Species identifier stored as a runtime string. Resolved to a field
/// component once, at initialisation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpeciesRef(pub Arc<str>);

impl SpeciesRef {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SpeciesRef {
    fn from(name: &str) -> Self {
        SpeciesRef::new(name)
    }
}

impl From<String> for SpeciesRef {
    fn from(name: String) -> Self {
        SpeciesRef::new(name)
    }
}

impl From<&Species> for SpeciesRef {
    fn from(species: &Species) -> Self {
        SpeciesRef::new(species.name.as_str())
    }
}

impl AsRef<Species> for Species {
    fn as_ref(&self) -> &Species {
        self
    }
}

/// Exact-match lookup by name, over plain species or anything carrying one.
pub fn find_species_from_name<'a, S: AsRef<Species>>(
    name: &str,
    species: &'a [S],
) -> Result<&'a S, ConfigError> {
    species
        .iter()
        .find(|s| s.as_ref().name == name)
        .ok_or_else(|| ConfigError::SpeciesNotFound(name.to_string()))
}

/// Species defined by a conservation law, `c = n - sum(others)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImplicitSpecies {
    pub name: Option<String>,
    pub n: f64,
    pub others: Vec<SpeciesRef>,
}

impl ImplicitSpecies {
    pub fn new(n: f64, others: Vec<SpeciesRef>) -> Self {
        Self {
            name: None,
            n,
            others,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| "implicit species".into())
    }

    /// Field components of the `others`, in declaration order.
    pub fn components(&self, states: &[SpeciesState]) -> Result<Vec<usize>, MissingSolutionError> {
        self.others
            .iter()
            .map(|other| {
                component_of(other.name(), states).map_err(|_| MissingSolutionError {
                    implicit: self.label(),
                    missing: other.name().to_string(),
                })
            })
            .collect()
    }

    /// Vertex values of `n - sum(others)` for the stacked unknown `u`.
    pub fn concentration(
        &self,
        states: &[SpeciesState],
        u: &DVector<f64>,
    ) -> Result<DVector<f64>, MissingSolutionError> {
        let components = self.components(states)?;
        let Some(first) = states.first() else {
            return Err(MissingSolutionError {
                implicit: self.label(),
                missing: self
                    .others
                    .first()
                    .map_or_else(|| "<none>".to_string(), |o| o.name().to_string()),
            });
        };
        let space = first.solution;
        let mut c = DVector::from_element(space.num_vertices(u), self.n);
        for component in components {
            for (i, value) in c.iter_mut().enumerate() {
                *value -= u[i * space.num_components + component];
            }
        }
        Ok(c)
    }
}

/// One participant on the left hand side of a reaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Reactant {
    Species(SpeciesRef),
    Implicit(ImplicitSpecies),
}

impl From<&Species> for Reactant {
    fn from(species: &Species) -> Self {
        Reactant::Species(species.into())
    }
}

impl From<&str> for Reactant {
    fn from(name: &str) -> Self {
        Reactant::Species(name.into())
    }
}

impl From<ImplicitSpecies> for Reactant {
    fn from(implicit: ImplicitSpecies) -> Self {
        Reactant::Implicit(implicit)
    }
}

/// `reactants <-> product` inside one volume, with net rate
/// `k_0 exp(-E_k/kT) prod(reactants) - p_0 exp(-E_p/kT) product`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub reactants: Vec<Reactant>,
    pub product: SpeciesRef,
    pub k_0: f64,
    pub e_k: f64,
    pub p_0: f64,
    pub e_p: f64,
    pub volume: usize,
}

impl Reaction {
    pub fn new(
        reactants: Vec<Reactant>,
        product: impl Into<SpeciesRef>,
        (k_0, e_k): (f64, f64),
        (p_0, e_p): (f64, f64),
        volume: usize,
    ) -> Self {
        Self {
            reactants,
            product: product.into(),
            k_0,
            e_k,
            p_0,
            e_p,
            volume,
        }
    }

    /// Forward and backward rate constants at `temperature`.
    pub fn rate_constants(&self, temperature: f64) -> (f64, f64) {
        (
            arrhenius(self.k_0, self.e_k, temperature),
            arrhenius(self.p_0, self.e_p, temperature),
        )
    }
}

/// Convenience for one mobile species trapped on one trap level. Activating
/// it creates the trapped species, the free-site implicit species and the
/// trapping reaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Trap {
    pub name: String,
    pub mobile_species: SpeciesRef,
    pub k_0: f64,
    pub e_k: f64,
    pub p_0: f64,
    pub e_p: f64,
    pub n: f64,
    pub volume: usize,
    trapped_concentration: Option<Species>,
    reaction: Option<Reaction>,
}

impl Trap {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        mobile_species: impl Into<SpeciesRef>,
        (k_0, e_k): (f64, f64),
        (p_0, e_p): (f64, f64),
        n: f64,
        volume: usize,
    ) -> Self {
        Self {
            name: name.into(),
            mobile_species: mobile_species.into(),
            k_0,
            e_k,
            p_0,
            e_p,
            n,
            volume,
            trapped_concentration: None,
            reaction: None,
        }
    }

    pub fn trapped_concentration(&self) -> Option<&Species> {
        self.trapped_concentration.as_ref()
    }

    pub fn reaction(&self) -> Option<&Reaction> {
        self.reaction.as_ref()
    }

    /// Append the trapped species and the trapping reaction to the model.
    /// A second call is rejected and leaves both lists untouched.
    pub fn create_species_and_reaction(
        &mut self,
        species: &mut Vec<Species>,
        reactions: &mut Vec<Reaction>,
    ) -> Result<(), ConfigError> {
        if self.trapped_concentration.is_some() {
            return Err(ConfigError::TrapAlreadyActivated(self.name.clone()));
        }

        let trapped = Species::immobile(self.name.as_str());
        let trap_sites = ImplicitSpecies::new(self.n, vec![SpeciesRef::from(&trapped)])
            .named(format!("{}_sites", self.name));
        let reaction = Reaction::new(
            vec![
                Reactant::Species(self.mobile_species.clone()),
                Reactant::Implicit(trap_sites),
            ],
            &trapped,
            (self.k_0, self.e_k),
            (self.p_0, self.e_p),
            self.volume,
        );

        species.push(trapped.clone());
        reactions.push(reaction.clone());
        self.trapped_concentration = Some(trapped);
        self.reaction = Some(reaction);
        Ok(())
    }
}
