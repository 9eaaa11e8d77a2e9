use std::fmt;
use std::sync::Arc;

use crate::physics::species::SpeciesRef;
use crate::physics::temperature::Temperature;

/// Shared function type for boundary and source values that may depend on
/// position, time and temperature: `f(x, t, T)`.
pub type ValueFn = Arc<dyn Fn(f64, f64, f64) -> f64 + Send + Sync>;

/// Local trait allowing convenient conversion into [`ValueFn`].
pub trait IntoValueFn {
    fn into_value_fn(self) -> ValueFn;
}

fn constant(val: f64) -> ValueFn {
    Arc::new(move |_, _, _| val)
}

impl IntoValueFn for f64 {
    fn into_value_fn(self) -> ValueFn {
        constant(self)
    }
}

impl<F> IntoValueFn for F
where
    F: Fn(f64, f64, f64) -> f64 + Send + Sync + 'static,
{
    fn into_value_fn(self) -> ValueFn {
        Arc::new(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BcKind {
    /// Imposed concentration, enforced strongly on the facet dof.
    Dirichlet,
    /// Imposed inward particle flux `D grad(c) . n = q`.
    ParticleFlux,
}

#[derive(Clone)]
pub struct BoundaryCondition {
    pub kind: BcKind,
    pub species: SpeciesRef,
    /// Surface subdomain id.
    pub subdomain: usize,
    pub value: ValueFn,
}

impl BoundaryCondition {
    pub fn dirichlet(
        subdomain: usize,
        value: impl IntoValueFn,
        species: impl Into<SpeciesRef>,
    ) -> Self {
        Self {
            kind: BcKind::Dirichlet,
            species: species.into(),
            subdomain,
            value: value.into_value_fn(),
        }
    }

    pub fn particle_flux(
        subdomain: usize,
        value: impl IntoValueFn,
        species: impl Into<SpeciesRef>,
    ) -> Self {
        Self {
            kind: BcKind::ParticleFlux,
            species: species.into(),
            subdomain,
            value: value.into_value_fn(),
        }
    }
}

impl fmt::Debug for BoundaryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryCondition")
            .field("kind", &self.kind)
            .field("species", &self.species.name())
            .field("subdomain", &self.subdomain)
            .finish()
    }
}

/// A boundary condition linked to the discretization: the facet vertex and
/// the species component are fixed, only the prescribed value changes.
#[derive(Clone)]
pub struct BoundaryConstraint {
    pub kind: BcKind,
    pub component: usize,
    pub vertex: usize,
    pub dof: usize,
    pub x: f64,
    value: ValueFn,
    current: f64,
}

impl BoundaryConstraint {
    pub fn new(bc: &BoundaryCondition, component: usize, vertex: usize, dof: usize, x: f64) -> Self {
        Self {
            kind: bc.kind,
            component,
            vertex,
            dof,
            x,
            value: bc.value.clone(),
            current: 0.0,
        }
    }

    /// Re-evaluate the prescribed value at time `t`.
    pub fn update(&mut self, t: f64, temperature: &Temperature) {
        self.current = (self.value)(self.x, t, temperature.value(self.x, t));
    }

    #[inline]
    pub fn current(&self) -> f64 {
        self.current
    }
}
