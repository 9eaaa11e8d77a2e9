use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector, Dyn, U1};
use num_dual::{Derivative, DualDVec64, DualNum};

use crate::discretization::mesh::{Cell, Mesh1D};
use crate::discretization::subdomain::{MeshTags, VolumeSubdomain1D};
use crate::error::ConfigError;
use crate::physics::NonlinearProblem;
use crate::physics::bc::{BcKind, BoundaryCondition, BoundaryConstraint, ValueFn};
use crate::physics::function_space::{FunctionSpace, SpeciesState, component_of};
use crate::numerics::sparse::SparseJacobian;
use crate::physics::material::DiffusivityModel;
use crate::physics::source::Source;
use crate::physics::species::{Reactant, Reaction, Species};
use crate::physics::temperature::Temperature;

/// A reactant resolved to field components.
#[derive(Debug, Clone)]
enum ReactantTerm {
    Field(usize),
    Implicit { n: f64, others: Vec<usize> },
}

#[derive(Debug, Clone)]
struct ResolvedReaction {
    reactants: Vec<ReactantTerm>,
    product: usize,
    kinetics: Reaction,
    /// Lumped vertex mass restricted to the owning volume.
    weights: Vec<f64>,
    /// Forward and backward rate constants per vertex at the current time.
    rates: Vec<(f64, f64)>,
}

#[derive(Clone)]
struct ResolvedSource {
    component: usize,
    value: ValueFn,
    weights: Vec<f64>,
    values: Vec<f64>,
}

/// Inputs of [`Formulation::new`], all names still unresolved.
pub struct FormulationInputs<'a> {
    pub mesh: &'a Mesh1D,
    pub tags: &'a MeshTags,
    pub volumes: &'a [VolumeSubdomain1D],
    pub species: &'a [SpeciesState],
    pub reactions: &'a [Reaction],
    pub boundary_conditions: &'a [BoundaryCondition],
    pub source: Option<&'a Source>,
    pub temperature: &'a Temperature,
}

/// Discrete residual of the coupled diffusion-reaction system.
///
/// P1 elements on the interval mesh; the transient, reaction and source
/// terms use the lumped mass so that reactions couple species pointwise at
/// the vertices. Everything that depends on `t` (temperature, coefficients,
/// boundary values) is refreshed by [`Formulation::prepare_time_step`].
pub struct Formulation {
    mesh: Mesh1D,
    space: FunctionSpace,
    species: Vec<Species>,
    cell_materials: Vec<Option<Arc<dyn DiffusivityModel>>>,
    mass: Vec<f64>,
    reactions: Vec<ResolvedReaction>,
    constraints: Vec<BoundaryConstraint>,
    source: Option<ResolvedSource>,
    temperature: Temperature,

    t: f64,
    dt: f64,
    /// Diffusion coefficient per cell (rows) and component (columns).
    diffusivity: DMatrix<f64>,
    /// Diffusivities and rate constants are current for a constant
    /// temperature.
    coefficients_ready: bool,
    u_prev: DVector<f64>,
}

/// Lumped vertex mass of the cells carrying `volume_id`.
fn volume_weights(mesh: &Mesh1D, tags: &MeshTags, volume_id: usize) -> Vec<f64> {
    let mut weights = vec![0.0; mesh.num_vertices()];
    for cell_id in tags.cells_in(volume_id) {
        let cell = &mesh.cells[cell_id];
        for &v in &cell.vertex_ids {
            weights[v] += 0.5 * cell.length;
        }
    }
    weights
}

/// Seed one dual number per local unknown.
fn seed(values: &[f64]) -> Vec<DualDVec64> {
    let n = values.len();
    values
        .iter()
        .enumerate()
        .map(|(j, &v)| DualDVec64::new(v, Derivative::derivative_generic(Dyn(n), U1, j)))
        .collect()
}

impl Formulation {
    /// Resolve every name and id against the allocated fields and the mesh
    /// tags. After this no lookup by name happens during stepping.
    pub fn new(inputs: FormulationInputs<'_>) -> Result<Self, ConfigError> {
        let FormulationInputs {
            mesh,
            tags,
            volumes,
            species,
            reactions,
            boundary_conditions,
            source,
            temperature,
        } = inputs;

        let space = FunctionSpace::new(mesh.num_vertices(), species.len());
        let materials: HashMap<usize, Arc<dyn DiffusivityModel>> = volumes
            .iter()
            .map(|v| (v.id, v.material.clone()))
            .collect();
        let check_volume = |id: usize| {
            if materials.contains_key(&id) {
                Ok(())
            } else {
                Err(ConfigError::UnknownVolume(id))
            }
        };

        let cell_materials: Vec<_> = tags
            .cells
            .iter()
            .map(|tag| materials.get(tag).cloned())
            .collect();
        let untagged = cell_materials.iter().filter(|m| m.is_none()).count();
        if untagged > 0 {
            log::warn!("{untagged} cells belong to no volume subdomain and carry no diffusion");
        }

        let mut resolved_reactions = Vec::with_capacity(reactions.len());
        for reaction in reactions {
            check_volume(reaction.volume)?;
            let reactants = reaction
                .reactants
                .iter()
                .map(|reactant| match reactant {
                    Reactant::Species(name) => {
                        component_of(name.name(), species).map(ReactantTerm::Field)
                    }
                    Reactant::Implicit(implicit) => Ok(ReactantTerm::Implicit {
                        n: implicit.n,
                        others: implicit.components(species)?,
                    }),
                })
                .collect::<Result<Vec<_>, ConfigError>>()?;
            resolved_reactions.push(ResolvedReaction {
                reactants,
                product: component_of(reaction.product.name(), species)?,
                kinetics: reaction.clone(),
                weights: volume_weights(mesh, tags, reaction.volume),
                rates: vec![(0.0, 0.0); mesh.num_vertices()],
            });
        }

        let mut constraints = Vec::with_capacity(boundary_conditions.len());
        for bc in boundary_conditions {
            let component = component_of(bc.species.name(), species)?;
            let facet = tags
                .facet_of(bc.subdomain)
                .ok_or(ConfigError::UnknownSurface(bc.subdomain))?;
            let x = mesh.facets[facet].x;
            constraints.push(BoundaryConstraint::new(
                bc,
                component,
                facet,
                space.dof(facet, component),
                x,
            ));
        }

        let source = source
            .map(|src| -> Result<ResolvedSource, ConfigError> {
                check_volume(src.volume)?;
                Ok(ResolvedSource {
                    component: component_of(src.species.name(), species)?,
                    value: src.value.clone(),
                    weights: volume_weights(mesh, tags, src.volume),
                    values: vec![0.0; mesh.num_vertices()],
                })
            })
            .transpose()?;

        log::debug!(
            "formulation: {} dofs, {} reactions, {} boundary conditions, source: {}",
            space.num_dofs(),
            resolved_reactions.len(),
            constraints.len(),
            source.is_some()
        );

        Ok(Self {
            mesh: mesh.clone(),
            space,
            species: species.iter().map(|s| s.species.clone()).collect(),
            cell_materials,
            mass: mesh.lumped_mass(),
            reactions: resolved_reactions,
            constraints,
            source,
            temperature: temperature.clone(),
            t: 0.0,
            dt: 1.0,
            diffusivity: DMatrix::zeros(mesh.cells.len(), species.len()),
            coefficients_ready: false,
            u_prev: DVector::zeros(space.num_dofs()),
        })
    }

    pub fn mesh(&self) -> &Mesh1D {
        &self.mesh
    }

    pub fn space(&self) -> FunctionSpace {
        self.space
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    #[inline]
    pub fn diffusivity(&self, cell: usize, component: usize) -> f64 {
        self.diffusivity[(cell, component)]
    }

    /// Re-evaluate every time dependent quantity at `t` and store the
    /// previous solution for the transient term.
    pub fn prepare_time_step(&mut self, t: f64, dt: f64, u_prev: &DVector<f64>) {
        self.t = t;
        self.dt = dt;
        self.u_prev.copy_from(u_prev);

        let vertex_temperature: Vec<f64> = self
            .mesh
            .vertices
            .iter()
            .map(|&x| self.temperature.value(x, t))
            .collect();

        if self.temperature.is_time_dependent() || !self.coefficients_ready {
            self.update_coefficients(t, &vertex_temperature);
        }

        if let Some(src) = &mut self.source {
            for ((value, &x), &temp) in src
                .values
                .iter_mut()
                .zip(&self.mesh.vertices)
                .zip(&vertex_temperature)
            {
                *value = (src.value)(x, t, temp);
            }
        }

        for constraint in &mut self.constraints {
            constraint.update(t, &self.temperature);
        }
    }

    fn update_coefficients(&mut self, t: f64, vertex_temperature: &[f64]) {
        for cell in &self.mesh.cells {
            let temperature = self.temperature.value(cell.midpoint, t);
            for (c, spe) in self.species.iter().enumerate() {
                self.diffusivity[(cell.id, c)] = match &self.cell_materials[cell.id] {
                    Some(material) if spe.mobile => {
                        material.diffusion_coefficient(temperature, spe, &self.species)
                    }
                    _ => 0.0,
                };
            }
        }

        for reaction in &mut self.reactions {
            for (rate, &temp) in reaction.rates.iter_mut().zip(vertex_temperature) {
                *rate = reaction.kinetics.rate_constants(temp);
            }
        }
        self.coefficients_ready = true;
    }

    /// Diffusion term of one cell. Local layout: `[u_a(0..k), u_b(0..k)]`.
    fn cell_residual<T: DualNum<f64>>(&self, cell: &Cell, u_local: &[T]) -> Vec<T> {
        let k = self.space.num_components;
        let mut res = vec![T::from(0.0); 2 * k];
        for c in 0..k {
            let d = self.diffusivity[(cell.id, c)];
            if d == 0.0 {
                continue;
            }
            let flux = (u_local[k + c].clone() - u_local[c].clone()) * (d / cell.length);
            res[c] = -flux.clone();
            res[k + c] = flux;
        }
        res
    }

    /// Transient, reaction and source terms of one vertex.
    fn vertex_residual<T: DualNum<f64>>(&self, vertex: usize, u_local: &[T]) -> Vec<T> {
        let k = self.space.num_components;
        let storage = self.mass[vertex] / self.dt;
        let mut res: Vec<T> = (0..k)
            .map(|c| {
                (u_local[c].clone() - T::from(self.u_prev[self.space.dof(vertex, c)])) * storage
            })
            .collect();

        for reaction in &self.reactions {
            let w = reaction.weights[vertex];
            if w == 0.0 {
                continue;
            }
            let (k_f, k_b) = reaction.rates[vertex];
            let mut forward = T::from(k_f);
            for reactant in &reaction.reactants {
                let value = match reactant {
                    ReactantTerm::Field(c) => u_local[*c].clone(),
                    ReactantTerm::Implicit { n, others } => {
                        let mut free = T::from(*n);
                        for &o in others {
                            free -= u_local[o].clone();
                        }
                        free
                    }
                };
                forward = forward * value;
            }
            let rate = forward - u_local[reaction.product].clone() * k_b;

            res[reaction.product] -= rate.clone() * w;
            for reactant in &reaction.reactants {
                if let ReactantTerm::Field(c) = reactant {
                    res[*c] += rate.clone() * w;
                }
            }
        }

        if let Some(src) = &self.source {
            let w = src.weights[vertex];
            if w != 0.0 {
                res[src.component] -= T::from(src.values[vertex] * w);
            }
        }
        res
    }

    fn cell_dofs(&self, cell: &Cell) -> Vec<usize> {
        let k = self.space.num_components;
        cell.vertex_ids
            .iter()
            .flat_map(|&v| (0..k).map(move |c| v * k + c))
            .collect()
    }

    /// Boundary contributions: flux terms first, then the Dirichlet rows.
    fn apply_boundary_rows(&self, u: &DVector<f64>, residual: &mut DVector<f64>) {
        for bc in self
            .constraints
            .iter()
            .filter(|bc| bc.kind == BcKind::ParticleFlux)
        {
            residual[bc.dof] -= bc.current();
        }
        for bc in self
            .constraints
            .iter()
            .filter(|bc| bc.kind == BcKind::Dirichlet)
        {
            residual[bc.dof] = u[bc.dof] - bc.current();
        }
    }
}

impl NonlinearProblem for Formulation {
    fn num_unknowns(&self) -> usize {
        self.space.num_dofs()
    }

    fn apply_constraints(&self, u: &mut DVector<f64>) {
        for bc in self
            .constraints
            .iter()
            .filter(|bc| bc.kind == BcKind::Dirichlet)
        {
            u[bc.dof] = bc.current();
        }
    }

    fn residual(&self, u: &DVector<f64>) -> DVector<f64> {
        let k = self.space.num_components;
        let mut residual = DVector::zeros(self.num_unknowns());

        for cell in &self.mesh.cells {
            let dofs = self.cell_dofs(cell);
            let local: Vec<f64> = dofs.iter().map(|&d| u[d]).collect();
            for (&dof, value) in dofs.iter().zip(self.cell_residual(cell, &local)) {
                residual[dof] += value;
            }
        }

        for vertex in 0..self.space.num_vertices {
            let local: Vec<f64> = u.rows(vertex * k, k).iter().copied().collect();
            for (c, value) in self
                .vertex_residual(vertex, &local)
                .into_iter()
                .enumerate()
            {
                residual[vertex * k + c] += value;
            }
        }

        self.apply_boundary_rows(u, &mut residual);
        residual
    }

    fn residual_and_jacobian(&self, u: &DVector<f64>) -> (DVector<f64>, SparseJacobian) {
        let k = self.space.num_components;
        let n = self.num_unknowns();
        let mut residual = DVector::zeros(n);
        // (2k)^2 entries per cell, k^2 per vertex
        let entries = 4 * k * k * self.mesh.cells.len() + k * k * self.space.num_vertices;
        let mut jacobian = SparseJacobian::with_capacity(n, entries);

        for cell in &self.mesh.cells {
            let dofs = self.cell_dofs(cell);
            let local: Vec<f64> = dofs.iter().map(|&d| u[d]).collect();
            let res = self.cell_residual(cell, &seed(&local));
            for (lr, rd) in res.into_iter().enumerate() {
                residual[dofs[lr]] += rd.re;
                let deriv = rd.eps.unwrap_generic(Dyn(2 * k), U1);
                for (lc, &col) in dofs.iter().enumerate() {
                    jacobian.add(dofs[lr], col, deriv[(lc, 0)]);
                }
            }
        }

        for vertex in 0..self.space.num_vertices {
            let base = vertex * k;
            let local: Vec<f64> = u.rows(base, k).iter().copied().collect();
            let res = self.vertex_residual(vertex, &seed(&local));
            for (lr, rd) in res.into_iter().enumerate() {
                residual[base + lr] += rd.re;
                let deriv = rd.eps.unwrap_generic(Dyn(k), U1);
                for lc in 0..k {
                    jacobian.add(base + lr, base + lc, deriv[(lc, 0)]);
                }
            }
        }

        self.apply_boundary_rows(u, &mut residual);
        let dirichlet_rows: Vec<usize> = self
            .constraints
            .iter()
            .filter(|bc| bc.kind == BcKind::Dirichlet)
            .map(|bc| bc.dof)
            .collect();
        jacobian.set_identity_rows(&dirichlet_rows);

        (residual, jacobian)
    }
}
