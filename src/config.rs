//! Run settings and TOML scenario files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::discretization::generator::MeshSource;
use crate::discretization::subdomain::{Subdomain, SurfaceSubdomain1D, VolumeSubdomain1D};
use crate::error::ConfigError;
use crate::numerics::stepsize::Stepsize;
use crate::physics::bc::BoundaryCondition;
use crate::physics::initial::InitialCondition;
use crate::physics::material::Material;
use crate::physics::source::Source;
use crate::physics::species::{Species, Trap};
use crate::physics::temperature::Temperature;
use crate::problem::HydrogenTransportProblem;
use crate::processing::export::CsvExport;
use crate::processing::flux::DerivedQuantity;

fn default_max_iterations() -> u32 {
    30
}

fn default_tolerance() -> f64 {
    1e-10
}

fn default_true() -> bool {
    true
}

/// Solver and time stepping settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_tolerance")]
    pub atol: f64,
    #[serde(default = "default_tolerance")]
    pub rtol: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    pub final_time: f64,
    pub stepsize: Stepsize,
}

impl Settings {
    pub fn new(final_time: f64, stepsize: impl Into<Stepsize>) -> Self {
        Self {
            atol: default_tolerance(),
            rtol: default_tolerance(),
            max_iterations: default_max_iterations(),
            final_time,
            stepsize: stepsize.into(),
        }
    }

    pub fn with_tolerances(mut self, atol: f64, rtol: f64) -> Self {
        self.atol = atol;
        self.rtol = rtol;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.final_time > 0.0 && self.final_time.is_finite()) {
            return Err(ConfigError::InvalidSettings(format!(
                "final_time must be positive, got {}",
                self.final_time
            )));
        }
        if !(self.atol >= 0.0) || !(self.rtol >= 0.0) {
            return Err(ConfigError::InvalidSettings(format!(
                "tolerances must be non-negative, got atol = {}, rtol = {}",
                self.atol, self.rtol
            )));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidSettings(
                "max_iterations must be at least 1".into(),
            ));
        }
        self.stepsize.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesDiffusivity {
    pub species: String,
    pub d_0: f64,
    pub e_d: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub id: usize,
    pub borders: [f64; 2],
    #[serde(default)]
    pub material: Option<String>,
    pub d_0: f64,
    #[serde(default)]
    pub e_d: f64,
    #[serde(default)]
    pub species_diffusivity: Vec<SpeciesDiffusivity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub mobile: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrapConfig {
    pub name: String,
    pub mobile_species: String,
    pub k_0: f64,
    #[serde(default)]
    pub e_k: f64,
    pub p_0: f64,
    #[serde(default)]
    pub e_p: f64,
    pub n: f64,
    pub volume: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BcKindConfig {
    Dirichlet,
    ParticleFlux,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryConditionConfig {
    pub kind: BcKindConfig,
    pub surface: usize,
    pub species: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub volume: usize,
    pub species: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialConditionConfig {
    pub species: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivedQuantityConfig {
    SurfaceFlux {
        species: String,
        surface: usize,
    },
    TotalVolume {
        species: String,
        #[serde(default)]
        volume: Option<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    pub directory: PathBuf,
    #[serde(default)]
    pub species: Vec<String>,
}

/// A complete problem description with constant boundary data, as read
/// from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub mesh: MeshSource,
    pub temperature: f64,
    pub settings: Settings,
    pub volumes: Vec<VolumeConfig>,
    #[serde(default)]
    pub surfaces: Vec<SurfaceSubdomain1D>,
    #[serde(default)]
    pub species: Vec<SpeciesConfig>,
    #[serde(default)]
    pub traps: Vec<TrapConfig>,
    #[serde(default)]
    pub boundary_conditions: Vec<BoundaryConditionConfig>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub initial_conditions: Vec<InitialConditionConfig>,
    #[serde(default)]
    pub derived_quantities: Vec<DerivedQuantityConfig>,
    #[serde(default)]
    pub export: Option<ExportConfig>,
}

impl ScenarioConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Build the (uninitialised) problem described by this scenario.
    pub fn into_problem(self) -> Result<HydrogenTransportProblem, ConfigError> {
        let mesh = self.mesh.build()?;
        let mut problem = HydrogenTransportProblem::new(mesh, self.settings);
        problem.temperature = Some(Temperature::Constant(self.temperature));

        for vol in self.volumes {
            let mut material = Material::new(vol.d_0, vol.e_d);
            if let Some(name) = vol.material {
                material = material.named(name);
            }
            for sd in vol.species_diffusivity {
                material = material.with_species(sd.species, sd.d_0, sd.e_d);
            }
            problem
                .subdomains
                .push(VolumeSubdomain1D::new(vol.id, vol.borders, material).into());
        }
        problem
            .subdomains
            .extend(self.surfaces.into_iter().map(Subdomain::from));

        problem.species = self
            .species
            .into_iter()
            .map(|s| Species::new(s.name, s.mobile))
            .collect();
        problem.traps = self
            .traps
            .into_iter()
            .map(|t| {
                Trap::new(
                    t.name,
                    t.mobile_species,
                    (t.k_0, t.e_k),
                    (t.p_0, t.e_p),
                    t.n,
                    t.volume,
                )
            })
            .collect();
        problem.boundary_conditions = self
            .boundary_conditions
            .into_iter()
            .map(|bc| match bc.kind {
                BcKindConfig::Dirichlet => {
                    BoundaryCondition::dirichlet(bc.surface, bc.value, bc.species)
                }
                BcKindConfig::ParticleFlux => {
                    BoundaryCondition::particle_flux(bc.surface, bc.value, bc.species)
                }
            })
            .collect();
        problem.sources = self
            .sources
            .into_iter()
            .map(|s| Source::new(s.value, s.volume, s.species))
            .collect();
        problem.initial_conditions = self
            .initial_conditions
            .into_iter()
            .map(|ic| InitialCondition::constant(ic.value, ic.species))
            .collect();
        problem.derived_quantities = self
            .derived_quantities
            .into_iter()
            .map(|q| match q {
                DerivedQuantityConfig::SurfaceFlux { species, surface } => {
                    DerivedQuantity::surface_flux(species, surface)
                }
                DerivedQuantityConfig::TotalVolume { species, volume } => {
                    DerivedQuantity::total_volume(species, volume)
                }
            })
            .collect();
        if let Some(export) = self.export {
            let mut csv = CsvExport::new(export.directory);
            csv.species = export.species;
            problem.exports.push(Box::new(csv));
        }
        Ok(problem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
temperature = 500.0

[mesh]
kind = "regular"
cells = 20
size = 1.0

[settings]
final_time = 2.0
max_iterations = 12

[settings.stepsize]
initial_value = 0.5

[[volumes]]
id = 1
borders = [0.0, 1.0]
d_0 = 1.0

[[surfaces]]
id = 1
x = 0.0

[[species]]
name = "H"

[[traps]]
name = "trap"
mobile_species = "H"
k_0 = 1.0
p_0 = 0.1
n = 2.0
volume = 1

[[boundary_conditions]]
kind = "dirichlet"
surface = 1
species = "H"
value = 1.0

[[derived_quantities]]
kind = "surface_flux"
species = "H"
surface = 1
"#;

    #[test]
    fn settings_defaults_are_filled_in() {
        let settings: Settings =
            toml::from_str("final_time = 1.0\n[stepsize]\ninitial_value = 0.1\n").unwrap();
        assert_eq!(settings.max_iterations, 30);
        assert_eq!(settings.atol, 1e-10);
        assert!(!settings.stepsize.is_adaptive());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn non_positive_final_time_is_invalid() {
        let settings = Settings::new(0.0, 0.1);
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidSettings(_))
        ));
    }

    #[test]
    fn negative_or_nan_tolerances_are_invalid() {
        for (atol, rtol) in [(-1.0, 1e-10), (1e-10, f64::NAN), (f64::NAN, 1e-10)] {
            let settings = Settings::new(1.0, 0.1).with_tolerances(atol, rtol);
            assert!(matches!(
                settings.validate(),
                Err(ConfigError::InvalidSettings(_))
            ));
        }
        assert!(Settings::new(1.0, 0.1).with_tolerances(0.0, 0.0).validate().is_ok());
    }

    #[test]
    fn scenario_parses_into_problem() {
        let scenario = ScenarioConfig::from_toml_str(SCENARIO).unwrap();
        assert_eq!(scenario.settings.max_iterations, 12);
        assert_eq!(scenario.traps.len(), 1);

        let problem = scenario.into_problem().unwrap();
        assert_eq!(problem.mesh.cells.len(), 20);
        assert_eq!(problem.subdomains.len(), 2);
        assert_eq!(problem.species.len(), 1);
        assert_eq!(problem.boundary_conditions.len(), 1);
        assert_eq!(problem.derived_quantities.len(), 1);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = ScenarioConfig::from_toml_str("temperature = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
