//! Serde-deserializable simulation configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::detector::{Noise, PixelDetector};
use crate::error::{DiffractError, Result};
use crate::material::{Composition, Material};
use crate::particle::{
    Atom, AtomisticSolver, MapParticle, MapShape, MapSource, Molecule, ParticleKind, Sphere,
    Spheroid,
};
use crate::propagator::{PropagationOptions, Propagator};
use crate::random::Variation;
use crate::sample::{Arrival, Orientation, ParticleModel, ParticleSample, Placement};
use crate::scattering_factors::{ScatteringFactorTable, ScatteringFactors};
use crate::source::{Beam, BeamProfile};
use crate::superposition::SuperpositionMode;

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub sample: SampleConfig,
    pub detector: DetectorConfig,
    #[serde(default)]
    pub propagation: PropagationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// [m]
    pub wavelength: f64,
    /// [J]
    pub pulse_energy: f64,
    /// FWHM of the focus [m].
    pub focus_diameter: f64,
    #[serde(default)]
    pub profile: BeamProfile,
    #[serde(default)]
    pub pulse_energy_variation: Variation,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleConfig {
    #[serde(default)]
    pub seed: u64,
    /// Compressed scattering-factor bundle; without one, materials use the
    /// forward-scattering limit.
    #[serde(default)]
    pub scattering_factors: Option<PathBuf>,
    #[serde(default, rename = "particle")]
    pub particles: Vec<ParticleConfig>,
}

/// One particle model. `shape` selects the scattering algorithm:
/// `sphere`, `spheroid`, `map` or `molecule`.
///
/// Map particles are voxelized from `geometry`, or read from `map_file`.
/// Molecules take inline `atoms` or a `structure_file` for the solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleConfig {
    pub shape: String,
    #[serde(default)]
    pub diameter: Option<f64>,
    #[serde(default = "default_flattening")]
    pub flattening: f64,
    /// Voxelized geometry of map particles: `sphere`, `spheroid`, `cube`,
    /// `icosahedron`, or `custom` with a `map_file`.
    #[serde(default)]
    pub geometry: Option<String>,
    /// Compressed voxel volume of a custom map particle.
    #[serde(default)]
    pub map_file: Option<PathBuf>,
    #[serde(default)]
    pub atoms: Option<Vec<Atom>>,
    #[serde(default)]
    pub material: MaterialConfig,
    #[serde(default)]
    pub structure_file: Option<PathBuf>,
    #[serde(default = "default_number")]
    pub number: usize,
    #[serde(default)]
    pub arrival: Arrival,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub diameter_variation: Variation,
}

fn default_flattening() -> f64 {
    1.0
}

fn default_number() -> usize {
    1
}

/// A preset name, a chemical formula or an explicit composition. The latter
/// two need a mass density.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialConfig {
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub composition: Option<BTreeMap<String, f64>>,
    /// [kg/m^3]
    #[serde(default)]
    pub mass_density: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub nx: usize,
    pub ny: usize,
    /// [m]
    pub pixel_size: f64,
    /// [m]
    pub distance: f64,
    #[serde(default)]
    pub cx: Option<f64>,
    #[serde(default)]
    pub cy: Option<f64>,
    #[serde(default)]
    pub hole_diameter: Option<f64>,
    #[serde(default)]
    pub gap: Option<f64>,
    #[serde(default)]
    pub saturation_level: Option<f64>,
    #[serde(default)]
    pub noise: Noise,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub downsampling: Option<usize>,
    /// Unmasked pixels a downsampled bin needs to stay valid.
    #[serde(default = "default_number")]
    pub min_valid_pixels: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationConfig {
    #[serde(default = "default_number")]
    pub number_of_shots: usize,
    #[serde(default = "default_true")]
    pub save_qmap: bool,
    #[serde(default)]
    pub save_map: bool,
    #[serde(default)]
    pub superposition: SuperpositionMode,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        PropagationConfig {
            number_of_shots: default_number(),
            save_qmap: true,
            save_map: false,
            superposition: SuperpositionMode::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Collaborators built from a configuration.
pub struct Simulation {
    pub source: Beam,
    pub sample: ParticleSample,
    pub detector: PixelDetector,
    pub solver: Option<Box<dyn AtomisticSolver>>,
    pub options: PropagationOptions,
    pub number_of_shots: usize,
}

impl Simulation {
    pub fn into_propagator(self) -> Propagator {
        let propagator = Propagator::new(self.source, self.sample, self.detector)
            .with_options(self.options);
        match self.solver {
            Some(solver) => propagator.with_boxed_solver(solver),
            None => propagator,
        }
    }
}

impl SimulationConfig {
    /// Validate the configuration and build its collaborators.
    ///
    /// Molecule particles need an atomistic solver; see
    /// [`build_with_solver`](Self::build_with_solver).
    pub fn build(&self) -> Result<Simulation> {
        self.build_with_solver(None)
    }

    /// Like [`build`](Self::build), attaching `solver` for molecule particles.
    pub fn build_with_solver(
        &self,
        solver: Option<Box<dyn AtomisticSolver>>,
    ) -> Result<Simulation> {
        let s = &self.source;
        let source = Beam::new(s.wavelength, s.pulse_energy, s.focus_diameter, s.profile)?
            .with_pulse_energy_variation(s.pulse_energy_variation, s.seed);

        let factors: Option<Arc<dyn ScatteringFactors>> = match &self.sample.scattering_factors {
            Some(path) => Some(Arc::new(ScatteringFactorTable::from_path(path)?)),
            None => None,
        };
        let models = self
            .sample
            .particles
            .iter()
            .map(|p| p.build(factors.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        if solver.is_none()
            && models
                .iter()
                .any(|m| matches!(m.prototype, ParticleKind::Molecule(_)))
        {
            return Err(DiffractError::UnsupportedParticle(
                "molecule particles need an atomistic solver".to_string(),
            ));
        }
        let sample = ParticleSample::new(models, self.sample.seed);

        let detector = self.detector.build()?;
        let p = &self.propagation;
        Ok(Simulation {
            source,
            sample,
            detector,
            solver,
            options: PropagationOptions {
                save_qmap: p.save_qmap,
                save_map: p.save_map,
                superposition: p.superposition,
            },
            number_of_shots: p.number_of_shots,
        })
    }
}

impl MaterialConfig {
    pub fn build(&self) -> Result<Material> {
        let density = || {
            self.mass_density.ok_or_else(|| {
                DiffractError::InvalidComposition(
                    "mass_density is required with a formula or composition".to_string(),
                )
            })
        };
        match (&self.preset, &self.formula, &self.composition) {
            (Some(name), None, None) => Material::preset(name),
            (None, Some(formula), None) => Material::from_formula(formula, density()?),
            (None, None, Some(counts)) => {
                let composition = Composition::new(counts.iter().map(|(s, &c)| (s.as_str(), c)))?;
                Material::new(composition, density()?)
            }
            (None, None, None) => Material::preset("water"),
            _ => Err(DiffractError::InvalidComposition(
                "give only one of preset, formula or composition".to_string(),
            )),
        }
    }
}

impl ParticleConfig {
    fn diameter(&self) -> Result<f64> {
        self.diameter.ok_or_else(|| {
            DiffractError::InvalidGeometry(format!("{} particle needs a diameter", self.shape))
        })
    }

    pub fn build(&self, factors: Option<&Arc<dyn ScatteringFactors>>) -> Result<ParticleModel> {
        let material = || -> Result<Arc<Material>> {
            let material = self.material.build()?;
            Ok(Arc::new(match factors {
                Some(f) => material.with_scattering_factors(Arc::clone(f)),
                None => material,
            }))
        };
        let kind = match self.shape.as_str() {
            "sphere" => ParticleKind::Sphere(Sphere::new(self.diameter()?, material()?)?),
            "spheroid" => ParticleKind::Spheroid(Spheroid::new(
                self.diameter()?,
                self.flattening,
                material()?,
            )?),
            "map" => {
                ParticleKind::Map(MapParticle::new(self.diameter()?, self.map_source(factors)?)?)
            }
            "molecule" => ParticleKind::Molecule(match (&self.structure_file, &self.atoms) {
                (Some(path), None) => Molecule::from_structure_file(path),
                (None, Some(atoms)) => Molecule::from_atoms(atoms.clone())?,
                _ => {
                    return Err(DiffractError::InvalidGeometry(
                        "molecule particle needs either a structure_file or atoms".to_string(),
                    ));
                }
            }),
            other => return Err(DiffractError::UnsupportedParticle(other.to_string())),
        };
        Ok(ParticleModel {
            prototype: kind,
            number: self.number,
            arrival: self.arrival,
            placement: self.placement,
            orientation: self.orientation,
            diameter_variation: self.diameter_variation,
        })
    }
}

impl ParticleConfig {
    fn map_source(&self, factors: Option<&Arc<dyn ScatteringFactors>>) -> Result<MapSource> {
        let shape = match (self.geometry.as_deref(), &self.map_file) {
            (None | Some("custom"), Some(path)) => return MapSource::from_path(path, factors),
            (Some("custom"), None) => {
                return Err(DiffractError::InvalidGeometry(
                    "custom map particle needs a map_file".to_string(),
                ));
            }
            (_, Some(_)) => {
                return Err(DiffractError::InvalidGeometry(
                    "map_file is only read for custom geometry".to_string(),
                ));
            }
            (None | Some("sphere"), None) => MapShape::Sphere,
            (Some("spheroid"), None) => MapShape::Spheroid {
                flattening: self.flattening,
            },
            (Some("cube"), None) => MapShape::Cube,
            (Some("icosahedron"), None) => MapShape::Icosahedron,
            (Some(other), None) => {
                return Err(DiffractError::UnsupportedParticle(format!("map geometry '{other}'")));
            }
        };
        let material = self.material.build()?;
        let material = match factors {
            Some(f) => material.with_scattering_factors(Arc::clone(f)),
            None => material,
        };
        Ok(MapSource::Generated {
            shape,
            material: Arc::new(material),
        })
    }
}

impl DetectorConfig {
    pub fn build(&self) -> Result<PixelDetector> {
        let center = match (self.cx, self.cy) {
            (Some(cx), Some(cy)) => Some((cx, cy)),
            (None, None) => None,
            _ => {
                return Err(DiffractError::InvalidGeometry(
                    "give both cx and cy or neither".to_string(),
                ));
            }
        };
        let mut detector =
            PixelDetector::new(self.nx, self.ny, self.pixel_size, self.distance, center)?
                .with_noise(self.noise, self.seed)
                .with_min_valid_pixels(self.min_valid_pixels);
        if let Some(d) = self.hole_diameter {
            detector = detector.with_hole(d);
        }
        if let Some(w) = self.gap {
            detector = detector.with_gap(w);
        }
        if let Some(level) = self.saturation_level {
            detector = detector.with_saturation_level(level);
        }
        if let Some(factor) = self.downsampling {
            detector = detector.with_downsampling(factor)?;
        }
        Ok(detector)
    }
}
