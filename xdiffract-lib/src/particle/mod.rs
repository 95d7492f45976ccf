//! Particle models and their scattering amplitudes.
//!
//! Every model implements [`Scatter`]: given its pose, the primary wave
//! amplitude and the exposure context it returns the complex amplitude on
//! the detector grid together with the scattering-vector map it used.

pub mod map;
pub mod molecule;
pub mod sphere;
pub mod spheroid;

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex64;

use crate::aggregate::{Record, Value};
use crate::detector::DetectorState;
use crate::error::Result;
use crate::qmap::{QMap, QMapCache};
use crate::rotation::Rotation;
use crate::source::{IntensityUnit, SourceState};

pub use map::{MapParticle, MapShape, MapSource};
pub use molecule::{Atom, AtomisticSolver, Molecule, SolverPattern};
pub use sphere::Sphere;
pub use spheroid::Spheroid;

/// Placement of a particle in the interaction region.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// [m]
    pub position: [f64; 3],
    /// z-y-z Euler angles [rad].
    pub euler_angles: [f64; 3],
}

/// Everything a model may consult while scattering within one exposure.
pub struct ScatterContext<'a> {
    pub source: &'a SourceState,
    pub detector: &'a DetectorState,
    pub qmaps: &'a mut QMapCache,
    pub solver: Option<&'a mut Box<dyn AtomisticSolver>>,
    /// Record the real-space map of map particles.
    pub save_map: bool,
}

/// Amplitude of one particle on the detector grid.
#[derive(Debug, Clone)]
pub struct Scattered {
    pub amplitude: Array2<Complex64>,
    /// Scattering vectors the amplitude was evaluated at.
    pub qmap: Arc<QMap>,
    /// Rotation taking `qmap` vectors to the lab frame.
    pub frame: Rotation,
    /// Model-specific outputs, e.g. the density map.
    pub record: Record,
}

pub trait Scatter {
    fn scatter(&self, pose: &Pose, f0: f64, ctx: &mut ScatterContext<'_>) -> Result<Scattered>;

    /// Shape parameters for the per-particle output.
    fn describe(&self, record: &mut Record);
}

#[derive(Debug, Clone)]
pub enum ParticleKind {
    Sphere(Sphere),
    Spheroid(Spheroid),
    Map(MapParticle),
    Molecule(Molecule),
}

impl ParticleKind {
    pub fn name(&self) -> &'static str {
        match self {
            ParticleKind::Sphere(_) => "sphere",
            ParticleKind::Spheroid(_) => "spheroid",
            ParticleKind::Map(_) => "map",
            ParticleKind::Molecule(_) => "molecule",
        }
    }

    fn model(&self) -> &dyn Scatter {
        match self {
            ParticleKind::Sphere(m) => m,
            ParticleKind::Spheroid(m) => m,
            ParticleKind::Map(m) => m,
            ParticleKind::Molecule(m) => m,
        }
    }
}

/// A particle instance of one exposure.
#[derive(Debug, Clone)]
pub struct Particle {
    pub pose: Pose,
    pub kind: ParticleKind,
}

impl Particle {
    pub fn new(kind: ParticleKind, pose: Pose) -> Self {
        Particle { pose, kind }
    }

    /// Scatter with the primary amplitude derived from the fluence at the
    /// particle position. The returned record holds the particle's pose,
    /// fluence, `F0`, shape parameters and any model outputs.
    pub fn scatter(&self, ctx: &mut ScatterContext<'_>) -> Result<Scattered> {
        let intensity = ctx
            .source
            .intensity(self.pose.position, IntensityUnit::PhotonsPerM2);
        let f0 = primary_amplitude(
            intensity,
            ctx.detector.solid_angle_pixel,
            ctx.source.wavelength,
        );

        let model = self.kind.model();
        let mut scattered = model.scatter(&self.pose, f0, ctx)?;

        let mut record = Record::new();
        record.insert("position".into(), Value::from(self.pose.position));
        record.insert("euler_angles".into(), Value::from(self.pose.euler_angles));
        record.insert("intensity".into(), Value::from(intensity));
        record.insert("F0".into(), Value::from(f0));
        model.describe(&mut record);
        record.extend(std::mem::take(&mut scattered.record));
        scattered.record = record;
        Ok(scattered)
    }
}

/// `F0 = sqrt(I0 Omega) 2 pi / lambda^2` for fluence `I0` in photons/m^2.
pub fn primary_amplitude(intensity: f64, solid_angle_pixel: f64, wavelength: f64) -> f64 {
    (intensity * solid_angle_pixel).sqrt() * 2.0 * PI / (wavelength * wavelength)
}
