pub mod aggregate;
pub mod bundle;
pub mod chemparser;
pub mod config;
pub mod constants;
pub mod detector;
pub mod elements;
pub mod error;
pub mod interp;
pub mod material;
pub mod ndft;
pub mod particle;
pub mod pixelmask;
pub mod propagator;
pub mod qmap;
pub mod random;
pub mod resample;
pub mod rotation;
pub mod sample;
pub mod scattering_factors;
pub mod source;
pub mod superposition;

pub use aggregate::{ExperimentAggregate, Exposure, Record, Value};
pub use config::{Simulation, SimulationConfig};
pub use detector::{Binning, Detection, Detector, DetectorState, Noise, PixelDetector};
pub use error::{DiffractError, Result};
pub use material::{Composition, DensityMap, Material};
pub use particle::{
    Atom, AtomisticSolver, MapParticle, MapShape, MapSource, Molecule, Particle, ParticleKind,
    Pose, Sphere, Spheroid,
};
pub use propagator::{PropagationOptions, Propagator};
pub use qmap::{QMap, QMapCache, QMapParams};
pub use sample::{ParticleModel, ParticleSample, Sample, SampleState};
pub use scattering_factors::{ForwardScatteringLimit, ScatteringFactorTable, ScatteringFactors};
pub use source::{Beam, BeamProfile, IntensityUnit, Source, SourceState};
pub use superposition::SuperpositionMode;
pub use xdiffract_data;
