//! Atomistic particles, scattered by an external solver.
//!
//! The solver reads its options from a configuration file, which is written
//! to a uniquely named temporary file that is removed when scattering
//! returns, on success and on error.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use ndarray::{Array1, Array2, Array3};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{Pose, Scatter, ScatterContext, Scattered};
use crate::aggregate::{Record, Value};
use crate::detector::DetectorState;
use crate::error::{DiffractError, Result};
use crate::qmap::QMap;
use crate::rotation::Rotation;
use crate::source::{IntensityUnit, SourceState};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub atomic_number: u16,
    /// [m]
    pub position: [f64; 3],
}

/// What the solver hands back for one shot.
#[derive(Debug, Clone)]
pub struct SolverPattern {
    /// Complex structure factor per pixel; only its phase is used.
    pub amplitude: Array2<Complex64>,
    /// Expected photons per pixel.
    pub photons: Array2<f64>,
    /// Scattering vectors the solver evaluated, shape `[ny, nx, 3]`.
    pub qmap: Array3<f64>,
}

/// External atomistic diffraction solver.
pub trait AtomisticSolver {
    /// Load the atoms of the structure file named in the configuration.
    fn load_atoms(&mut self, config: &Path) -> Result<Vec<Atom>>;

    /// Simulate one shot of `atoms` with the options in the configuration.
    fn simulate(&mut self, config: &Path, atoms: &[Atom]) -> Result<SolverPattern>;
}

/// A molecule given by its atoms or by a structure file. Atoms read from
/// the file are kept and shared by every clone of the particle.
#[derive(Debug, Clone)]
pub struct Molecule {
    pub structure_file: Option<PathBuf>,
    atoms: Arc<OnceLock<Vec<Atom>>>,
}

impl Molecule {
    pub fn from_atoms(atoms: Vec<Atom>) -> Result<Self> {
        if atoms.is_empty() {
            return Err(DiffractError::InvalidGeometry("molecule without atoms".to_string()));
        }
        Ok(Molecule {
            structure_file: None,
            atoms: Arc::new(OnceLock::from(atoms)),
        })
    }

    pub fn from_structure_file(path: impl Into<PathBuf>) -> Self {
        Molecule {
            structure_file: Some(path.into()),
            atoms: Arc::new(OnceLock::new()),
        }
    }

    /// Atoms, if given or already loaded.
    pub fn atoms(&self) -> Option<&[Atom]> {
        self.atoms.get().map(Vec::as_slice)
    }

    fn atoms_or_load(&self, solver: &mut dyn AtomisticSolver, config: &Path) -> Result<&[Atom]> {
        if let Some(atoms) = self.atoms.get() {
            return Ok(atoms);
        }
        let loaded = solver.load_atoms(config)?;
        if loaded.is_empty() {
            return Err(DiffractError::Solver("structure file contains no atoms".to_string()));
        }
        log::debug!("loaded {} atoms", loaded.len());
        Ok(self.atoms.get_or_init(|| loaded))
    }
}

/// Solver options in `key = value;` form.
pub fn solver_config(
    source: &SourceState,
    detector: &DetectorState,
    pose: &Pose,
    structure_file: Option<&Path>,
) -> String {
    let mut conf = String::new();
    let mut line = |key: &str, value: String| {
        let _ = writeln!(conf, "{key} = {value};");
    };
    line("number_of_dimensions", "2".into());
    line("number_of_patterns", "1".into());
    match structure_file {
        Some(path) => {
            line("input_type", "\"pdb\"".into());
            line("pdb_filename", format!("\"{}\"", path.display()));
        }
        None => line("input_type", "\"atoms\"".into()),
    }
    line("detector_distance", format!("{:e}", detector.distance));
    line("detector_width", format!("{:e}", detector.nx as f64 * detector.pixel_size));
    line("detector_height", format!("{:e}", detector.ny as f64 * detector.pixel_size));
    line("detector_pixel_width", format!("{:e}", detector.pixel_size));
    line("detector_pixel_height", format!("{:e}", detector.pixel_size));
    line("detector_center_x", format!("{}", detector.cx));
    line("detector_center_y", format!("{}", detector.cy));
    line("detector_quantum_efficiency", "1.0".into());
    line("detector_binning", "1".into());
    line("experiment_wavelength", format!("{:e}", source.wavelength));
    line("experiment_beam_intensity", format!(
        "{:e}",
        source.intensity(pose.position, IntensityUnit::PhotonsPerM2)
    ));
    line("experiment_focal_diameter", format!("{:e}", source.focus_diameter));
    line("experiment_photon_energy", format!("{}", source.photon_energy_ev()));
    line("random_orientation", "0".into());
    line("phi", format!("{}", pose.euler_angles[0]));
    line("theta", format!("{}", pose.euler_angles[1]));
    line("psi", format!("{}", pose.euler_angles[2]));
    conf
}

fn write_config(conf: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("xdiffract_solver")
        .suffix(".conf")
        .tempfile()?;
    file.write_all(conf.as_bytes())?;
    file.flush()?;
    Ok(file)
}

impl Scatter for Molecule {
    fn scatter(&self, pose: &Pose, _f0: f64, ctx: &mut ScatterContext<'_>) -> Result<Scattered> {
        let Some(solver) = ctx.solver.as_deref_mut() else {
            return Err(DiffractError::UnsupportedParticle(
                "molecule particles need an atomistic solver".to_string(),
            ));
        };
        let solver: &mut dyn AtomisticSolver = &mut **solver;

        let conf = solver_config(ctx.source, ctx.detector, pose, self.structure_file.as_deref());
        let file = write_config(&conf)?;
        let atoms = self.atoms_or_load(solver, file.path())?;
        let pattern = solver.simulate(file.path(), atoms)?;
        drop(file);

        let (ny, nx) = (ctx.detector.ny, ctx.detector.nx);
        for (channel, found) in [
            ("fourier_pattern", pattern.amplitude.shape()),
            ("photons", pattern.photons.shape()),
        ] {
            if found != [ny, nx] {
                return Err(DiffractError::ShapeMismatch {
                    channel: channel.to_string(),
                    expected: vec![ny, nx],
                    found: found.to_vec(),
                });
            }
        }
        let qmap = QMap::from_array(pattern.qmap)?;
        if qmap.dim() != (ny, nx) {
            let (qy, qx) = qmap.dim();
            return Err(DiffractError::ShapeMismatch {
                channel: "qmap".to_string(),
                expected: vec![ny, nx, 3],
                found: vec![qy, qx, 3],
            });
        }

        // solver photons set the modulus, its structure factor the phase
        let mut amplitude = pattern.amplitude;
        ndarray::Zip::from(&mut amplitude)
            .and(&pattern.photons)
            .for_each(|f, &photons| *f = Complex64::from_polar(photons.abs().sqrt(), f.arg()));

        let mut record = Record::new();
        record.insert(
            "atomic_number".into(),
            Value::from(Array1::from_iter(atoms.iter().map(|a| f64::from(a.atomic_number)))),
        );
        record.insert(
            "atomic_position".into(),
            Value::from(Array2::from_shape_fn((atoms.len(), 3), |(i, j)| atoms[i].position[j])),
        );
        Ok(Scattered {
            amplitude,
            qmap: Arc::new(qmap),
            frame: Rotation::from_euler(pose.euler_angles),
            record,
        })
    }

    fn describe(&self, record: &mut Record) {
        let n = self.atoms().map_or(0, <[Atom]>::len);
        record.insert("number_of_atoms".into(), Value::from(n));
    }
}
