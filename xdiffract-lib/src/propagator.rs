//! The per-exposure pipeline: scatter every particle, superimpose, detect,
//! and aggregate the exposures of a run.

use ndarray::Array2;
use num_complex::Complex64;

use crate::aggregate::{ExperimentAggregate, Exposure, Record, Value};
use crate::detector::Detector;
use crate::error::Result;
use crate::particle::{AtomisticSolver, ScatterContext, Scattered};
use crate::pixelmask::{self, MaskBits};
use crate::qmap::QMapCache;
use crate::resample::{DownsampleMode, downsample};
use crate::sample::Sample;
use crate::source::Source;
use crate::superposition::{SuperpositionMode, superimpose};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationOptions {
    /// Record each particle's scattering-vector map.
    pub save_qmap: bool,
    /// Record the real-space maps of map particles.
    pub save_map: bool,
    pub superposition: SuperpositionMode,
}

impl Default for PropagationOptions {
    fn default() -> Self {
        PropagationOptions {
            save_qmap: true,
            save_map: false,
            superposition: SuperpositionMode::PerParticle,
        }
    }
}

pub struct Propagator {
    source: Box<dyn Source>,
    sample: Box<dyn Sample>,
    detector: Box<dyn Detector>,
    solver: Option<Box<dyn AtomisticSolver>>,
    qmaps: QMapCache,
    options: PropagationOptions,
}

impl Propagator {
    pub fn new(
        source: impl Source + 'static,
        sample: impl Sample + 'static,
        detector: impl Detector + 'static,
    ) -> Self {
        Propagator {
            source: Box::new(source),
            sample: Box::new(sample),
            detector: Box::new(detector),
            solver: None,
            qmaps: QMapCache::new(),
            options: PropagationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PropagationOptions) -> Self {
        self.options = options;
        self
    }

    /// Solver for molecule particles.
    pub fn with_solver(mut self, solver: impl AtomisticSolver + 'static) -> Self {
        self.solver = Some(Box::new(solver));
        self
    }

    pub fn with_boxed_solver(mut self, solver: Box<dyn AtomisticSolver>) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn options(&self) -> &PropagationOptions {
        &self.options
    }

    pub fn qmap_cache(&self) -> &QMapCache {
        &self.qmaps
    }

    /// Simulate `shots` exposures in order and stack their outputs.
    ///
    /// Any error aborts the run; no partial aggregate is returned.
    pub fn propagate(&mut self, shots: usize) -> Result<ExperimentAggregate> {
        let mut exposures = Vec::with_capacity(shots);
        for i in 0..shots {
            let exposure = self.propagate_single()?;
            let k = exposure.particles.len();
            log::info!(
                "exposure {}/{shots} ({k} particle{})",
                i + 1,
                if k == 1 { "" } else { "s" }
            );
            exposures.push(exposure);
        }
        ExperimentAggregate::from_exposures(&exposures)
    }

    /// Simulate one exposure.
    pub fn propagate_single(&mut self) -> Result<Exposure> {
        let source = self.source.next_state()?;
        let sample = self.sample.next_state()?;
        let detector = self.detector.next_state()?;

        let mut scattered: Vec<Scattered> = Vec::with_capacity(sample.particles.len());
        {
            let mut ctx = ScatterContext {
                source: &source,
                detector: &detector,
                qmaps: &mut self.qmaps,
                solver: self.solver.as_mut(),
                save_map: self.options.save_map,
            };
            for particle in &sample.particles {
                let mut s = particle.scatter(&mut ctx)?;
                if self.options.save_qmap {
                    s.record
                        .insert("qmap".into(), Value::from(s.qmap.as_array().clone()));
                }
                scattered.push(s);
            }
        }

        let positions: Vec<[f64; 3]> = sample.particles.iter().map(|p| p.pose.position).collect();
        let total = superimpose(
            &scattered,
            &positions,
            (detector.ny, detector.nx),
            self.options.superposition,
        )?;
        let intensity = total.mapv(|f| f.norm_sqr());
        let detection = self.detector.detect_photons(&intensity)?;

        let mut channels = Record::new();
        if let Some(binning) = self.detector.downsampling() {
            let (fourier_xxx, mask_xxx) = downsample(
                &total,
                binning.factor,
                DownsampleMode::Integrate,
                &detection.mask,
                pixelmask::IN_MASK,
                binning.min_valid_pixels,
            )?;
            let intensity_xxx = match &detection.downsampled {
                Some((binned, _)) => binned.clone(),
                None => {
                    downsample(
                        &detection.intensity,
                        binning.factor,
                        DownsampleMode::Integrate,
                        &detection.mask,
                        pixelmask::IN_MASK,
                        binning.min_valid_pixels,
                    )?
                    .0
                }
            };
            insert_pattern(&mut channels, "", total, detection.intensity, detection.mask);
            insert_pattern(&mut channels, "_xxx", fourier_xxx, intensity_xxx, mask_xxx);
        } else {
            insert_pattern(&mut channels, "", total, detection.intensity, detection.mask);
        }

        Ok(Exposure {
            source: source.record(),
            sample: sample.record(),
            detector: detector.record(),
            particles: scattered.into_iter().map(|s| s.record).collect(),
            channels,
        })
    }
}

fn insert_pattern(
    channels: &mut Record,
    suffix: &str,
    fourier: Array2<Complex64>,
    intensity: Array2<f64>,
    mask: Array2<MaskBits>,
) {
    let binary = mask.mapv(|m| m == 0);
    channels.insert(format!("fourier_pattern{suffix}"), Value::from(fourier));
    channels.insert(format!("intensity_pattern{suffix}"), Value::from(intensity));
    channels.insert(format!("mask{suffix}"), Value::from(mask));
    let binary_name = if suffix.is_empty() {
        "mask_binary".to_string()
    } else {
        format!("mask{suffix}_binary")
    };
    channels.insert(binary_name, Value::from(binary));
}
