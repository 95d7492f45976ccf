//! Pixel detectors: geometry, static masks, photon statistics and binning.

use std::f64::consts::{PI, SQRT_2};

use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Record, Value};
use crate::error::{DiffractError, Result};
use crate::pixelmask::{self, MaskBits};
use crate::qmap::QMapParams;
use crate::random::{poisson, standard_normal};
use crate::resample::{DownsampleMode, downsample};

/// Detector geometry of one exposure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorState {
    pub nx: usize,
    pub ny: usize,
    pub cx: f64,
    pub cy: f64,
    pub pixel_size: f64,
    pub distance: f64,
    pub solid_angle_pixel: f64,
}

impl DetectorState {
    /// Unrotated qmap parameters at `wavelength`.
    pub fn qmap_params(&self, wavelength: f64) -> QMapParams {
        QMapParams {
            nx: self.nx,
            ny: self.ny,
            cx: self.cx,
            cy: self.cy,
            pixel_size: self.pixel_size,
            distance: self.distance,
            wavelength,
            euler_angles: [0.0; 3],
        }
    }

    /// Smallest real-space feature resolved out to the farthest detector edge.
    pub fn resolution_element(&self, wavelength: f64) -> f64 {
        PI / self.qmap_params(wavelength).q_max_edge()
    }

    /// Smallest real-space feature resolved in the detector corners.
    pub fn resolution_element_min(&self, wavelength: f64) -> f64 {
        PI / self.qmap_params(wavelength).q_max_corner()
    }

    /// Voxel spacing a map must not exceed, and the finer spacing it should use.
    pub fn map_spacing(&self, wavelength: f64) -> (f64, f64) {
        (
            self.resolution_element(wavelength) / SQRT_2,
            self.resolution_element_min(wavelength) / SQRT_2,
        )
    }

    pub fn record(&self) -> Record {
        let mut r = Record::new();
        r.insert("nx".into(), Value::from(self.nx));
        r.insert("ny".into(), Value::from(self.ny));
        r.insert("cx".into(), Value::from(self.cx));
        r.insert("cy".into(), Value::from(self.cy));
        r.insert("pixel_size".into(), Value::from(self.pixel_size));
        r.insert("distance".into(), Value::from(self.distance));
        r.insert("solid_angle_pixel".into(), Value::from(self.solid_angle_pixel));
        r
    }
}

/// Result of reading out one exposure.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub intensity: Array2<f64>,
    pub mask: Array2<MaskBits>,
    /// Binned intensity and mask when the detector downsamples.
    pub downsampled: Option<(Array2<f64>, Array2<MaskBits>)>,
}

/// Pixel binning applied on readout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binning {
    pub factor: usize,
    /// Bins with fewer unmasked pixels are flagged `INVALID`.
    pub min_valid_pixels: usize,
}

pub trait Detector {
    fn next_state(&mut self) -> Result<DetectorState>;

    /// Convert expected photon counts into a recorded pattern and mask.
    fn detect_photons(&mut self, intensity: &Array2<f64>) -> Result<Detection>;

    /// Binning, if the detector downsamples.
    fn downsampling(&self) -> Option<Binning> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Noise {
    #[default]
    None,
    Poisson,
    /// Additive Gaussian read noise with standard deviation `sigma` photons.
    Normal { sigma: f64 },
}

#[derive(Debug, Clone)]
pub struct PixelDetector {
    state: DetectorState,
    static_mask: Array2<MaskBits>,
    saturation_level: Option<f64>,
    noise: Noise,
    downsampling: Option<usize>,
    min_valid_pixels: usize,
    rng: ChaCha8Rng,
}

impl PixelDetector {
    /// A detector centered on the beam unless `center` is given.
    pub fn new(
        nx: usize,
        ny: usize,
        pixel_size: f64,
        distance: f64,
        center: Option<(f64, f64)>,
    ) -> Result<Self> {
        let (cx, cy) = center.unwrap_or(((nx as f64 - 1.0) / 2.0, (ny as f64 - 1.0) / 2.0));
        let state = DetectorState {
            nx,
            ny,
            cx,
            cy,
            pixel_size,
            distance,
            solid_angle_pixel: pixel_solid_angle(pixel_size, distance, 0.0),
        };
        // any wavelength will do for the geometry check
        state.qmap_params(1.0).validate()?;
        Ok(PixelDetector {
            state,
            static_mask: Array2::zeros((ny, nx)),
            saturation_level: None,
            noise: Noise::None,
            downsampling: None,
            min_valid_pixels: 1,
            rng: ChaCha8Rng::seed_from_u64(0),
        })
    }

    /// Shadow a central beamstop of `diameter` meters.
    pub fn with_hole(mut self, diameter: f64) -> Self {
        let s = self.state;
        let r = diameter / 2.0;
        for ((iy, ix), m) in self.static_mask.indexed_iter_mut() {
            let x = (ix as f64 - s.cx) * s.pixel_size;
            let y = (iy as f64 - s.cy) * s.pixel_size;
            if x.hypot(y) <= r {
                *m |= pixelmask::SHADOWED;
            }
        }
        self
    }

    /// Mask a horizontal gap `width` meters tall through the center.
    pub fn with_gap(mut self, width: f64) -> Self {
        let s = self.state;
        for ((iy, _), m) in self.static_mask.indexed_iter_mut() {
            let y = (iy as f64 - s.cy) * s.pixel_size;
            if y.abs() <= width / 2.0 {
                *m |= pixelmask::MISSING;
            }
        }
        self
    }

    pub fn with_saturation_level(mut self, level: f64) -> Self {
        self.saturation_level = Some(level);
        self
    }

    pub fn with_noise(mut self, noise: Noise, seed: u64) -> Self {
        self.noise = noise;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn with_downsampling(mut self, factor: usize) -> Result<Self> {
        if factor == 0 {
            return Err(DiffractError::InvalidGeometry(
                "downsampling factor must be at least 1".to_string(),
            ));
        }
        self.downsampling = Some(factor);
        Ok(self)
    }

    /// Unmasked pixels a downsampled bin needs to stay valid; 1 by default.
    pub fn with_min_valid_pixels(mut self, n: usize) -> Self {
        self.min_valid_pixels = n;
        self
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn static_mask(&self) -> &Array2<MaskBits> {
        &self.static_mask
    }
}

/// Solid angle of a square pixel at transverse offset `r`.
pub fn pixel_solid_angle(pixel_size: f64, distance: f64, r: f64) -> f64 {
    pixel_size * pixel_size * distance / (distance * distance + r * r).powf(1.5)
}

impl Detector for PixelDetector {
    fn next_state(&mut self) -> Result<DetectorState> {
        Ok(self.state)
    }

    fn detect_photons(&mut self, intensity: &Array2<f64>) -> Result<Detection> {
        if intensity.dim() != self.static_mask.dim() {
            return Err(DiffractError::ShapeMismatch {
                channel: "intensity_pattern".to_string(),
                expected: self.static_mask.shape().to_vec(),
                found: intensity.shape().to_vec(),
            });
        }
        let mut recorded = match self.noise {
            Noise::None => intensity.clone(),
            Noise::Poisson => intensity.mapv(|i| poisson(&mut self.rng, i)),
            Noise::Normal { sigma } => {
                intensity.mapv(|i| i + sigma * standard_normal(&mut self.rng))
            }
        };
        let mut mask = self.static_mask.clone();
        ndarray::Zip::from(&mut recorded)
            .and(&mut mask)
            .for_each(|value, bits| {
                if !value.is_finite() {
                    *bits |= pixelmask::INVALID;
                } else if let Some(level) = self.saturation_level {
                    if *value >= level {
                        *bits |= pixelmask::SATURATED;
                        *value = level;
                    }
                }
            });

        let downsampled = match self.downsampling() {
            Some(binning) => Some(downsample(
                &recorded,
                binning.factor,
                DownsampleMode::Integrate,
                &mask,
                pixelmask::IN_MASK,
                binning.min_valid_pixels,
            )?),
            None => None,
        };
        Ok(Detection {
            intensity: recorded,
            mask,
            downsampled,
        })
    }

    fn downsampling(&self) -> Option<Binning> {
        self.downsampling.map(|factor| Binning {
            factor,
            min_valid_pixels: self.min_valid_pixels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn detector() -> PixelDetector {
        PixelDetector::new(8, 6, 75e-6, 0.1, None).unwrap()
    }

    #[test]
    fn test_center_defaults_to_middle() {
        let d = detector();
        assert_eq!(d.state().cx, 3.5);
        assert_eq!(d.state().cy, 2.5);
        assert_relative_eq!(
            d.state().solid_angle_pixel,
            (75e-6f64 / 0.1).powi(2),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_hole_and_gap_masks() {
        let d = detector().with_hole(2.0 * 75e-6).with_gap(75e-6);
        let m = d.static_mask();
        // the four pixels around the center are within one pixel of it
        assert_ne!(m[[2, 3]] & pixelmask::SHADOWED, 0);
        assert_eq!(m[[0, 0]] & pixelmask::SHADOWED, 0);
        // cy = 2.5 means rows 2 and 3 straddle the gap edge at half a pixel
        assert_ne!(m[[2, 0]] & pixelmask::MISSING, 0);
        assert_ne!(m[[3, 7]] & pixelmask::MISSING, 0);
        assert_eq!(m[[0, 0]] & pixelmask::MISSING, 0);
    }

    #[test]
    fn test_nonfinite_and_saturated_pixels() {
        let mut d = detector().with_saturation_level(100.0);
        let mut i = Array2::from_elem((6, 8), 5.0);
        i[[1, 1]] = f64::NAN;
        i[[2, 2]] = 1e6;
        let out = d.detect_photons(&i).unwrap();
        assert_eq!(out.mask[[1, 1]], pixelmask::INVALID);
        assert_eq!(out.mask[[2, 2]], pixelmask::SATURATED);
        assert_eq!(out.intensity[[2, 2]], 100.0);
        assert_eq!(out.mask[[0, 0]], 0);
        assert!(out.downsampled.is_none());
    }

    #[test]
    fn test_downsampled_readout() {
        let mut d = detector().with_downsampling(2).unwrap();
        let i = Array2::from_elem((6, 8), 1.0);
        let out = d.detect_photons(&i).unwrap();
        let (binned, bmask) = out.downsampled.unwrap();
        assert_eq!(binned.dim(), (3, 4));
        assert!(binned.iter().all(|&v| v == 4.0));
        assert!(bmask.iter().all(|&b| b == 0));
        assert_eq!(
            d.downsampling(),
            Some(Binning {
                factor: 2,
                min_valid_pixels: 1
            })
        );
    }

    #[test]
    fn test_sparse_bins_flagged_invalid() {
        let mut d = detector()
            .with_hole(2.0 * 75e-6)
            .with_downsampling(2)
            .unwrap()
            .with_min_valid_pixels(4);
        let out = d.detect_photons(&Array2::from_elem((6, 8), 1.0)).unwrap();
        let (binned, bmask) = out.downsampled.unwrap();
        // the beamstop covers rows 2..=3, columns 3..=4, leaving two valid
        // pixels in each of bins (1, 1) and (1, 2)
        for ((by, bx), &bits) in bmask.indexed_iter() {
            if by == 1 && (bx == 1 || bx == 2) {
                assert_eq!(bits, pixelmask::INVALID);
                assert_eq!(binned[[by, bx]], 2.0);
            } else {
                assert_eq!(bits, 0);
                assert_eq!(binned[[by, bx]], 4.0);
            }
        }
    }

    #[test]
    fn test_poisson_readout_is_integral() {
        let mut d = detector().with_noise(Noise::Poisson, 5);
        let i = Array2::from_elem((6, 8), 12.5);
        let out = d.detect_photons(&i).unwrap();
        assert!(out.intensity.iter().all(|v| v.fract() == 0.0));
    }

    #[test]
    fn test_resolution_element() {
        let d = detector();
        let s = d.state();
        let (required, suggested) = s.map_spacing(1e-9);
        assert!(suggested < required);
        assert_relative_eq!(required * SQRT_2, s.resolution_element(1e-9), max_relative = 1e-12);
    }

    #[test]
    fn test_wrong_shape_rejected() {
        let mut d = detector();
        assert!(d.detect_photons(&Array2::zeros((2, 2))).is_err());
    }
}
