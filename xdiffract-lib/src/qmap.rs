//! Detector-plane scattering-vector maps and their single-slot cache.
//!
//! Pixel `(ix, iy)` sits at `((ix - cx) p, (iy - cy) p, D)` relative to the
//! interaction point, the beam travels along +z, and the scattering vector is
//! `q = k (s - e_z)` with `k = 2 pi / lambda` and `s` the unit vector towards
//! the pixel. Components are stored in `(x, y, z)` order.

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array2, Array3, ArrayView3};

use crate::error::{DiffractError, Result};
use crate::rotation::Rotation;

/// The ten scalars that fully determine a qmap; also the cache key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QMapParams {
    pub nx: usize,
    pub ny: usize,
    pub cx: f64,
    pub cy: f64,
    pub pixel_size: f64,
    pub distance: f64,
    pub wavelength: f64,
    pub euler_angles: [f64; 3],
}

impl QMapParams {
    pub fn validate(&self) -> Result<()> {
        if self.nx == 0 || self.ny == 0 {
            return Err(DiffractError::InvalidGeometry(format!(
                "detector must have pixels, got {}x{}",
                self.nx, self.ny
            )));
        }
        for (name, v) in [
            ("pixel_size", self.pixel_size),
            ("distance", self.distance),
            ("wavelength", self.wavelength),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(DiffractError::InvalidGeometry(format!(
                    "{name} must be positive, got {v}"
                )));
            }
        }
        if !(self.cx.is_finite() && self.cy.is_finite()) {
            return Err(DiffractError::InvalidGeometry("non-finite detector center".to_string()));
        }
        Ok(())
    }

    /// Same geometry with a different orientation.
    pub fn oriented(self, euler_angles: [f64; 3]) -> Self {
        QMapParams {
            euler_angles,
            ..self
        }
    }

    pub fn wavenumber(&self) -> f64 {
        2.0 * PI / self.wavelength
    }

    /// Lab-frame scattering vector at fractional pixel coordinates.
    #[inline]
    fn q_lab(&self, ix: f64, iy: f64) -> [f64; 3] {
        let k = self.wavenumber();
        let x = (ix - self.cx) * self.pixel_size;
        let y = (iy - self.cy) * self.pixel_size;
        let r = (x * x + y * y + self.distance * self.distance).sqrt();
        [k * x / r, k * y / r, k * (self.distance / r - 1.0)]
    }

    /// Largest |q| over the pixel edges reached along the x and y axes.
    pub fn q_max_edge(&self) -> f64 {
        let ex = self.cx.max(self.nx as f64 - 1.0 - self.cx);
        let ey = self.cy.max(self.ny as f64 - 1.0 - self.cy);
        norm(self.q_lab(self.cx + ex, self.cy))
            .max(norm(self.q_lab(self.cx, self.cy + ey)))
    }

    /// Largest |q| over the detector corners.
    pub fn q_max_corner(&self) -> f64 {
        let xs = [0.0, self.nx as f64 - 1.0];
        let ys = [0.0, self.ny as f64 - 1.0];
        xs.iter()
            .flat_map(|&x| ys.iter().map(move |&y| (x, y)))
            .map(|(x, y)| norm(self.q_lab(x, y)))
            .fold(0.0, f64::max)
    }
}

#[inline]
pub(crate) fn norm(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[inline]
pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Per-pixel scattering vectors, array shape `[ny, nx, 3]`.
#[derive(Debug, Clone, PartialEq)]
pub struct QMap {
    data: Array3<f64>,
}

impl QMap {
    pub fn from_array(data: Array3<f64>) -> Result<Self> {
        if data.dim().2 != 3 {
            return Err(DiffractError::ShapeMismatch {
                channel: "qmap".to_string(),
                expected: vec![data.dim().0, data.dim().1, 3],
                found: data.shape().to_vec(),
            });
        }
        Ok(QMap { data })
    }

    /// `(ny, nx)`
    pub fn dim(&self) -> (usize, usize) {
        let (ny, nx, _) = self.data.dim();
        (ny, nx)
    }

    #[inline]
    pub fn q(&self, iy: usize, ix: usize) -> [f64; 3] {
        [
            self.data[[iy, ix, 0]],
            self.data[[iy, ix, 1]],
            self.data[[iy, ix, 2]],
        ]
    }

    pub fn view(&self) -> ArrayView3<'_, f64> {
        self.data.view()
    }

    pub fn as_array(&self) -> &Array3<f64> {
        &self.data
    }

    /// |q| per pixel.
    pub fn magnitude(&self) -> Array2<f64> {
        let (ny, nx) = self.dim();
        Array2::from_shape_fn((ny, nx), |(iy, ix)| norm(self.q(iy, ix)))
    }
}

/// Compute the scattering-vector map, expressed in the frame rotated by the
/// parameters' Euler angles (`q_body = R^T q_lab`).
pub fn generate_qmap(params: &QMapParams) -> Result<QMap> {
    params.validate()?;
    let rotation =
        (params.euler_angles != [0.0; 3]).then(|| Rotation::from_euler(params.euler_angles));
    let mut data = Array3::<f64>::zeros((params.ny, params.nx, 3));
    for iy in 0..params.ny {
        for ix in 0..params.nx {
            let q = params.q_lab(ix as f64, iy as f64);
            let q = match &rotation {
                Some(r) => r.apply_inverse(q),
                None => q,
            };
            data[[iy, ix, 0]] = q[0];
            data[[iy, ix, 1]] = q[1];
            data[[iy, ix, 2]] = q[2];
        }
    }
    Ok(QMap { data })
}

/// |q| = 2 k sin(theta / 2) per pixel; orientation independent.
pub fn absolute_qmap(params: &QMapParams) -> Result<Array2<f64>> {
    params.validate()?;
    Ok(Array2::from_shape_fn((params.ny, params.nx), |(iy, ix)| {
        norm(params.q_lab(ix as f64, iy as f64))
    }))
}

/// Retains the most recently computed qmap, keyed by its exact parameters.
#[derive(Debug, Default)]
pub struct QMapCache {
    slot: Option<(QMapParams, Arc<QMap>)>,
    computations: usize,
}

impl QMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached map when `params` equals the cached key, otherwise
    /// compute a new map and replace the slot.
    pub fn get(&mut self, params: &QMapParams) -> Result<Arc<QMap>> {
        if let Some((key, qmap)) = &self.slot {
            if key == params {
                return Ok(Arc::clone(qmap));
            }
        }
        log::info!("calculating qmap");
        let qmap = Arc::new(generate_qmap(params)?);
        self.computations += 1;
        self.slot = Some((*params, Arc::clone(&qmap)));
        Ok(qmap)
    }

    /// Number of maps computed over the cache's lifetime.
    pub fn computations(&self) -> usize {
        self.computations
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}
