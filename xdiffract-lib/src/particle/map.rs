//! Particles represented by a real-space refractive-index-deficit volume,
//! scattered through a non-uniform Fourier transform.

use std::f64::consts::PI;
use std::path::Path;
use std::sync::Arc;

use ndarray::{Array2, Array3};
use num_complex::Complex64;
use xdiffract_data::MapRecord;

use super::sphere::check_diameter;
use super::spheroid::{semi_diameter_a, semi_diameter_c};
use super::{Pose, Scatter, ScatterContext, Scattered};
use crate::aggregate::{Record, Value};
use crate::bundle;
use crate::error::{DiffractError, Result};
use crate::material::{DensityMap, Material};
use crate::ndft::{in_unit_cell, ndft};
use crate::rotation::Rotation;
use crate::scattering_factors::ScatteringFactors;

const PHI: f64 = 1.618_033_988_749_895;

/// Largest voxel count a map may have, 256^3.
pub const MAX_MAP_VOXELS: usize = 1 << 24;

fn check_voxel_count(shape: (usize, usize, usize)) -> Result<()> {
    let (z, y, x) = shape;
    let n = z.checked_mul(y).and_then(|n| n.checked_mul(x));
    match n {
        Some(n) if n <= MAX_MAP_VOXELS => Ok(()),
        _ => Err(DiffractError::InvalidGeometry(format!(
            "map of {z} x {y} x {x} voxels exceeds {MAX_MAP_VOXELS}"
        ))),
    }
}

/// Homogeneous shapes that can be voxelized on demand. Axes are the
/// particle's body frame; spheroids are symmetric about z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapShape {
    Sphere,
    Spheroid { flattening: f64 },
    /// Axis-aligned cube whose edge equals the diameter.
    Cube,
    /// Icosahedron with circumscribed diameter.
    Icosahedron,
}

impl MapShape {
    /// Largest body-frame coordinate along any axis.
    fn half_extent(&self, diameter: f64) -> f64 {
        match *self {
            MapShape::Spheroid { flattening } => {
                semi_diameter_a(diameter, flattening).max(semi_diameter_c(diameter, flattening))
            }
            _ => diameter / 2.0,
        }
    }

    fn contains(&self, diameter: f64, p: [f64; 3]) -> bool {
        let r = diameter / 2.0;
        match *self {
            MapShape::Sphere => p[0] * p[0] + p[1] * p[1] + p[2] * p[2] <= r * r,
            MapShape::Spheroid { flattening } => {
                let a = semi_diameter_a(diameter, flattening);
                let c = semi_diameter_c(diameter, flattening);
                (p[0] * p[0] + p[1] * p[1]) / (a * a) + p[2] * p[2] / (c * c) <= 1.0
            }
            MapShape::Cube => p.iter().all(|x| x.abs() <= r),
            MapShape::Icosahedron => {
                let inradius = icosahedron_inradius(r);
                icosahedron_face_normals()
                    .iter()
                    .all(|n| p[0] * n[0] + p[1] * n[1] + p[2] * n[2] <= inradius)
            }
        }
    }
}

fn icosahedron_inradius(circumradius: f64) -> f64 {
    let edge = 4.0 * circumradius / (10.0 + 2.0 * 5f64.sqrt()).sqrt();
    edge * PHI * PHI / (2.0 * 3f64.sqrt())
}

/// Unit normals of the 20 faces of an icosahedron with vertices at the
/// cyclic permutations of `(0, ±1, ±phi)`.
fn icosahedron_face_normals() -> Vec<[f64; 3]> {
    let s = 3f64.sqrt();
    let mut normals = Vec::with_capacity(20);
    for sx in [-1.0, 1.0] {
        for sy in [-1.0, 1.0] {
            for sz in [-1.0, 1.0] {
                normals.push([sx / s, sy / s, sz / s]);
            }
        }
    }
    for s1 in [-1.0, 1.0] {
        for s2 in [-1.0, 1.0] {
            let (big, small) = (s1 * PHI / s, s2 / (PHI * s));
            normals.push([0.0, big, small]);
            normals.push([small, 0.0, big]);
            normals.push([big, small, 0.0]);
        }
    }
    normals
}

/// Where the voxel volume comes from.
#[derive(Debug, Clone)]
pub enum MapSource {
    /// A homogeneous shape of one material, sampled at the spacing the
    /// detector geometry asks for.
    Generated {
        shape: MapShape,
        material: Arc<Material>,
    },
    /// Refractive-index deficit given directly, indexed `[z, y, x]`.
    Custom {
        dn: Arc<Array3<Complex64>>,
        spacing: f64,
    },
    /// Per-element number densities, evaluated at the beam wavelength.
    Density { map: Arc<DensityMap>, spacing: f64 },
}

impl MapSource {
    /// Volume read from a postcard-serialized, zstd-compressed [`MapRecord`].
    /// Density maps use `factors`, or the forward-scattering limit without.
    pub fn from_path(path: &Path, factors: Option<&Arc<dyn ScatteringFactors>>) -> Result<Self> {
        Self::from_record(bundle::read(path)?, factors)
    }

    pub fn from_record(
        record: MapRecord,
        factors: Option<&Arc<dyn ScatteringFactors>>,
    ) -> Result<Self> {
        let [z, y, x] = record.shape.map(|n| n as usize);
        let shape = (z, y, x);
        check_voxel_count(shape)?;
        let n = z * y * x;
        let volume = |channel: &str, values: Vec<f64>| {
            if values.len() != n {
                return Err(DiffractError::ShapeMismatch {
                    channel: channel.to_string(),
                    expected: vec![z, y, x],
                    found: vec![values.len()],
                });
            }
            Array3::from_shape_vec(shape, values)
                .map_err(|e| DiffractError::DataError(format!("{channel}: {e}")))
        };

        let spacing = record.spacing;
        if record.densities.is_empty() {
            let re = volume("dn_real", record.dn_real)?;
            let im = volume("dn_imag", record.dn_imag)?;
            let dn = ndarray::Zip::from(&re)
                .and(&im)
                .map_collect(|&re, &im| Complex64::new(re, im));
            return Ok(MapSource::Custom {
                dn: Arc::new(dn),
                spacing,
            });
        }
        if !(record.dn_real.is_empty() && record.dn_imag.is_empty()) {
            return Err(DiffractError::DataError(
                "map file holds both dn and densities".to_string(),
            ));
        }
        let mut map = DensityMap::new(shape);
        if let Some(f) = factors {
            map = map.with_scattering_factors(Arc::clone(f));
        }
        for d in record.densities {
            let density = volume(&d.element, d.density)?;
            map.set_density(&d.element, density)?;
        }
        Ok(MapSource::Density {
            map: Arc::new(map),
            spacing,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MapParticle {
    pub diameter: f64,
    pub source: MapSource,
}

impl MapParticle {
    pub fn new(diameter: f64, source: MapSource) -> Result<Self> {
        check_diameter(diameter)?;
        match &source {
            MapSource::Generated {
                shape: MapShape::Spheroid { flattening },
                ..
            } if !(flattening.is_finite() && *flattening > 0.0) => {
                return Err(DiffractError::InvalidGeometry(format!(
                    "flattening must be positive, got {flattening}"
                )));
            }
            MapSource::Custom { spacing, .. } | MapSource::Density { spacing, .. }
                if !(spacing.is_finite() && *spacing > 0.0) =>
            {
                return Err(DiffractError::InvalidGeometry(format!(
                    "voxel spacing must be positive, got {spacing}"
                )));
            }
            _ => {}
        }
        Ok(MapParticle { diameter, source })
    }

    /// Voxelized refractive-index deficit and its spacing.
    ///
    /// Generated shapes use the finer of the two spacings. Given volumes keep
    /// their own spacing, with a warning when it is coarser than required.
    pub fn map3d(
        &self,
        wavelength: f64,
        dx_required: f64,
        dx_suggested: f64,
    ) -> Result<(Array3<Complex64>, f64)> {
        match &self.source {
            MapSource::Generated { shape, material } => {
                let dn = material.dn(wavelength)?;
                let dx = dx_suggested.min(dx_required);
                Ok((voxelize(shape, self.diameter, dx, dn)?, dx))
            }
            MapSource::Custom { dn, spacing } => {
                warn_if_coarse(*spacing, dx_required);
                Ok((dn.as_ref().clone(), *spacing))
            }
            MapSource::Density { map, spacing } => {
                warn_if_coarse(*spacing, dx_required);
                Ok((map.dn(wavelength)?, *spacing))
            }
        }
    }
}

fn warn_if_coarse(spacing: f64, dx_required: f64) {
    if spacing > dx_required {
        log::warn!(
            "map spacing {spacing:e} m is coarser than the {dx_required:e} m the detector resolves"
        );
    }
}

fn voxelize(shape: &MapShape, diameter: f64, dx: f64, dn: Complex64) -> Result<Array3<Complex64>> {
    let half = (shape.half_extent(diameter) / dx).ceil();
    if !(half.is_finite() && half < MAX_MAP_VOXELS as f64) {
        return Err(DiffractError::InvalidGeometry(format!(
            "voxel spacing {dx:e} m is too fine for a {diameter:e} m particle"
        )));
    }
    let half = half as usize;
    let n = 2 * half + 1;
    check_voxel_count((n, n, n))?;
    let offset = half as f64;
    Ok(Array3::from_shape_fn((n, n, n), |(iz, iy, ix)| {
        let p = [
            (ix as f64 - offset) * dx,
            (iy as f64 - offset) * dx,
            (iz as f64 - offset) * dx,
        ];
        if shape.contains(diameter, p) {
            dn
        } else {
            Complex64::new(0.0, 0.0)
        }
    }))
}

impl Scatter for MapParticle {
    fn scatter(&self, pose: &Pose, f0: f64, ctx: &mut ScatterContext<'_>) -> Result<Scattered> {
        let wavelength = ctx.source.wavelength;
        let params = ctx
            .detector
            .qmap_params(wavelength)
            .oriented(pose.euler_angles);
        let qmap = ctx.qmaps.get(&params)?;
        let (dx_required, dx_suggested) = ctx.detector.map_spacing(wavelength);
        let (volume, dx) = self.map3d(wavelength, dx_required, dx_suggested)?;

        let (nz, ny_map, nx_map) = volume.dim();
        log::debug!(
            "map3d shape ({nz}, {ny_map}, {nx_map}), sum |dn| {:e}",
            volume.iter().map(|v| v.norm()).sum::<f64>()
        );
        if volume.iter().any(|v| !(v.re.is_finite() && v.im.is_finite())) {
            log::warn!("non-finite values in the dn map of the particle");
        }

        // scattering vectors in cycles per voxel
        let (ny, nx) = qmap.dim();
        let mut valid = Vec::with_capacity(ny * nx);
        let mut frequencies = Vec::with_capacity(ny * nx);
        let mut non_finite = false;
        for iy in 0..ny {
            for ix in 0..nx {
                let k = qmap.q(iy, ix).map(|c| dx * c / (2.0 * PI));
                non_finite |= k.iter().any(|c| !c.is_finite());
                let ok = in_unit_cell(k);
                valid.push(ok);
                frequencies.push(if ok { k } else { [0.0; 3] });
            }
        }
        if non_finite {
            log::warn!("non-finite values in the scattering vectors");
        }
        let n_invalid = valid.iter().filter(|v| !**v).count();
        if n_invalid > 0 {
            log::debug!("{n_invalid} invalid pixel positions");
        }

        let transformed = ndft(&volume, &frequencies);
        let scale = f0 * dx * dx * dx;
        let nan = Complex64::new(f64::NAN, f64::NAN);
        let amplitude = Array2::from_shape_fn((ny, nx), |(iy, ix)| {
            let i = iy * nx + ix;
            if valid[i] { transformed[i] * scale } else { nan }
        });
        log::debug!("got pattern of {nx} x {ny} pixels");

        let mut record = Record::new();
        if ctx.save_map {
            record.insert("dn_map".into(), Value::from(volume));
            record.insert("dx".into(), Value::from(dx));
            record.insert("dx3".into(), Value::from(dx * dx * dx));
        }
        Ok(Scattered {
            amplitude,
            qmap,
            frame: Rotation::from_euler(pose.euler_angles),
            record,
        })
    }

    fn describe(&self, record: &mut Record) {
        record.insert("diameter".into(), Value::from(self.diameter));
        if let MapSource::Generated {
            shape: MapShape::Spheroid { flattening },
            ..
        } = &self.source
        {
            record.insert("flattening".into(), Value::from(*flattening));
        }
    }
}
