use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array2, Zip};
use num_complex::Complex64;

use super::{Pose, Scatter, ScatterContext, Scattered};
use crate::aggregate::{Record, Value};
use crate::error::{DiffractError, Result};
use crate::material::Material;
use crate::qmap::norm;
use crate::rotation::Rotation;

/// Homogeneous sphere.
#[derive(Debug, Clone)]
pub struct Sphere {
    pub diameter: f64,
    pub material: Arc<Material>,
}

impl Sphere {
    pub fn new(diameter: f64, material: Arc<Material>) -> Result<Self> {
        check_diameter(diameter)?;
        Ok(Sphere { diameter, material })
    }

    pub fn volume(&self) -> f64 {
        sphere_volume(self.diameter)
    }
}

pub(crate) fn check_diameter(diameter: f64) -> Result<()> {
    if diameter.is_finite() && diameter > 0.0 {
        Ok(())
    } else {
        Err(DiffractError::InvalidGeometry(format!(
            "particle diameter must be positive, got {diameter}"
        )))
    }
}

pub fn sphere_volume(diameter: f64) -> f64 {
    let r = diameter / 2.0;
    4.0 / 3.0 * PI * r * r * r
}

/// Normalized sphere form factor `3 (sin x - x cos x) / x^3`, 1 at x = 0.
pub fn sphere_form_factor(x: f64) -> f64 {
    if x.abs() < 1e-3 {
        1.0 - x * x / 10.0
    } else {
        3.0 * (x.sin() - x * x.cos()) / (x * x * x)
    }
}

/// Amplitude of a sphere of `radius` at |q|, scaled so that its square at
/// q = 0 is `K`.
pub fn sphere_amplitude(sqrt_k: f64, q: f64, radius: f64) -> f64 {
    sqrt_k * sphere_form_factor(q * radius)
}

impl Scatter for Sphere {
    fn scatter(&self, _pose: &Pose, f0: f64, ctx: &mut ScatterContext<'_>) -> Result<Scattered> {
        let wavelength = ctx.source.wavelength;
        let dn = self.material.dn(wavelength)?;
        let qmap = ctx.qmaps.get(&ctx.detector.qmap_params(wavelength))?;
        let sqrt_k = f0 * self.volume() * dn.norm();
        let radius = self.diameter / 2.0;

        let mut amplitude = Array2::<Complex64>::zeros(qmap.dim());
        Zip::indexed(&mut amplitude).par_for_each(|(iy, ix), a| {
            let q = norm(qmap.q(iy, ix));
            *a = Complex64::new(sphere_amplitude(sqrt_k, q, radius), 0.0);
        });
        Ok(Scattered {
            amplitude,
            qmap,
            frame: Rotation::identity(),
            record: Record::new(),
        })
    }

    fn describe(&self, record: &mut Record) {
        record.insert("diameter".into(), Value::from(self.diameter));
    }
}
