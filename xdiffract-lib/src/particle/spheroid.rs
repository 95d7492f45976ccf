use std::sync::Arc;

use ndarray::{Array2, Zip};
use num_complex::Complex64;

use super::sphere::{check_diameter, sphere_form_factor, sphere_volume};
use super::{Pose, Scatter, ScatterContext, Scattered};
use crate::aggregate::{Record, Value};
use crate::error::{DiffractError, Result};
use crate::material::Material;
use crate::qmap::dot;
use crate::rotation::Rotation;

/// Spheroid of the same volume as a sphere of `diameter`, stretched along
/// its symmetry axis by `flattening = c / a`.
#[derive(Debug, Clone)]
pub struct Spheroid {
    pub diameter: f64,
    pub flattening: f64,
    pub material: Arc<Material>,
}

impl Spheroid {
    pub fn new(diameter: f64, flattening: f64, material: Arc<Material>) -> Result<Self> {
        check_diameter(diameter)?;
        if !(flattening.is_finite() && flattening > 0.0) {
            return Err(DiffractError::InvalidGeometry(format!(
                "flattening must be positive, got {flattening}"
            )));
        }
        Ok(Spheroid {
            diameter,
            flattening,
            material,
        })
    }
}

/// Equatorial semi-diameter.
pub fn semi_diameter_a(diameter: f64, flattening: f64) -> f64 {
    diameter / 2.0 * flattening.powf(-1.0 / 3.0)
}

/// Polar semi-diameter.
pub fn semi_diameter_c(diameter: f64, flattening: f64) -> f64 {
    diameter / 2.0 * flattening.powf(2.0 / 3.0)
}

/// Polar angle of the symmetry axis for z-y-z Euler angles.
pub fn spheroid_theta(euler_angles: [f64; 3]) -> f64 {
    euler_angles[1]
}

/// Azimuth of the symmetry axis for z-y-z Euler angles.
pub fn spheroid_phi(euler_angles: [f64; 3]) -> f64 {
    euler_angles[0]
}

/// Amplitude of a spheroid with semi-axes `a` (equatorial) and `c` along
/// the axis `(theta, phi)`, evaluated at a lab-frame scattering vector.
pub fn spheroid_amplitude(sqrt_k: f64, q: [f64; 3], a: f64, c: f64, theta: f64, phi: f64) -> f64 {
    let (st, ct) = theta.sin_cos();
    let (sp, cp) = phi.sin_cos();
    let axis = [st * cp, st * sp, ct];
    let qn = dot(q, axis);
    let x2 = a * a * dot(q, q) + (c * c - a * a) * qn * qn;
    sqrt_k * sphere_form_factor(x2.max(0.0).sqrt())
}

impl Scatter for Spheroid {
    fn scatter(&self, pose: &Pose, f0: f64, ctx: &mut ScatterContext<'_>) -> Result<Scattered> {
        let wavelength = ctx.source.wavelength;
        let dn = self.material.dn(wavelength)?;
        // the orientation enters the formula, not the qmap
        let qmap = ctx.qmaps.get(&ctx.detector.qmap_params(wavelength))?;
        let sqrt_k = f0 * sphere_volume(self.diameter) * dn.norm();
        let a = semi_diameter_a(self.diameter, self.flattening);
        let c = semi_diameter_c(self.diameter, self.flattening);
        let theta = spheroid_theta(pose.euler_angles);
        let phi = spheroid_phi(pose.euler_angles);

        let mut amplitude = Array2::<Complex64>::zeros(qmap.dim());
        Zip::indexed(&mut amplitude).par_for_each(|(iy, ix), v| {
            let f = spheroid_amplitude(sqrt_k, qmap.q(iy, ix), a, c, theta, phi);
            *v = Complex64::new(f, 0.0);
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
        record.insert("flattening".into(), Value::from(self.flattening));
    }
}
