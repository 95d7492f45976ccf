//! Coherent sum of particle amplitudes.

use ndarray::{Array2, Zip};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{DiffractError, Result};
use crate::particle::Scattered;
use crate::qmap::{QMap, dot};

/// Which scattering vectors drive the position phase factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuperpositionMode {
    /// Every particle uses its own qmap, rotated into the lab frame.
    #[default]
    PerParticle,
    /// Every particle uses the qmap of the last particle, as given.
    LastParticle,
}

fn check_shape(channel: &str, expected: (usize, usize), found: (usize, usize)) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(DiffractError::ShapeMismatch {
            channel: channel.to_string(),
            expected: vec![expected.0, expected.1],
            found: vec![found.0, found.1],
        })
    }
}

/// `sum_i F_i exp(-i r_i . q)` with one scattering-vector map for all fields.
pub fn combine(
    fields: &[&Array2<Complex64>],
    positions: &[[f64; 3]],
    qmap: &QMap,
) -> Result<Array2<Complex64>> {
    if fields.len() != positions.len() {
        return Err(DiffractError::DataError(format!(
            "{} fields but {} positions",
            fields.len(),
            positions.len()
        )));
    }
    for field in fields {
        check_shape("fourier_pattern", qmap.dim(), field.dim())?;
    }
    let mut total = Array2::<Complex64>::zeros(qmap.dim());
    Zip::indexed(&mut total).par_for_each(|(iy, ix), t| {
        let q = qmap.q(iy, ix);
        for (field, r) in fields.iter().zip(positions) {
            *t += field[[iy, ix]] * Complex64::from_polar(1.0, -dot(*r, q));
        }
    });
    Ok(total)
}

/// Superimpose scattered particles at `positions` onto a `(ny, nx)` grid.
pub fn superimpose(
    scattered: &[Scattered],
    positions: &[[f64; 3]],
    shape: (usize, usize),
    mode: SuperpositionMode,
) -> Result<Array2<Complex64>> {
    let Some(last) = scattered.last() else {
        return Ok(Array2::zeros(shape));
    };
    if scattered.len() != positions.len() {
        return Err(DiffractError::DataError(format!(
            "{} particles but {} positions",
            scattered.len(),
            positions.len()
        )));
    }
    match mode {
        SuperpositionMode::LastParticle => {
            check_shape("qmap", shape, last.qmap.dim())?;
            let fields: Vec<&Array2<Complex64>> = scattered.iter().map(|s| &s.amplitude).collect();
            combine(&fields, positions, &last.qmap)
        }
        SuperpositionMode::PerParticle => {
            for s in scattered {
                check_shape("fourier_pattern", shape, s.amplitude.dim())?;
                check_shape("qmap", shape, s.qmap.dim())?;
            }
            let mut total = Array2::<Complex64>::zeros(shape);
            Zip::indexed(&mut total).par_for_each(|(iy, ix), t| {
                for (s, r) in scattered.iter().zip(positions) {
                    let q = s.frame.apply(s.qmap.q(iy, ix));
                    *t += s.amplitude[[iy, ix]] * Complex64::from_polar(1.0, -dot(*r, q));
                }
            });
            Ok(total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Record;
    use crate::qmap::{generate_qmap, QMapParams};
    use crate::rotation::Rotation;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn params() -> QMapParams {
        QMapParams {
            nx: 6,
            ny: 5,
            cx: 2.5,
            cy: 2.0,
            pixel_size: 1e-4,
            distance: 0.05,
            wavelength: 1e-9,
            euler_angles: [0.0; 3],
        }
    }

    fn scattered(params: QMapParams, value: f64) -> Scattered {
        let qmap = Arc::new(generate_qmap(&params).unwrap());
        Scattered {
            amplitude: Array2::from_elem(qmap.dim(), Complex64::new(value, 0.5)),
            qmap,
            frame: Rotation::from_euler(params.euler_angles),
            record: Record::new(),
        }
    }

    #[test]
    fn test_single_particle_at_origin_is_unchanged() {
        let s = scattered(params(), 2.0);
        let total =
            superimpose(&[s.clone()], &[[0.0; 3]], (5, 6), SuperpositionMode::PerParticle).unwrap();
        assert_eq!(total, s.amplitude);
    }

    #[test]
    fn test_rotated_qmaps_agree_in_lab_frame() {
        // the same particle described in a rotated frame gives the same sum
        let lab = scattered(params(), 1.0);
        let body = scattered(params().oriented([0.3, 1.0, -0.4]), 1.0);
        let r = [[3e-8, -1e-8, 2e-8]];
        let a = superimpose(&[lab], &r, (5, 6), SuperpositionMode::PerParticle).unwrap();
        let b = superimpose(&[body], &r, (5, 6), SuperpositionMode::PerParticle).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(x.re, y.re, epsilon = 1e-9);
            assert_abs_diff_eq!(x.im, y.im, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_last_particle_mode_matches_combine() {
        let a = scattered(params(), 1.0);
        let b = scattered(params(), 3.0);
        let positions = [[1e-8, 0.0, 0.0], [-1e-8, 0.0, 0.0]];
        let total = superimpose(
            &[a.clone(), b.clone()],
            &positions,
            (5, 6),
            SuperpositionMode::LastParticle,
        )
        .unwrap();
        let direct = combine(&[&a.amplitude, &b.amplitude], &positions, &b.qmap).unwrap();
        assert_eq!(total, direct);
    }

    #[test]
    fn test_empty_and_mismatched_inputs() {
        let empty = superimpose(&[], &[], (2, 3), SuperpositionMode::PerParticle).unwrap();
        assert_eq!(empty.dim(), (2, 3));
        let s = scattered(params(), 1.0);
        let mismatched =
            superimpose(&[s.clone()], &[[0.0; 3]], (4, 4), SuperpositionMode::PerParticle);
        assert!(mismatched.is_err());
        assert!(combine(&[&s.amplitude], &[], &s.qmap).is_err());
    }
}
