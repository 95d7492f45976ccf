//! Proper Euler rotations (intrinsic z-y-z convention).

use std::f64::consts::PI;

use rand::Rng;

/// A 3x3 rotation matrix `R = Rz(e0) * Ry(e1) * Rz(e2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    m: [[f64; 3]; 3],
}

impl Rotation {
    pub const fn identity() -> Self {
        Rotation {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    pub fn from_euler(angles: [f64; 3]) -> Self {
        let [e0, e1, e2] = angles;
        let (s0, c0) = e0.sin_cos();
        let (s1, c1) = e1.sin_cos();
        let (s2, c2) = e2.sin_cos();
        Rotation {
            m: [
                [c0 * c1 * c2 - s0 * s2, -c0 * c1 * s2 - s0 * c2, c0 * s1],
                [s0 * c1 * c2 + c0 * s2, -s0 * c1 * s2 + c0 * c2, s0 * s1],
                [-s1 * c2, s1 * s2, c1],
            ],
        }
    }

    pub fn matrix(&self) -> [[f64; 3]; 3] {
        self.m
    }

    /// `R v`
    #[inline]
    pub fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.m;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }

    /// `R^T v`, i.e. the lab-frame vector expressed in the rotated body frame.
    #[inline]
    pub fn apply_inverse(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.m;
        [
            m[0][0] * v[0] + m[1][0] * v[1] + m[2][0] * v[2],
            m[0][1] * v[0] + m[1][1] * v[1] + m[2][1] * v[2],
            m[0][2] * v[0] + m[1][2] * v[1] + m[2][2] * v[2],
        ]
    }

    /// Body z axis expressed in the lab frame.
    pub fn symmetry_axis(&self) -> [f64; 3] {
        [self.m[0][2], self.m[1][2], self.m[2][2]]
    }
}

/// Euler angles of a rotation drawn uniformly from SO(3).
pub fn random_euler_angles<R: Rng + ?Sized>(rng: &mut R) -> [f64; 3] {
    let e0 = 2.0 * PI * rng.random::<f64>();
    let e1 = (1.0 - 2.0 * rng.random::<f64>()).acos();
    let e2 = 2.0 * PI * rng.random::<f64>();
    [e0, e1, e2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn close(a: [f64; 3], b: [f64; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-12)
    }

    #[test]
    fn test_zero_angles_is_identity() {
        assert_eq!(Rotation::from_euler([0.0; 3]), Rotation::identity());
    }

    #[test]
    fn test_inverse_undoes_rotation() {
        let r = Rotation::from_euler([0.3, 1.1, -2.0]);
        let v = [1.0, -2.0, 0.5];
        assert!(close(r.apply_inverse(r.apply(v)), v));
    }

    #[test]
    fn test_symmetry_axis_angles() {
        let r = Rotation::from_euler([PI / 2.0, PI / 2.0, 0.7]);
        assert!(close(r.symmetry_axis(), [0.0, 1.0, 0.0]));
    }

    #[test]
    fn test_random_angles_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            let [e0, e1, e2] = random_euler_angles(&mut rng);
            assert!((0.0..2.0 * PI).contains(&e0));
            assert!((0.0..=PI).contains(&e1));
            assert!((0.0..2.0 * PI).contains(&e2));
        }
    }
}
