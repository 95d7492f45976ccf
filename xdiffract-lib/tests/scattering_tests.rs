mod common;

use std::sync::Arc;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::Array3;
use num_complex::Complex64;
use xdiffract::particle::{MapParticle, MapShape, MapSource, Spheroid};
use xdiffract::pixelmask;
use xdiffract::qmap::generate_qmap;
use xdiffract::{
    Detector, DetectorState, DiffractError, Molecule, Particle, ParticleKind, Pose, Propagator,
};

use common::{FixedSample, beam, detector, sphere_at, water};

fn pattern(propagator: &mut Propagator) -> ndarray::ArrayD<Complex64> {
    let exposure = propagator.propagate_single().unwrap();
    exposure.channels["fourier_pattern"].as_complex().unwrap().clone()
}

#[test]
fn test_centered_sphere_is_centrosymmetric() {
    let shot = vec![sphere_at(100e-9, [0.0; 3])];
    let mut propagator = Propagator::new(beam(), FixedSample::new(vec![shot]), detector(128));
    let exposure = propagator.propagate_single().unwrap();
    let intensity = exposure.channels["intensity_pattern"].as_real().unwrap();
    assert_eq!(intensity.shape(), &[128, 128]);
    for iy in 0..128 {
        for ix in 0..128 {
            let a = intensity[[iy, ix]];
            let b = intensity[[127 - iy, 127 - ix]];
            assert_relative_eq!(a, b, max_relative = 1e-12, epsilon = 1e-300);
        }
    }
    // forward scattering dominates
    assert!(intensity[[63, 63]] > intensity[[0, 0]]);
}

#[test]
fn test_round_spheroid_matches_sphere() {
    let diameter = 120e-9;
    let sphere = vec![sphere_at(diameter, [0.0; 3])];
    let spheroid = vec![Particle::new(
        ParticleKind::Spheroid(Spheroid::new(diameter, 1.0, water()).unwrap()),
        Pose {
            position: [0.0; 3],
            euler_angles: [0.4, 1.3, -0.2],
        },
    )];
    let a = pattern(&mut Propagator::new(beam(), FixedSample::new(vec![sphere]), detector(32)));
    let b = pattern(&mut Propagator::new(beam(), FixedSample::new(vec![spheroid]), detector(32)));
    for (x, y) in a.iter().zip(b.iter()) {
        assert_relative_eq!(x.re, y.re, max_relative = 1e-9, epsilon = 1e-9 * a[[16, 16]].re);
        assert_eq!(y.im, 0.0);
    }
}

#[test]
fn test_spheroid_rotation_keeps_axis_symmetry() {
    // rotating the symmetry axis about the beam axis mirrors the pattern
    let make = |phi: f64| {
        vec![Particle::new(
            ParticleKind::Spheroid(Spheroid::new(150e-9, 2.0, water()).unwrap()),
            Pose {
                position: [0.0; 3],
                euler_angles: [phi, std::f64::consts::FRAC_PI_2, 0.0],
            },
        )]
    };
    let along_x = pattern(&mut Propagator::new(
        beam(),
        FixedSample::new(vec![make(0.0)]),
        detector(33),
    ));
    let along_y = pattern(&mut Propagator::new(
        beam(),
        FixedSample::new(vec![make(std::f64::consts::FRAC_PI_2)]),
        detector(33),
    ));
    for iy in 0..33 {
        for ix in 0..33 {
            assert_relative_eq!(
                along_x[[iy, ix]].re,
                along_y[[ix, iy]].re,
                max_relative = 1e-9,
                epsilon = 1e-9 * along_x[[16, 16]].re
            );
        }
    }
}

#[test]
fn test_map_pixels_outside_transform_domain_are_nan() {
    let spacing = 100e-9;
    let dn = Arc::new(Array3::from_elem((5, 5, 5), Complex64::new(1e-3, 1e-4)));
    let particle = Particle::new(
        ParticleKind::Map(MapParticle::new(400e-9, MapSource::Custom { dn, spacing }).unwrap()),
        Pose::default(),
    );
    let mut det = detector(32);
    let state: DetectorState = det.next_state().unwrap();
    let mut propagator = Propagator::new(beam(), FixedSample::new(vec![vec![particle]]), det);
    let exposure = propagator.propagate_single().unwrap();
    let fourier = exposure.channels["fourier_pattern"].as_complex().unwrap();
    let mask = exposure.channels["mask"].as_mask().unwrap();

    let qmap = generate_qmap(&state.qmap_params(1e-9)).unwrap();
    let mut n_invalid = 0;
    for iy in 0..32 {
        for ix in 0..32 {
            let out = qmap
                .q(iy, ix)
                .iter()
                .any(|q| (spacing * q / (2.0 * std::f64::consts::PI)).abs() > 0.5);
            let f = fourier[[iy, ix]];
            if out {
                n_invalid += 1;
                assert!(f.re.is_nan() && f.im.is_nan());
                assert_ne!(mask[[iy, ix]] & pixelmask::INVALID, 0);
            } else {
                assert!(f.re.is_finite() && f.im.is_finite());
                assert_eq!(mask[[iy, ix]], 0);
            }
        }
    }
    assert!(n_invalid > 0 && n_invalid < 32 * 32);
}

#[test]
fn test_voxelized_sphere_approximates_analytic_sphere() {
    let diameter = 300e-9;
    let map = vec![Particle::new(
        ParticleKind::Map(
            MapParticle::new(
                diameter,
                MapSource::Generated {
                    shape: MapShape::Sphere,
                    material: water(),
                },
            )
            .unwrap(),
        ),
        Pose::default(),
    )];
    let sphere = vec![sphere_at(diameter, [0.0; 3])];
    let a = pattern(&mut Propagator::new(beam(), FixedSample::new(vec![map]), detector(16)));
    let b = pattern(&mut Propagator::new(beam(), FixedSample::new(vec![sphere]), detector(16)));
    let ratio = a[[8, 8]].norm() / b[[8, 8]].norm();
    assert!((0.7..1.3).contains(&ratio), "map/sphere forward ratio {ratio}");
}

#[test]
fn test_molecule_without_solver_is_fatal() {
    let particle = Particle::new(
        ParticleKind::Molecule(Molecule::from_structure_file("lysozyme.pdb")),
        Pose::default(),
    );
    let shots = vec![vec![sphere_at(50e-9, [0.0; 3]), particle]];
    let mut propagator = Propagator::new(beam(), FixedSample::new(shots), detector(8));
    assert!(matches!(
        propagator.propagate(2),
        Err(DiffractError::UnsupportedParticle(_))
    ));
}

#[test]
fn test_sphere_amplitude_scale() {
    // forward amplitude equals F0 V |dn|
    let d = 100e-9;
    let shot = vec![sphere_at(d, [0.0; 3])];
    let mut propagator = Propagator::new(beam(), FixedSample::new(vec![shot]), detector(9));
    let exposure = propagator.propagate_single().unwrap();
    let f0 = exposure.particles[0]["F0"].as_real().unwrap().sum();
    let dn = water().dn(1e-9).unwrap().norm();
    let v = std::f64::consts::PI / 6.0 * d * d * d;
    let centre = exposure.channels["fourier_pattern"].as_complex().unwrap()[[4, 4]];
    assert_relative_eq!(centre.re, f0 * v * dn, max_relative = 1e-9);
    assert_abs_diff_eq!(centre.im, 0.0);
}
