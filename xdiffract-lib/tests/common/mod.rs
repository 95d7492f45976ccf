#![allow(dead_code)]

use std::sync::Arc;

use xdiffract::{
    Beam, BeamProfile, Material, Particle, ParticleKind, PixelDetector, Pose, Sample,
    SampleState, Sphere,
};

/// Replays a fixed list of shots, cycling when exhausted.
pub struct FixedSample {
    pub shots: Vec<Vec<Particle>>,
    pub next: usize,
}

impl FixedSample {
    pub fn new(shots: Vec<Vec<Particle>>) -> Self {
        FixedSample { shots, next: 0 }
    }
}

impl Sample for FixedSample {
    fn next_state(&mut self) -> xdiffract::Result<SampleState> {
        let particles = self.shots[self.next % self.shots.len()].clone();
        self.next += 1;
        Ok(SampleState { particles })
    }
}

pub fn water() -> Arc<Material> {
    Arc::new(Material::preset("water").unwrap())
}

/// 1 nm, 1 mJ, flat illumination.
pub fn beam() -> Beam {
    Beam::new(1e-9, 1e-3, 1e-6, BeamProfile::Uniform).unwrap()
}

pub fn detector(n: usize) -> PixelDetector {
    PixelDetector::new(n, n, 75e-6, 0.1, None).unwrap()
}

pub fn sphere_at(diameter: f64, position: [f64; 3]) -> Particle {
    Particle::new(
        ParticleKind::Sphere(Sphere::new(diameter, water()).unwrap()),
        Pose {
            position,
            euler_angles: [0.0; 3],
        },
    )
}
