//! Per-shot particle configurations.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Record, Value};
use crate::error::Result;
use crate::particle::{Particle, ParticleKind, Pose};
use crate::random::{Variation, poisson};
use crate::rotation::random_euler_angles;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    Fixed { position: [f64; 3] },
    /// Uniformly within an axis-aligned box of full widths `extent`.
    UniformBox { center: [f64; 3], extent: [f64; 3] },
}

impl Default for Placement {
    fn default() -> Self {
        Placement::Fixed { position: [0.0; 3] }
    }
}

impl Placement {
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; 3] {
        match *self {
            Placement::Fixed { position } => position,
            Placement::UniformBox { center, extent } => {
                std::array::from_fn(|i| center[i] + extent[i] * (rng.random::<f64>() - 0.5))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Orientation {
    Fixed { euler_angles: [f64; 3] },
    /// Uniformly distributed over all rotations.
    Random,
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::Fixed {
            euler_angles: [0.0; 3],
        }
    }
}

/// How many copies of a model arrive in one shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arrival {
    /// Exactly `number` copies.
    #[default]
    Fixed,
    /// Poisson distributed with mean `number`.
    Random,
}

/// A kind of particle and how its copies are spread over the shots.
#[derive(Debug, Clone)]
pub struct ParticleModel {
    pub prototype: ParticleKind,
    /// Copies per shot, or their mean with random arrival.
    pub number: usize,
    pub arrival: Arrival,
    pub placement: Placement,
    pub orientation: Orientation,
    pub diameter_variation: Variation,
}

impl ParticleModel {
    pub fn new(prototype: ParticleKind) -> Self {
        ParticleModel {
            prototype,
            number: 1,
            arrival: Arrival::Fixed,
            placement: Placement::default(),
            orientation: Orientation::default(),
            diameter_variation: Variation::None,
        }
    }

    fn copies<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        match self.arrival {
            Arrival::Fixed => self.number,
            Arrival::Random => poisson(rng, self.number as f64) as usize,
        }
    }

    fn instantiate<R: Rng + ?Sized>(&self, rng: &mut R) -> Particle {
        let mut kind = self.prototype.clone();
        if !self.diameter_variation.is_none() {
            let diameter = match &mut kind {
                ParticleKind::Sphere(s) => Some(&mut s.diameter),
                ParticleKind::Spheroid(s) => Some(&mut s.diameter),
                ParticleKind::Map(m) => Some(&mut m.diameter),
                ParticleKind::Molecule(_) => None,
            };
            if let Some(d) = diameter {
                // keep the particle physical
                *d = self.diameter_variation.apply(*d, rng).max(f64::MIN_POSITIVE);
            }
        }
        let position = self.placement.draw(rng);
        let euler_angles = match self.orientation {
            Orientation::Fixed { euler_angles } => euler_angles,
            Orientation::Random => random_euler_angles(rng),
        };
        Particle::new(kind, Pose { position, euler_angles })
    }
}

/// Particles illuminated in one shot, in illumination order.
#[derive(Debug, Clone, Default)]
pub struct SampleState {
    pub particles: Vec<Particle>,
}

impl SampleState {
    pub fn record(&self) -> Record {
        let mut r = Record::new();
        r.insert("number_of_particles".into(), Value::from(self.particles.len()));
        r
    }
}

pub trait Sample {
    fn next_state(&mut self) -> Result<SampleState>;
}

#[derive(Debug, Clone)]
pub struct ParticleSample {
    models: Vec<ParticleModel>,
    rng: ChaCha8Rng,
}

impl ParticleSample {
    pub fn new(models: Vec<ParticleModel>, seed: u64) -> Self {
        ParticleSample {
            models,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn models(&self) -> &[ParticleModel] {
        &self.models
    }
}

impl Sample for ParticleSample {
    fn next_state(&mut self) -> Result<SampleState> {
        let mut particles = Vec::new();
        for model in &self.models {
            for _ in 0..model.copies(&mut self.rng) {
                particles.push(model.instantiate(&mut self.rng));
            }
        }
        Ok(SampleState { particles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use crate::particle::Sphere;
    use std::sync::Arc;

    fn sphere_model() -> ParticleModel {
        let material = Arc::new(Material::preset("water").unwrap());
        ParticleModel::new(ParticleKind::Sphere(Sphere::new(50e-9, material).unwrap()))
    }

    fn diameters(state: &SampleState) -> Vec<f64> {
        state
            .particles
            .iter()
            .filter_map(|p| match &p.kind {
                ParticleKind::Sphere(s) => Some(s.diameter),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_copies_and_fixed_pose() {
        let mut model = sphere_model();
        model.number = 3;
        let mut sample = ParticleSample::new(vec![model], 0);
        let state = sample.next_state().unwrap();
        assert_eq!(state.particles.len(), 3);
        assert!(state.particles.iter().all(|p| p.pose == Pose::default()));
        assert_eq!(diameters(&state), vec![50e-9; 3]);
    }

    #[test]
    fn test_random_placement_stays_in_box() {
        let mut model = sphere_model();
        model.number = 50;
        model.placement = Placement::UniformBox {
            center: [0.0, 1e-6, 0.0],
            extent: [2e-6, 2e-6, 0.0],
        };
        model.orientation = Orientation::Random;
        let mut sample = ParticleSample::new(vec![model], 11);
        for p in sample.next_state().unwrap().particles {
            let [x, y, z] = p.pose.position;
            assert!(x.abs() <= 1e-6);
            assert!((0.0..=2e-6).contains(&y));
            assert_eq!(z, 0.0);
        }
    }

    #[test]
    fn test_random_arrival_varies_around_mean() {
        let mut model = sphere_model();
        model.number = 3;
        model.arrival = Arrival::Random;
        let mut sample = ParticleSample::new(vec![model], 21);
        let counts: Vec<usize> = (0..400)
            .map(|_| sample.next_state().unwrap().particles.len())
            .collect();
        let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        assert!((mean - 3.0).abs() < 0.4, "mean {mean}");
        assert!(counts.iter().any(|&c| c != 3));
        assert!(counts.contains(&0));
    }

    #[test]
    fn test_seeded_diameter_jitter() {
        let mut model = sphere_model();
        model.number = 4;
        model.diameter_variation = Variation::Uniform { spread: 10e-9 };
        let mut a = ParticleSample::new(vec![model.clone()], 5);
        let mut b = ParticleSample::new(vec![model], 5);
        let da = diameters(&a.next_state().unwrap());
        assert_eq!(da, diameters(&b.next_state().unwrap()));
        assert!(da.iter().all(|d| (45e-9..=55e-9).contains(d)));
    }
}
