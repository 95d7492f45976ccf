//! Seeded sampling helpers shared by the source, sample and detector models.

use std::f64::consts::PI;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Gaussian sample via Box-Muller.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.random::<f64>().max(1e-300);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Poisson-distributed count with mean `lambda`.
///
/// Knuth's product method below 30 expected counts, rounded normal
/// approximation above. Non-finite means pass through unchanged.
pub fn poisson<R: Rng + ?Sized>(rng: &mut R, lambda: f64) -> f64 {
    if !lambda.is_finite() {
        return lambda;
    }
    if lambda <= 0.0 {
        return 0.0;
    }
    if lambda < 30.0 {
        let limit = (-lambda).exp();
        let mut k = 0.0;
        let mut p = rng.random::<f64>();
        while p > limit {
            k += 1.0;
            p *= rng.random::<f64>();
        }
        k
    } else {
        (lambda + lambda.sqrt() * standard_normal(rng)).round().max(0.0)
    }
}

/// Shot-to-shot fluctuation of a positive parameter.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Variation {
    #[default]
    None,
    /// Gaussian with standard deviation `spread`.
    Normal { spread: f64 },
    /// Uniform within `value ± spread / 2`.
    Uniform { spread: f64 },
}

impl Variation {
    /// Draw a varied value, clamped at zero.
    pub fn apply<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> f64 {
        let varied = match *self {
            Variation::None => value,
            Variation::Normal { spread } => value + spread * standard_normal(rng),
            Variation::Uniform { spread } => value + spread * (rng.random::<f64>() - 0.5),
        };
        varied.max(0.0)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Variation::None)
    }
}
