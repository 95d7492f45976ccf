//! X-ray pulses: per-shot beam state and the focal intensity profile.

use std::f64::consts::PI;
use std::str::FromStr;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Record, Value};
use crate::constants::{photon_energy_ev, photon_energy_joule};
use crate::error::{DiffractError, Result};
use crate::random::Variation;

/// Transverse intensity distribution in the focus. `focus_diameter` is the
/// full width at half maximum, or the edge diameter for a top hat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeamProfile {
    /// Flat intensity everywhere, equal to the top-hat value.
    #[default]
    Uniform,
    TopHat,
    Gaussian,
    /// `(1 + r^2 / g^2)^(-3/2)`, normalizable in two dimensions.
    PseudoLorentzian,
}

impl BeamProfile {
    /// Fraction of the pulse per unit area at radius `r` [1/m^2].
    pub fn areal_density(&self, r: f64, focus_diameter: f64) -> f64 {
        let half = focus_diameter / 2.0;
        match self {
            BeamProfile::Uniform => 1.0 / (PI * half * half),
            BeamProfile::TopHat if r <= half => 1.0 / (PI * half * half),
            BeamProfile::TopHat => 0.0,
            BeamProfile::Gaussian => {
                let sigma = focus_diameter / (2.0 * (2.0 * 2f64.ln()).sqrt());
                (-r * r / (2.0 * sigma * sigma)).exp() / (2.0 * PI * sigma * sigma)
            }
            BeamProfile::PseudoLorentzian => {
                let gamma = half / (2f64.powf(2.0 / 3.0) - 1.0).sqrt();
                (1.0 + r * r / (gamma * gamma)).powf(-1.5) / (2.0 * PI * gamma * gamma)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntensityUnit {
    #[default]
    PhotonsPerM2,
    JoulePerM2,
    JoulePerUm2,
    MilliJoulePerUm2,
}

impl FromStr for IntensityUnit {
    type Err = DiffractError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ph/m2" => Ok(IntensityUnit::PhotonsPerM2),
            "J/m2" => Ok(IntensityUnit::JoulePerM2),
            "J/um2" => Ok(IntensityUnit::JoulePerUm2),
            "mJ/um2" => Ok(IntensityUnit::MilliJoulePerUm2),
            other => Err(DiffractError::DataError(format!("unknown intensity unit '{other}'"))),
        }
    }
}

/// One pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceState {
    pub wavelength: f64,
    /// [J]
    pub pulse_energy: f64,
    pub focus_diameter: f64,
    pub profile: BeamProfile,
}

impl SourceState {
    pub fn photon_energy_ev(&self) -> f64 {
        photon_energy_ev(self.wavelength)
    }

    pub fn number_of_photons(&self) -> f64 {
        self.pulse_energy / photon_energy_joule(self.wavelength)
    }

    /// Fluence at `position`; the beam propagates along z so only the
    /// transverse offset matters.
    pub fn intensity(&self, position: [f64; 3], unit: IntensityUnit) -> f64 {
        let r = position[0].hypot(position[1]);
        let density = self.profile.areal_density(r, self.focus_diameter);
        let photons = self.number_of_photons() * density;
        let joule = self.pulse_energy * density;
        match unit {
            IntensityUnit::PhotonsPerM2 => photons,
            IntensityUnit::JoulePerM2 => joule,
            IntensityUnit::JoulePerUm2 => joule * 1e-12,
            IntensityUnit::MilliJoulePerUm2 => joule * 1e-9,
        }
    }

    pub fn record(&self) -> Record {
        let mut r = Record::new();
        r.insert("wavelength".into(), Value::from(self.wavelength));
        r.insert("photon_energy_ev".into(), Value::from(self.photon_energy_ev()));
        r.insert("pulse_energy".into(), Value::from(self.pulse_energy));
        r.insert("number_of_photons".into(), Value::from(self.number_of_photons()));
        r.insert("focus_diameter".into(), Value::from(self.focus_diameter));
        r.insert(
            "intensity".into(),
            Value::from(self.intensity([0.0; 3], IntensityUnit::PhotonsPerM2)),
        );
        r
    }
}

/// Produces one source state per exposure.
pub trait Source {
    fn next_state(&mut self) -> Result<SourceState>;
}

#[derive(Debug, Clone)]
pub struct Beam {
    nominal: SourceState,
    pulse_energy_variation: Variation,
    rng: ChaCha8Rng,
}

impl Beam {
    pub fn new(
        wavelength: f64,
        pulse_energy: f64,
        focus_diameter: f64,
        profile: BeamProfile,
    ) -> Result<Self> {
        for (name, v) in [
            ("wavelength", wavelength),
            ("focus_diameter", focus_diameter),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(DiffractError::InvalidGeometry(format!(
                    "beam {name} must be positive, got {v}"
                )));
            }
        }
        if !(pulse_energy.is_finite() && pulse_energy >= 0.0) {
            return Err(DiffractError::InvalidGeometry(format!(
                "pulse energy must be non-negative, got {pulse_energy}"
            )));
        }
        Ok(Beam {
            nominal: SourceState {
                wavelength,
                pulse_energy,
                focus_diameter,
                profile,
            },
            pulse_energy_variation: Variation::None,
            rng: ChaCha8Rng::seed_from_u64(0),
        })
    }

    pub fn with_pulse_energy_variation(mut self, variation: Variation, seed: u64) -> Self {
        self.pulse_energy_variation = variation;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn nominal(&self) -> &SourceState {
        &self.nominal
    }
}

impl Source for Beam {
    fn next_state(&mut self) -> Result<SourceState> {
        let pulse_energy = self
            .pulse_energy_variation
            .apply(self.nominal.pulse_energy, &mut self.rng);
        Ok(SourceState {
            pulse_energy,
            ..self.nominal
        })
    }
}
