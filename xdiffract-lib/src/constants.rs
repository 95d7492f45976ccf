//! Physical constants in SI units (CODATA 2018).

/// Avogadro's number (mol^-1)
pub const AVOGADRO: f64 = 6.02214076e23;

/// Planck's constant (J·s)
pub const PLANCK: f64 = 6.62607015e-34;

/// Speed of light in vacuum (m/s)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Planck's constant times speed of light (eV·m)
pub const PLANCK_HC_EV_M: f64 = 1.239_841_984e-6;

/// Classical electron radius (m)
pub const R_ELECTRON: f64 = 2.8179403262e-15;

/// Atomic mass constant (kg)
pub const ATOMIC_MASS_CONSTANT: f64 = 1.66053906660e-27;

/// Elementary charge (C)
pub const ELEMENTARY_CHARGE: f64 = 1.602176634e-19;

/// Photon energy in eV for a wavelength in m.
#[inline]
pub fn photon_energy_ev(wavelength: f64) -> f64 {
    PLANCK_HC_EV_M / wavelength
}

/// Photon energy in J for a wavelength in m.
#[inline]
pub fn photon_energy_joule(wavelength: f64) -> f64 {
    PLANCK * SPEED_OF_LIGHT / wavelength
}
