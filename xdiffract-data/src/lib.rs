#![no_std]

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// The complete scattering-factor database, as written by `xdiffract-generate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScatteringFactorDatabase {
    pub version: Vec<VersionRecord>,
    pub elements: Vec<ElementRecord>,
    pub scattering_factors: Vec<ScatteringFactorRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionRecord {
    pub tag: String,
    pub date: String,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementRecord {
    pub atomic_number: u16,
    pub symbol: String,
    pub name: String,
    /// Standard atomic weight (g/mol)
    pub molar_mass: f64,
}

/// Henke-style atomic scattering factors of one element.
///
/// `f1` is the full real part (it approaches Z at high energy), `f2` the
/// imaginary part. Energies are in eV and strictly increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatteringFactorRecord {
    pub element: String,
    pub energy: Vec<f64>,
    pub f1: Vec<f64>,
    pub f2: Vec<f64>,
}

/// A voxel volume for map particles, stored `[z, y, x]` in row-major order.
///
/// Either the refractive-index deficit (`dn_real`, `dn_imag`) or per-element
/// number densities (`densities`, in atoms/m^3) are filled, not both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapRecord {
    pub shape: [u32; 3],
    /// Voxel spacing (m)
    pub spacing: f64,
    pub dn_real: Vec<f64>,
    pub dn_imag: Vec<f64>,
    pub densities: Vec<ElementDensityRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDensityRecord {
    pub element: String,
    pub density: Vec<f64>,
}
