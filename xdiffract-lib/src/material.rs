//! Materials and their X-ray refractive index.
//!
//! The complex refractive index follows Henke (1994):
//!
//! ```text
//! n = 1 - r_0 / (2 pi) * lambda^2 * sum_q rho_q f_q(0)
//! ```
//!
//! with `r_0` the classical electron radius, `rho_q` the number density and
//! `f_q(0)` the forward-scattering factor of species `q`. All quantities are SI.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::Array3;
use num_complex::Complex64;

use crate::chemparser::chemparse;
use crate::constants::{ATOMIC_MASS_CONSTANT, R_ELECTRON, photon_energy_ev};
use crate::elements::{self, Element};
use crate::error::{DiffractError, Result};
use crate::scattering_factors::{ForwardScatteringLimit, ScatteringFactors};

/// Built-in material presets: (name, mass density kg/m^3, atomic composition).
const PRESETS: &[(&str, f64, &[(&str, f64)])] = &[
    ("water", 995.0, &[("H", 2.0), ("O", 1.0)]),
    (
        "protein",
        1350.0,
        &[("H", 86.0), ("C", 52.0), ("N", 13.0), ("O", 15.0), ("S", 1.0)],
    ),
    (
        "dna",
        1700.0,
        &[("H", 11.0), ("C", 10.0), ("N", 4.0), ("O", 6.0), ("P", 1.0)],
    ),
    ("lipid", 1000.0, &[("H", 69.0), ("C", 36.0), ("O", 6.0), ("P", 1.0)]),
    (
        "cell",
        1000.0,
        &[("H", 23.0), ("C", 3.0), ("N", 1.0), ("O", 10.0), ("S", 1.0)],
    ),
    (
        "poliovirus",
        1340.0,
        &[
            ("C", 332652.0),
            ("H", 492388.0),
            ("N", 98245.0),
            ("O", 131196.0),
            ("P", 7501.0),
            ("S", 2340.0),
        ],
    ),
    ("styrene", 902.0, &[("C", 8.0), ("H", 8.0)]),
    ("sucrose", 1581.0, &[("C", 12.0), ("H", 22.0), ("O", 11.0)]),
];

/// Names of the built-in material presets.
pub fn preset_names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|(name, _, _)| *name)
}

/// Normalized atomic composition: element to fractional abundance (sums to 1).
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    fractions: BTreeMap<&'static str, (f64, &'static Element)>,
}

impl Composition {
    /// Validate and normalize element counts.
    ///
    /// Every key must be a known element symbol, every count finite and
    /// non-negative, and the total positive.
    pub fn new<'a, I>(counts: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut raw: BTreeMap<&'static str, (f64, &'static Element)> = BTreeMap::new();
        for (symbol, count) in counts {
            let element = elements::by_symbol(symbol)
                .ok_or_else(|| DiffractError::UnknownElement(symbol.to_string()))?;
            if !count.is_finite() || count < 0.0 {
                return Err(DiffractError::InvalidComposition(format!(
                    "abundance of {symbol} must be finite and non-negative, got {count}"
                )));
            }
            raw.entry(element.symbol).or_insert((0.0, element)).0 += count;
        }
        let total: f64 = raw.values().map(|(c, _)| c).sum();
        if total <= 0.0 {
            return Err(DiffractError::InvalidComposition(
                "total abundance must be positive".to_string(),
            ));
        }
        for entry in raw.values_mut() {
            entry.0 /= total;
        }
        Ok(Composition { fractions: raw })
    }

    /// Fractional abundance of an element (0 if absent).
    pub fn fraction(&self, symbol: &str) -> f64 {
        self.fractions.get(symbol).map_or(0.0, |(c, _)| *c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static Element, f64)> + '_ {
        self.fractions.values().map(|(c, e)| (*e, *c))
    }

    /// Mean atomic mass (kg).
    pub fn mean_atomic_mass(&self) -> f64 {
        self.iter()
            .map(|(e, c)| c * e.molar_mass * ATOMIC_MASS_CONSTANT)
            .sum()
    }

    /// Mean number of electrons per atom.
    pub fn mean_electrons(&self) -> f64 {
        self.iter()
            .map(|(e, c)| c * f64::from(e.atomic_number))
            .sum()
    }
}

/// A homogeneous material. Read-only after construction and cheap to share.
#[derive(Debug, Clone)]
pub struct Material {
    /// Mass density (kg/m^3)
    mass_density: f64,
    composition: Composition,
    factors: Arc<dyn ScatteringFactors>,
}

impl Material {
    pub fn new(composition: Composition, mass_density: f64) -> Result<Self> {
        if !(mass_density.is_finite() && mass_density > 0.0) {
            return Err(DiffractError::InvalidComposition(format!(
                "mass density must be positive, got {mass_density}"
            )));
        }
        Ok(Material {
            mass_density,
            composition,
            factors: Arc::new(ForwardScatteringLimit),
        })
    }

    /// Material from a chemical formula such as `"C8H8"` or `"(H2O)0.7(C6H12O6)0.3"`.
    pub fn from_formula(formula: &str, mass_density: f64) -> Result<Self> {
        let counts = chemparse(formula)?;
        let composition = Composition::new(counts.iter().map(|(s, &c)| (s.as_str(), c)))?;
        Self::new(composition, mass_density)
    }

    /// One of the built-in presets (see [`preset_names`]).
    pub fn preset(name: &str) -> Result<Self> {
        let key = name.to_lowercase();
        let (_, density, atoms) = PRESETS
            .iter()
            .find(|(n, _, _)| *n == key)
            .ok_or_else(|| {
                DiffractError::InvalidComposition(format!("unknown material preset '{name}'"))
            })?;
        Self::new(Composition::new(atoms.iter().copied())?, *density)
    }

    /// Replace the scattering-factor source (defaults to the forward-scattering limit).
    pub fn with_scattering_factors(mut self, factors: Arc<dyn ScatteringFactors>) -> Self {
        self.factors = factors;
        self
    }

    pub fn mass_density(&self) -> f64 {
        self.mass_density
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    /// Composition-weighted mean scattering factor at `wavelength`.
    pub fn scattering_factor(&self, wavelength: f64) -> Result<Complex64> {
        let energy = photon_energy_ev(wavelength);
        let mut f = Complex64::new(0.0, 0.0);
        for (element, fraction) in self.composition.iter() {
            f += self.factors.factor(element, energy)? * fraction;
        }
        Ok(f)
    }

    /// Atom number density (1/m^3).
    pub fn atom_density(&self) -> f64 {
        self.mass_density / self.composition.mean_atomic_mass()
    }

    /// Electron number density (1/m^3).
    pub fn electron_density(&self) -> f64 {
        self.composition.mean_electrons() * self.atom_density()
    }

    /// Complex refractive index n.
    pub fn n(&self, wavelength: f64) -> Result<Complex64> {
        Ok(Complex64::new(1.0, 0.0) - self.dn(wavelength)?)
    }

    /// Refractive index deficit dn = 1 - n.
    pub fn dn(&self, wavelength: f64) -> Result<Complex64> {
        let f = self.scattering_factor(wavelength)?;
        Ok(f * (R_ELECTRON / (2.0 * PI) * wavelength * wavelength * self.atom_density()))
    }

    /// Real decrement delta, with n = 1 - delta - i beta.
    pub fn delta(&self, wavelength: f64) -> Result<f64> {
        Ok(1.0 - self.n(wavelength)?.re)
    }

    pub fn beta(&self, wavelength: f64) -> Result<f64> {
        Ok(-self.n(wavelength)?.im)
    }

    /// Photoabsorption cross section per atom (m^2): 2 r_0 lambda Im(f).
    pub fn photoabsorption_cross_section(&self, wavelength: f64) -> Result<f64> {
        Ok(2.0 * R_ELECTRON * wavelength * self.scattering_factor(wavelength)?.im)
    }

    /// Intensity transmission through a slab of `thickness` (m).
    pub fn transmission(&self, thickness: f64, wavelength: f64) -> Result<f64> {
        let mu = self.photoabsorption_cross_section(wavelength)?;
        Ok((-self.atom_density() * mu * thickness).exp())
    }
}

/// Voxelized per-element number densities (1/m^3), indexed `[z, y, x]`.
#[derive(Debug, Clone)]
pub struct DensityMap {
    shape: (usize, usize, usize),
    densities: BTreeMap<&'static str, (&'static Element, Array3<f64>)>,
    factors: Arc<dyn ScatteringFactors>,
}

impl DensityMap {
    pub fn new(shape: (usize, usize, usize)) -> Self {
        DensityMap {
            shape,
            densities: BTreeMap::new(),
            factors: Arc::new(ForwardScatteringLimit),
        }
    }

    pub fn with_scattering_factors(mut self, factors: Arc<dyn ScatteringFactors>) -> Self {
        self.factors = factors;
        self
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    /// Set the number density of one element. The array must match the map shape.
    pub fn set_density(&mut self, symbol: &str, density: Array3<f64>) -> Result<()> {
        let element = elements::by_symbol(symbol)
            .ok_or_else(|| DiffractError::UnknownElement(symbol.to_string()))?;
        if density.dim() != self.shape {
            let (z, y, x) = self.shape;
            let (dz, dy, dx) = density.dim();
            return Err(DiffractError::ShapeMismatch {
                channel: format!("density[{symbol}]"),
                expected: vec![z, y, x],
                found: vec![dz, dy, dx],
            });
        }
        self.densities.insert(element.symbol, (element, density));
        Ok(())
    }

    /// Refractive index deficit per voxel at `wavelength`.
    pub fn dn(&self, wavelength: f64) -> Result<Array3<Complex64>> {
        let energy = photon_energy_ev(wavelength);
        let scale = R_ELECTRON / (2.0 * PI) * wavelength * wavelength;
        let mut out = Array3::<Complex64>::zeros(self.shape);
        for (element, density) in self.densities.values() {
            let f = self.factors.factor(element, energy)? * scale;
            out.zip_mut_with(density, |o, &rho| *o += f * rho);
        }
        Ok(out)
    }

    pub fn n(&self, wavelength: f64) -> Result<Array3<Complex64>> {
        Ok(self.dn(wavelength)?.mapv(|d| Complex64::new(1.0, 0.0) - d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composition_normalizes() {
        let c = Composition::new([("H", 2.0), ("O", 1.0)]).unwrap();
        assert!((c.fraction("H") - 2.0 / 3.0).abs() < 1e-12);
        assert!((c.fraction("O") - 1.0 / 3.0).abs() < 1e-12);
        let total: f64 = c.iter().map(|(_, f)| f).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_composition_rejects_bad_input() {
        assert!(matches!(
            Composition::new([("Xx", 1.0)]),
            Err(DiffractError::UnknownElement(_))
        ));
        assert!(matches!(
            Composition::new([("H", -1.0)]),
            Err(DiffractError::InvalidComposition(_))
        ));
        assert!(matches!(
            Composition::new([("H", 0.0)]),
            Err(DiffractError::InvalidComposition(_))
        ));
    }

    #[test]
    fn test_presets_resolve() {
        for name in preset_names() {
            let m = Material::preset(name).unwrap();
            assert!(m.atom_density() > 0.0, "{name}");
        }
        assert!(Material::preset("unobtainium").is_err());
    }

    #[test]
    fn test_formula_matches_preset() {
        let from_formula = Material::from_formula("H2O", 995.0).unwrap();
        let preset = Material::preset("water").unwrap();
        assert!((from_formula.atom_density() - preset.atom_density()).abs() < 1.0);
    }

    #[test]
    fn test_density_map_uniform_matches_material() {
        let water = Material::preset("water").unwrap();
        let rho = water.atom_density();
        let mut map = DensityMap::new((2, 2, 2));
        map.set_density("H", Array3::from_elem((2, 2, 2), rho * 2.0 / 3.0))
            .unwrap();
        map.set_density("O", Array3::from_elem((2, 2, 2), rho / 3.0))
            .unwrap();
        let wavelength = 1.0e-9;
        let expected = water.dn(wavelength).unwrap();
        for v in map.dn(wavelength).unwrap().iter() {
            assert!((v - expected).norm() / expected.norm() < 1e-12);
        }
    }

    #[test]
    fn test_density_map_shape_checked() {
        let mut map = DensityMap::new((2, 2, 2));
        assert!(matches!(
            map.set_density("C", Array3::zeros((3, 2, 2))),
            Err(DiffractError::ShapeMismatch { .. })
        ));
    }
}
