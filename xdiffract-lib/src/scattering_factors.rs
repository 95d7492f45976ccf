//! Atomic forward-scattering factors f = f1 + i f2.

use std::collections::HashMap;
use std::path::Path;

use num_complex::Complex64;
use xdiffract_data::{ScatteringFactorDatabase, ScatteringFactorRecord};

use crate::bundle;
use crate::elements::Element;
use crate::error::{DiffractError, Result};
use crate::interp::interp_pair;

/// Source of atomic scattering factors at a photon energy.
pub trait ScatteringFactors: Send + Sync + std::fmt::Debug {
    /// Complex forward-scattering factor of `element` at `photon_energy_ev`.
    fn factor(&self, element: &Element, photon_energy_ev: f64) -> Result<Complex64>;
}

/// High-energy limit: every electron scatters in phase, no absorption.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardScatteringLimit;

impl ScatteringFactors for ForwardScatteringLimit {
    fn factor(&self, element: &Element, _photon_energy_ev: f64) -> Result<Complex64> {
        Ok(Complex64::new(f64::from(element.atomic_number), 0.0))
    }
}

/// Tabulated Henke scattering factors, interpolated linearly in energy.
///
/// Energies outside a table are clamped to its ends.
#[derive(Debug)]
pub struct ScatteringFactorTable {
    records: Vec<ScatteringFactorRecord>,
    by_symbol: HashMap<String, usize>,
}

impl ScatteringFactorTable {
    /// Build from already-decoded records. Each table must be non-empty,
    /// column lengths must agree and energies must increase.
    pub fn from_records(records: Vec<ScatteringFactorRecord>) -> Result<Self> {
        let mut by_symbol = HashMap::with_capacity(records.len());
        for (i, r) in records.iter().enumerate() {
            if r.energy.is_empty() || r.energy.len() != r.f1.len() || r.energy.len() != r.f2.len() {
                return Err(DiffractError::DataError(format!(
                    "malformed scattering factor table for '{}'",
                    r.element
                )));
            }
            if r.energy.windows(2).any(|w| w[1] <= w[0]) {
                return Err(DiffractError::DataError(format!(
                    "energies for '{}' are not strictly increasing",
                    r.element
                )));
            }
            by_symbol.insert(r.element.clone(), i);
        }
        Ok(ScatteringFactorTable { records, by_symbol })
    }

    /// Decode a postcard-serialized, zstd-compressed database bundle.
    pub fn from_compressed(bytes: &[u8]) -> Result<Self> {
        let db: ScatteringFactorDatabase = bundle::decode(bytes)?;
        log::debug!(
            "loaded scattering factors for {} elements",
            db.scattering_factors.len()
        );
        Self::from_records(db.scattering_factors)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_compressed(&bytes)
    }

    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.element.as_str())
    }

    fn record(&self, symbol: &str) -> Result<&ScatteringFactorRecord> {
        self.by_symbol
            .get(symbol)
            .map(|&i| &self.records[i])
            .ok_or_else(|| DiffractError::UnknownElement(symbol.to_string()))
    }
}

impl ScatteringFactors for ScatteringFactorTable {
    fn factor(&self, element: &Element, photon_energy_ev: f64) -> Result<Complex64> {
        let row = self.record(element.symbol)?;
        let (f1, f2) = interp_pair(photon_energy_ev, &row.energy, &row.f1, &row.f2);
        Ok(Complex64::new(f1, f2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements;

    fn carbon_table() -> ScatteringFactorTable {
        ScatteringFactorTable::from_records(vec![ScatteringFactorRecord {
            element: "C".to_string(),
            energy: vec![100.0, 1000.0, 10000.0],
            f1: vec![3.0, 5.5, 6.0],
            f2: vec![2.0, 0.4, 0.01],
        }])
        .unwrap()
    }

    #[test]
    fn test_forward_limit_is_atomic_number() {
        let fe = elements::resolve("Fe").unwrap();
        let f = ForwardScatteringLimit.factor(fe, 8000.0).unwrap();
        assert_eq!(f, Complex64::new(26.0, 0.0));
    }

    #[test]
    fn test_table_interpolates_and_clamps() {
        let table = carbon_table();
        let c = elements::resolve("C").unwrap();
        let mid = table.factor(c, 550.0).unwrap();
        assert!((mid.re - 4.25).abs() < 1e-12);
        assert!((mid.im - 1.2).abs() < 1e-12);
        let high = table.factor(c, 1.0e6).unwrap();
        assert_eq!(high, Complex64::new(6.0, 0.01));
    }

    #[test]
    fn test_missing_element() {
        let table = carbon_table();
        let o = elements::resolve("O").unwrap();
        assert!(matches!(
            table.factor(o, 500.0),
            Err(DiffractError::UnknownElement(_))
        ));
    }

    #[test]
    fn test_decodes_compressed_bundle() {
        let db = ScatteringFactorDatabase {
            version: vec![xdiffract_data::VersionRecord {
                tag: "test".to_string(),
                date: "2026-01-01".to_string(),
                notes: String::new(),
            }],
            elements: Vec::new(),
            scattering_factors: vec![ScatteringFactorRecord {
                element: "O".to_string(),
                energy: vec![10.0, 20.0],
                f1: vec![7.0, 7.5],
                f2: vec![1.0, 0.5],
            }],
        };
        let raw = postcard::to_allocvec(&db).unwrap();
        let packed = zstd::encode_all(raw.as_slice(), 3).unwrap();
        let table = ScatteringFactorTable::from_compressed(&packed).unwrap();
        assert_eq!(table.elements().collect::<Vec<_>>(), ["O"]);
        let o = elements::resolve("O").unwrap();
        assert_eq!(table.factor(o, 15.0).unwrap(), Complex64::new(7.25, 0.75));
        assert!(ScatteringFactorTable::from_compressed(&raw).is_err());
    }

    #[test]
    fn test_rejects_unsorted_energies() {
        let err = ScatteringFactorTable::from_records(vec![ScatteringFactorRecord {
            element: "C".to_string(),
            energy: vec![100.0, 50.0],
            f1: vec![1.0, 2.0],
            f2: vec![0.0, 0.0],
        }])
        .unwrap_err();
        assert!(matches!(err, DiffractError::DataError(_)));
    }
}
